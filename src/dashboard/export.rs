//! Downloadable exports. These are generated from memory on every request and
//! never touch the batch output file.

use crate::{
    prelude::*,
    product::{FIELD_NAMES, ProductRecord},
};

/// Pretty-printed JSON for one record.
pub fn record_json(record: &ProductRecord) -> Result<String> {
    serde_json::to_string_pretty(record).context("failed to serialize product")
}

/// Pretty-printed JSON for all records.
pub fn records_json(records: &[ProductRecord]) -> Result<String> {
    serde_json::to_string_pretty(records).context("failed to serialize products")
}

/// The CSV columns: every field present in at least one record, in our
/// standard field order.
pub fn csv_columns(records: &[ProductRecord]) -> Vec<&'static str> {
    FIELD_NAMES
        .into_iter()
        .filter(|field| records.iter().any(|r| r.field(field).is_some()))
        .collect()
}

/// CSV for all records. Missing values are written as empty strings.
pub fn records_csv(records: &[ProductRecord]) -> Result<String> {
    let columns = csv_columns(records);
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(&columns)
        .context("failed to write CSV header")?;
    for record in records {
        wtr.write_record(columns.iter().map(|c| record.field(c).unwrap_or_default()))
            .context("failed to write CSV record")?;
    }
    let bytes = wtr.into_inner().context("failed to finish CSV output")?;
    String::from_utf8(bytes).context("CSV output was not UTF-8")
}
