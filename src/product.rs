//! Product records and the batch output file.

use std::io;

use schemars::JsonSchema;
use serde::{Deserializer, de::Error as _};

use crate::prelude::*;

/// Names of all record fields, in serialization order.
pub const FIELD_NAMES: [&str; 5] = [
    "product_name",
    "weight_volume",
    "price",
    "price_per_unit",
    "description",
];

/// A single product extracted from a leaflet.
///
/// Every field is optional at the type level, because the batch output is a
/// plain JSON file and may not contain everything we would like. Fields which
/// are absent stay absent when written back out.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Eq, Serialize)]
pub struct ProductRecord {
    /// The product name, with recognition errors corrected. Required.
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub product_name: Option<String>,

    /// Pack size, weight or volume, e.g. "5PK/90G". Empty when unknown.
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub weight_volume: Option<String>,

    /// The price the customer pays, e.g. "$1.99". Required.
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub price: Option<String>,

    /// Unit price, e.g. "$2.21 per 100g". Empty when unknown.
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub price_per_unit: Option<String>,

    /// Flavours or variants. Empty when unknown.
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<String>,
}

impl ProductRecord {
    /// Project one untrusted JSON value into a record.
    ///
    /// The value must be an object containing `product_name` and `price`.
    /// Missing optional fields are filled in with empty strings.
    pub fn from_candidate(candidate: Value) -> Result<Self> {
        if !candidate.is_object() {
            return Err(anyhow!("expected a JSON object, found {candidate}"));
        }
        let mut record = serde_json::from_value::<ProductRecord>(candidate)
            .context("could not decode product fields")?;
        if record.product_name.is_none() {
            return Err(anyhow!("missing required field `product_name`"));
        }
        if record.price.is_none() {
            return Err(anyhow!("missing required field `price`"));
        }
        for field in [
            &mut record.weight_volume,
            &mut record.price_per_unit,
            &mut record.description,
        ] {
            field.get_or_insert_with(String::new);
        }
        Ok(record)
    }

    /// Look up a field by its serialized name.
    pub fn field(&self, name: &str) -> Option<&str> {
        match name {
            "product_name" => self.product_name.as_deref(),
            "weight_volume" => self.weight_volume.as_deref(),
            "price" => self.price.as_deref(),
            "price_per_unit" => self.price_per_unit.as_deref(),
            "description" => self.description.as_deref(),
            _ => None,
        }
    }

    /// The product name, or "Unknown" if we don't have one.
    pub fn name_or_unknown(&self) -> &str {
        self.product_name.as_deref().unwrap_or("Unknown")
    }

    /// The price, or "N/A" if we don't have one.
    pub fn price_or_na(&self) -> &str {
        self.price.as_deref().unwrap_or("N/A")
    }
}

/// Accept strings, numbers and booleans as text. Treat `null` as absent.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "expected a string, found {other}"
        ))),
    }
}

/// Write the batch output, replacing any existing file.
#[instrument(level = "debug", skip(records), fields(count = records.len()))]
pub async fn write_batch_output(path: &Path, records: &[ProductRecord]) -> Result<()> {
    let json = serde_json::to_string_pretty(records)
        .context("failed to serialize product records")?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("failed to write {}", path.display()))
}

/// Read the batch output.
///
/// Returns `Ok(None)` if the file does not exist, and an error if it exists but
/// can't be read or parsed.
pub async fn read_batch_output(path: &Path) -> Result<Option<Vec<ProductRecord>>> {
    let data = match tokio::fs::read_to_string(path).await {
        Ok(data) => data,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read {}", path.display()));
        }
    };
    let records = serde_json::from_str::<Vec<ProductRecord>>(&data)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(Some(records))
}
