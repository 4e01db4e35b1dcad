//! The dashboard page as plain data.
//!
//! [`PageView::build`] is a pure function of the loaded records and the
//! current selection. The HTML template only formats what it is given.

use crate::{
    prelude::*,
    product::{ProductRecord, read_batch_output},
};

use super::stats::{PriceStats, format_money};

/// Table columns, in display order, with their headings.
pub const TABLE_COLUMNS: [(&str, &str); 5] = [
    ("product_name", "Product Name"),
    ("price", "Price"),
    ("weight_volume", "Size"),
    ("price_per_unit", "Unit Price"),
    ("description", "Description"),
];

/// The label of the "nothing selected" option.
pub const NO_SELECTION_LABEL: &str = "Select a product...";

/// The command that produces the data file.
const EXTRACT_COMMAND: &str = "leaflet-extractor extract";

/// The result of reading the batch output file.
#[derive(Debug)]
pub enum LoadedData {
    /// The file does not exist.
    Missing,

    /// The file exists but could not be read or parsed.
    Corrupt(String),

    /// The records in the file (possibly none).
    Records(Vec<ProductRecord>),
}

impl LoadedData {
    /// Read the batch output file.
    pub async fn load(path: &Path) -> Self {
        match read_batch_output(path).await {
            Ok(None) => LoadedData::Missing,
            Ok(Some(records)) => LoadedData::Records(records),
            Err(err) => {
                warn!("Could not load {}: {err:#}", path.display());
                LoadedData::Corrupt(format!("{err:#}"))
            }
        }
    }

    /// Either a non-empty list of records, or guidance explaining why there
    /// are none.
    pub fn records_or_guidance(&self, path: &Path) -> Result<&[ProductRecord], Guidance> {
        let file = path.display();
        match self {
            LoadedData::Missing => Err(Guidance::error(
                format!("{file} not found."),
                format!("Run `{EXTRACT_COMMAND}` in this directory first, then reload this page."),
            )),
            LoadedData::Corrupt(err) => Err(Guidance::error(
                format!("Error reading {file}: {err}"),
                format!("Run `{EXTRACT_COMMAND}` again to regenerate it, then reload this page."),
            )),
            LoadedData::Records(records) if records.is_empty() => Err(Guidance::warning(
                format!("No products found in {file}."),
                format!("Run `{EXTRACT_COMMAND}` again, then reload this page."),
            )),
            LoadedData::Records(records) => Ok(records),
        }
    }
}

/// A message shown instead of the dashboard.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Guidance {
    /// "error" or "warning", used as a CSS class.
    pub level: &'static str,
    pub message: String,
    /// What to do about it.
    pub next_step: String,
}

impl Guidance {
    fn error(message: String, next_step: String) -> Self {
        Self {
            level: "error",
            message,
            next_step,
        }
    }

    fn warning(message: String, next_step: String) -> Self {
        Self {
            level: "warning",
            message,
            next_step,
        }
    }
}

/// Everything the page template needs.
#[derive(Debug, Serialize)]
pub struct PageView {
    /// Set if we can't show any products.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guidance: Option<Guidance>,

    /// Set if we have products to show.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub products: Option<ProductsView>,
}

/// The main dashboard.
#[derive(Debug, Serialize)]
pub struct ProductsView {
    pub data_file: String,
    pub columns: Vec<ColumnView>,
    pub rows: Vec<RowView>,
    pub options: Vec<OptionView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<DetailView>,
    pub summary: SummaryView,
}

/// A table column.
#[derive(Debug, Serialize)]
pub struct ColumnView {
    pub key: &'static str,
    pub title: &'static str,
}

/// A table row.
#[derive(Debug, Serialize)]
pub struct RowView {
    /// 1-based position in the data file.
    pub index: usize,
    pub cells: Vec<String>,
}

/// An entry in the product selector.
#[derive(Debug, Serialize)]
pub struct OptionView {
    /// 1-based index, or 0 for "nothing selected".
    pub value: usize,
    pub label: String,
    pub selected: bool,
}

/// The selected product.
#[derive(Debug, Serialize)]
pub struct DetailView {
    /// 1-based index.
    pub index: usize,
    pub name: String,
    pub price: String,
    pub size: String,
    pub unit_price: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub raw_json: String,
}

/// The summary panel.
#[derive(Debug, Serialize)]
pub struct SummaryView {
    pub total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prices: Option<PriceSummaryView>,
}

/// Formatted price statistics.
#[derive(Debug, Serialize)]
pub struct PriceSummaryView {
    pub average: String,
    pub min: String,
    pub max: String,
}

/// Parse the `selected` query parameter. Anything unusable means "nothing
/// selected".
pub fn parse_selection(selected: Option<&str>) -> usize {
    selected
        .and_then(|s| s.trim().parse::<usize>().ok())
        .unwrap_or(0)
}

/// Show `value`, or "N/A" if it is missing or empty.
fn or_na(value: Option<&str>) -> String {
    match value {
        Some(v) if !v.is_empty() => v.to_owned(),
        _ => "N/A".to_owned(),
    }
}

impl PageView {
    /// Build the page for `data`, with the 1-based `selected` product (0 for
    /// none).
    pub fn build(data: &LoadedData, selected: usize, data_path: &Path) -> Self {
        match data.records_or_guidance(data_path) {
            Err(guidance) => PageView {
                guidance: Some(guidance),
                products: None,
            },
            Ok(records) => PageView {
                guidance: None,
                products: Some(ProductsView::build(records, selected, data_path)),
            },
        }
    }
}

impl ProductsView {
    fn build(records: &[ProductRecord], selected: usize, data_path: &Path) -> Self {
        let columns = TABLE_COLUMNS
            .into_iter()
            .filter(|(key, _)| records.iter().any(|r| r.field(key).is_some()))
            .map(|(key, title)| ColumnView { key, title })
            .collect::<Vec<_>>();

        let rows = records
            .iter()
            .enumerate()
            .map(|(idx, record)| RowView {
                index: idx + 1,
                cells: columns
                    .iter()
                    .map(|c| record.field(c.key).unwrap_or_default().to_owned())
                    .collect(),
            })
            .collect();

        let selected = if (1..=records.len()).contains(&selected) {
            selected
        } else {
            0
        };
        let mut options = vec![OptionView {
            value: 0,
            label: NO_SELECTION_LABEL.to_owned(),
            selected: selected == 0,
        }];
        options.extend(records.iter().enumerate().map(|(idx, record)| OptionView {
            value: idx + 1,
            label: format!(
                "{}. {} - {}",
                idx + 1,
                record.name_or_unknown(),
                record.price_or_na()
            ),
            selected: selected == idx + 1,
        }));

        let detail = selected
            .checked_sub(1)
            .and_then(|idx| records.get(idx))
            .map(|record| DetailView::build(selected, record));

        let summary = SummaryView {
            total: records.len(),
            prices: PriceStats::from_records(records).map(|stats| PriceSummaryView {
                average: format_money(stats.average),
                min: format_money(stats.min),
                max: format_money(stats.max),
            }),
        };

        ProductsView {
            data_file: data_path.display().to_string(),
            columns,
            rows,
            options,
            detail,
            summary,
        }
    }
}

impl DetailView {
    fn build(index: usize, record: &ProductRecord) -> Self {
        let raw_json = serde_json::to_string_pretty(record).unwrap_or_else(|err| {
            warn!("Could not serialize product {index}: {err}");
            String::new()
        });
        DetailView {
            index,
            name: match record.product_name.as_deref() {
                Some(name) if !name.is_empty() => name.to_owned(),
                _ => "Unknown Product".to_owned(),
            },
            price: or_na(record.price.as_deref()),
            size: or_na(record.weight_volume.as_deref()),
            unit_price: or_na(record.price_per_unit.as_deref()),
            description: record.description.clone().filter(|d| !d.is_empty()),
            raw_json,
        }
    }
}
