//! Price statistics for the summary panel.

use crate::product::ProductRecord;

/// Currency symbols we strip before parsing a price.
const CURRENCY_SYMBOLS: &[char] = &['$', '€', '£', '¥'];

/// Parse a price like "$1,299.00". Returns `None` for anything that isn't a
/// plain decimal number once currency symbols and separators are removed.
pub fn parse_price(text: &str) -> Option<f64> {
    let cleaned = text
        .chars()
        .filter(|c| !CURRENCY_SYMBOLS.contains(c) && *c != ',')
        .collect::<String>();
    let value = cleaned.trim().parse::<f64>().ok()?;
    value.is_finite().then_some(value)
}

/// Average, minimum and maximum of the prices we could parse.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PriceStats {
    /// How many prices were parsed.
    pub count: usize,
    pub average: f64,
    pub min: f64,
    pub max: f64,
}

impl PriceStats {
    /// Compute statistics over all parsable prices. Records without a
    /// parsable price are skipped. Returns `None` if no price parses.
    pub fn from_records(records: &[ProductRecord]) -> Option<Self> {
        let prices = records
            .iter()
            .filter_map(|r| r.price.as_deref().and_then(parse_price))
            .collect::<Vec<_>>();
        if prices.is_empty() {
            return None;
        }
        let sum = prices.iter().sum::<f64>();
        Some(Self {
            count: prices.len(),
            average: sum / prices.len() as f64,
            min: prices.iter().copied().fold(f64::INFINITY, f64::min),
            max: prices.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        })
    }
}

/// Format an amount as dollars and cents.
pub fn format_money(amount: f64) -> String {
    format!("${amount:.2}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::product::tests::record;

    #[test]
    fn parses_prices_with_symbols_and_separators() {
        assert_eq!(parse_price("$1.99"), Some(1.99));
        assert_eq!(parse_price(" $1,299.50 "), Some(1299.5));
        assert_eq!(parse_price("£3"), Some(3.0));
        assert_eq!(parse_price("2.49"), Some(2.49));
    }

    #[test]
    fn rejects_non_prices() {
        for text in ["not a price", "", "$", "$2.21 per 100g", "NaN", "inf"] {
            assert_eq!(parse_price(text), None, "text: {text:?}");
        }
    }

    #[test]
    fn unparsable_prices_are_excluded_from_stats() {
        let records = vec![
            record("A", "$1.99"),
            record("B", "$3.49"),
            record("C", "not a price"),
            ProductRecord::default(),
        ];
        let stats = PriceStats::from_records(&records).unwrap();
        assert_eq!(stats.count, 2);
        assert_eq!(format_money(stats.average), "$2.74");
        assert!((stats.average - 2.74).abs() < 1e-9);
        assert_eq!(stats.min, 1.99);
        assert_eq!(stats.max, 3.49);
    }

    #[test]
    fn no_parsable_prices_means_no_stats() {
        let records = vec![record("A", "free"), ProductRecord::default()];
        assert_eq!(PriceStats::from_records(&records), None);
    }
}
