//! Currency inference

use super::StandardizedRecord;
use crate::invoice::keywords::{KeywordTables, contains_any};

/// Currency code from record text, then the total string, then the default
///
/// Records are scanned in pipeline order and the first record naming any
/// currency decides. The total string is only checked against multi-character
/// keywords so stray punctuation cannot pose as a symbol.
pub fn infer_currency(data: &[StandardizedRecord], total: Option<&str>, tables: &KeywordTables) -> String {
    for item in data {
        if let Some(currency) = tables
            .currencies
            .iter()
            .find(|c| contains_any(&item.lower, &c.keywords))
        {
            return currency.code.clone();
        }
    }

    if let Some(total) = total {
        let lower = total.to_lowercase();
        if let Some(currency) = tables.currencies.iter().find(|c| {
            c.keywords
                .iter()
                .filter(|k| k.chars().count() > 1)
                .any(|k| lower.contains(k.as_str()))
        }) {
            return currency.code.clone();
        }
    }

    tables.default_currency.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoice::keywords::CurrencyKeywords;
    use crate::invoice::tests::record;

    #[test]
    fn test_first_record_in_order_wins() {
        let data = vec![
            record("Price in USD", 10, 10, 200, 40),
            record("Tổng: 50.000 đ", 10, 900, 200, 930),
        ];
        assert_eq!(infer_currency(&data, None, &KeywordTables::default()), "USD");
    }

    #[test]
    fn test_symbol_match() {
        let data = vec![record("€ 12,50", 10, 10, 100, 40)];
        assert_eq!(infer_currency(&data, None, &KeywordTables::default()), "EUR");
    }

    #[test]
    fn test_default_when_nothing_found() {
        let data = vec![record("Thank you", 10, 10, 100, 40)];
        assert_eq!(infer_currency(&data, Some("125,000"), &KeywordTables::default()), "VND");
        assert_eq!(infer_currency(&[], None, &KeywordTables::default()), "VND");
    }

    #[test]
    fn test_total_rescan_ignores_single_char_symbols() {
        let tables = KeywordTables {
            currencies: vec![
                CurrencyKeywords::new("XXX", &["x"]),
                CurrencyKeywords::new("PTS", &["pts"]),
            ],
            default_currency: "DEF".to_string(),
            ..Default::default()
        };

        assert_eq!(infer_currency(&[], Some("100x"), &tables), "DEF");
        assert_eq!(infer_currency(&[], Some("100 PTS"), &tables), "PTS");
    }
}
