//! Keyword tables driving field inference
//!
//! All keywords are matched as lowercase substrings of lowercased record text.

use serde::{Deserialize, Serialize};

/// Keywords identifying one currency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyKeywords {
    /// Code reported in the inferred fields (e.g. "VND")
    pub code: String,
    /// Names and symbols; single-character entries are symbols
    pub keywords: Vec<String>,
}

impl CurrencyKeywords {
    pub fn new(code: &str, keywords: &[&str]) -> Self {
        Self {
            code: code.to_string(),
            keywords: to_strings(keywords),
        }
    }
}

/// Keyword tables for supplier, total and currency inference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordTables {
    /// Lines introducing the supplier
    pub supplier: Vec<String>,
    /// Labels of a final amount (score 2)
    pub total_priority: Vec<String>,
    /// Generic total labels (score 1)
    pub total_generic: Vec<String>,
    /// Labels of line items or non-final totals; never a grand total
    pub total_exclude: Vec<String>,
    /// Currency reported when no keyword is found
    pub default_currency: String,
    /// Currencies in match priority order
    pub currencies: Vec<CurrencyKeywords>,
}

impl Default for KeywordTables {
    fn default() -> Self {
        Self {
            supplier: to_strings(&[
                "supplier",
                "vendor",
                "from",
                "company",
                "seller",
                "nhà cung cấp",
                "công ty",
            ]),
            total_priority: to_strings(&[
                "grand total",
                "amount due",
                "total due",
                "amount to pay",
                "thanh toan",
                "tong tien",
                "cong tien",
                "phai thu",
            ]),
            total_generic: to_strings(&["total", "tổng", "cộng"]),
            total_exclude: to_strings(&[
                "sub",
                "net",
                "tax",
                "vat",
                "trước thuế",
                "discount",
                "khuyến mãi",
                "qty",
                "sl",
            ]),
            default_currency: "VND".to_string(),
            currencies: vec![
                CurrencyKeywords::new("VND", &["vnd", "vnđ", "đ", "dong", "việt nam"]),
                CurrencyKeywords::new("USD", &["usd", "$", "dollar"]),
                CurrencyKeywords::new("EUR", &["eur", "€", "euro"]),
                CurrencyKeywords::new("THB", &["thb", "฿", "baht"]),
            ],
        }
    }
}

impl KeywordTables {
    pub fn is_supplier_line(&self, lower: &str) -> bool {
        contains_any(lower, &self.supplier)
    }

    pub fn is_excluded_total(&self, lower: &str) -> bool {
        contains_any(lower, &self.total_exclude)
    }

    /// 2 for a priority label, 1 for a generic label, 0 otherwise
    pub fn total_score(&self, lower: &str) -> u8 {
        if contains_any(lower, &self.total_priority) {
            2
        } else if contains_any(lower, &self.total_generic) {
            1
        } else {
            0
        }
    }
}

/// Whether `text` contains any of `keywords` as a substring
pub fn contains_any(text: &str, keywords: &[String]) -> bool {
    keywords.iter().any(|k| text.contains(k.as_str()))
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_score() {
        let tables = KeywordTables::default();

        assert_eq!(tables.total_score("grand total:"), 2);
        assert_eq!(tables.total_score("tong tien thanh toan"), 2);
        assert_eq!(tables.total_score("total"), 1);
        assert_eq!(tables.total_score("tổng cộng"), 1);
        assert_eq!(tables.total_score("date"), 0);
    }

    #[test]
    fn test_exclusions() {
        let tables = KeywordTables::default();

        assert!(tables.is_excluded_total("subtotal"));
        assert!(tables.is_excluded_total("vat 10%"));
        assert!(!tables.is_excluded_total("grand total"));
    }

    #[test]
    fn test_supplier_keywords() {
        let tables = KeywordTables::default();

        assert!(tables.is_supplier_line("supplier: acme"));
        assert!(tables.is_supplier_line("công ty tnhh abc"));
        assert!(!tables.is_supplier_line("invoice no. 42"));
    }

    #[test]
    fn test_keyword_tables_toml_roundtrip() {
        let tables = KeywordTables::default();
        let toml_str = toml::to_string_pretty(&tables).unwrap();
        let parsed: KeywordTables = toml::from_str(&toml_str).unwrap();
        assert_eq!(tables, parsed);
    }
}
