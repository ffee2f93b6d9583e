//! Invoice Field Inference
//!
//! Keyword and layout heuristics over OCR records:
//! - Supplier name from a labelled line, else the top of the page
//! - Grand total from scored total labels, else the bottom-right amount
//! - Currency from names/symbols anywhere on the page, else a default
//!
//! Inference never fails; a field that cannot be found is `None`.

pub mod currency;
pub mod keywords;
pub mod supplier;
pub mod total;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::vision::{TextBox, TextRecord};

pub use keywords::{CurrencyKeywords, KeywordTables};
pub use total::clean_money_string;

/// Fields inferred from one invoice
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvoiceFields {
    pub supplier_name: Option<String>,
    /// Cleaned amount string, e.g. `"1.234.567"`
    pub total: Option<String>,
    /// Currency code, e.g. `"VND"`
    pub currency: Option<String>,
}

/// A record prepared for keyword matching
#[derive(Debug, Clone, PartialEq)]
pub struct StandardizedRecord {
    /// Text in original case
    pub text: String,
    /// Lowercased text used for keyword matching
    pub lower: String,
    pub text_box: TextBox,
    pub confidence: f32,
}

impl StandardizedRecord {
    /// Standardize a record
    ///
    /// Coordinates are taken as given; an inverted box is kept and only
    /// affects the positional comparisons it takes part in.
    pub fn from_record(record: &TextRecord) -> Self {
        Self {
            text: record.text.clone(),
            lower: record.text.to_lowercase(),
            text_box: record.text_box,
            confidence: record.confidence,
        }
    }
}

/// One inference heuristic; strategies for a field are tried in order
pub type Strategy = fn(&[StandardizedRecord], &KeywordTables) -> Option<String>;

fn first_match(strategies: &[Strategy], data: &[StandardizedRecord], tables: &KeywordTables) -> Option<String> {
    strategies.iter().find_map(|strategy| strategy(data, tables))
}

/// Infers supplier, total and currency from OCR records
#[derive(Debug, Clone, Default)]
pub struct FieldInferenceEngine {
    tables: KeywordTables,
}

impl FieldInferenceEngine {
    pub fn new(tables: KeywordTables) -> Self {
        Self { tables }
    }

    pub fn tables(&self) -> &KeywordTables {
        &self.tables
    }

    /// Infer all fields; deterministic for a given record order
    pub fn infer(&self, records: &[TextRecord]) -> InvoiceFields {
        let data: Vec<StandardizedRecord> = records
            .iter()
            .map(StandardizedRecord::from_record)
            .collect();

        let supplier_name = first_match(supplier::STRATEGIES, &data, &self.tables);
        let total = first_match(total::STRATEGIES, &data, &self.tables);
        let currency = currency::infer_currency(&data, total.as_deref(), &self.tables);

        debug!(
            "Inferred supplier={:?} total={:?} currency={} from {} records",
            supplier_name,
            total,
            currency,
            data.len()
        );

        InvoiceFields {
            supplier_name,
            total,
            currency: Some(currency),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Standardized record with confidence 0.9
    pub(crate) fn record(text: &str, x1: i32, y1: i32, x2: i32, y2: i32) -> StandardizedRecord {
        StandardizedRecord::from_record(&text_record(text, x1, y1, x2, y2))
    }

    fn text_record(text: &str, x1: i32, y1: i32, x2: i32, y2: i32) -> TextRecord {
        TextRecord::new(TextBox::new(x1, y1, x2, y2, 0.9), text)
    }

    #[test]
    fn test_empty_input() {
        let fields = FieldInferenceEngine::default().infer(&[]);

        assert_eq!(fields.supplier_name, None);
        assert_eq!(fields.total, None);
        assert_eq!(fields.currency.as_deref(), Some("VND"));
    }

    #[test]
    fn test_full_invoice() {
        let records = vec![
            text_record("Sunrise Bakery", 40, 20, 400, 60),
            text_record("Invoice No. 0042", 40, 80, 400, 110),
            text_record("Subtotal", 40, 700, 200, 730),
            text_record("1.000.000", 500, 700, 650, 730),
            text_record("VAT 10%", 40, 750, 200, 780),
            text_record("100.000", 500, 750, 650, 780),
            text_record("Total Due", 40, 800, 200, 830),
            text_record("1.100.000 đ", 500, 800, 680, 830),
        ];

        let fields = FieldInferenceEngine::default().infer(&records);

        assert_eq!(fields.supplier_name.as_deref(), Some("Sunrise Bakery"));
        assert_eq!(fields.total.as_deref(), Some("1.100.000"));
        assert_eq!(fields.currency.as_deref(), Some("VND"));
    }

    #[test]
    fn test_usd_invoice_with_supplier_label() {
        let records = vec![
            text_record("INVOICE", 300, 10, 500, 50),
            text_record("From: Northwind Traders LLC", 20, 120, 420, 150),
            text_record("Amount Due: $1,250.00", 20, 600, 420, 630),
        ];

        let fields = FieldInferenceEngine::default().infer(&records);

        assert_eq!(fields.supplier_name.as_deref(), Some("Northwind Traders LLC"));
        assert_eq!(fields.total.as_deref(), Some("1,250.00"));
        assert_eq!(fields.currency.as_deref(), Some("USD"));
    }

    #[test]
    fn test_inverted_boxes_kept() {
        let records = vec![
            text_record("Total 999.999", 300, 500, 10, 530),
            text_record("Total 123.456", 10, 500, 300, 530),
        ];

        // Equal score and bottom edge, so the first record wins
        let fields = FieldInferenceEngine::default().infer(&records);
        assert_eq!(fields.total.as_deref(), Some("999.999"));
    }

    #[test]
    fn test_infer_is_deterministic() {
        let records = vec![
            text_record("Seller", 10, 10, 80, 40),
            text_record("Green Leaf", 90, 12, 250, 38),
            text_record("Total", 10, 400, 80, 430),
            text_record("75,000", 200, 402, 300, 428),
        ];
        let engine = FieldInferenceEngine::default();

        let first = engine.infer(&records);
        assert_eq!(first, engine.infer(&records));
        assert_eq!(first.supplier_name.as_deref(), Some("Green Leaf"));
        assert_eq!(first.total.as_deref(), Some("75,000"));
    }

    #[test]
    fn test_invoice_fields_json_shape() {
        let fields = InvoiceFields {
            supplier_name: None,
            total: Some("125,000".to_string()),
            currency: Some("VND".to_string()),
        };
        let json = serde_json::to_value(&fields).unwrap();

        assert!(json["supplier_name"].is_null());
        assert_eq!(json["total"], "125,000");
        assert_eq!(json["currency"], "VND");
    }
}
