//! Supplier name inference

use super::{StandardizedRecord, Strategy};
use crate::invoice::keywords::KeywordTables;

/// Minimum vertical overlap for the line following a supplier label
const NEXT_LINE_OVERLAP: f32 = 0.3;
/// Fraction of the page height searched by the top-of-page fallback
const TOP_REGION: f64 = 0.2;
/// Records examined by the top-of-page fallback
const TOP_CANDIDATES: usize = 3;

/// Supplier strategies, tried in order
pub const STRATEGIES: &[Strategy] = &[keyword_anchor, top_of_page];

/// Name on a supplier-labelled line, or on the line right after it
///
/// A label line of more than two words carries the name itself: the part
/// after the first colon, else the whole line. Otherwise the next record is
/// taken when it sits on the same line.
pub fn keyword_anchor(data: &[StandardizedRecord], tables: &KeywordTables) -> Option<String> {
    for (i, item) in data.iter().enumerate() {
        if !tables.is_supplier_line(&item.lower) {
            continue;
        }

        if item.text.split_whitespace().count() > 2 {
            return Some(match item.text.split_once(':') {
                Some((_, name)) => name.trim().to_string(),
                None => item.text.clone(),
            });
        }

        if let Some(next) = data.get(i + 1) {
            if item.text_box.vertical_overlap(&next.text_box) > NEXT_LINE_OVERLAP {
                return Some(next.text.clone());
            }
        }
    }

    None
}

/// First substantial text near the top of the page
pub fn top_of_page(data: &[StandardizedRecord], _tables: &KeywordTables) -> Option<String> {
    let max_y = data.iter().map(|d| d.text_box.y2).max()?;
    let limit = max_y as f64 * TOP_REGION;

    let mut top: Vec<&StandardizedRecord> = data
        .iter()
        .filter(|d| (d.text_box.y1 as f64) < limit)
        .collect();
    top.sort_by_key(|d| d.text_box.y1);

    top.into_iter()
        .take(TOP_CANDIDATES)
        .find(|d| d.text.chars().count() > 3)
        .map(|d| d.text.clone())
}
