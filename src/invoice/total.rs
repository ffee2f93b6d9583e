//! Grand total inference

use std::cmp::Reverse;
use std::sync::LazyLock;

use regex::Regex;

use super::{StandardizedRecord, Strategy};
use crate::invoice::keywords::KeywordTables;

/// Runs of digits and separators
static RE_MONEY_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\d.,]+").expect("valid money run regex"));
/// Everything that is not a digit or separator
static RE_NON_MONEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\d.,]").expect("valid non-money regex"));
static RE_DIGIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d").expect("valid digit regex"));

/// Candidates examined per image
const MAX_CANDIDATES: usize = 3;
/// Minimum vertical overlap between a label and its value
const VALUE_OVERLAP: f32 = 0.3;
/// Inline amounts need this many digits
const INLINE_MIN_DIGITS: usize = 3;
/// Right-side values need this many digits
const VALUE_MIN_DIGITS: usize = 2;

/// Total strategies, tried in order
pub const STRATEGIES: &[Strategy] = &[keyword_candidates, bottom_right];

/// Strip everything but digits, `.` and `,`, then trailing separators
///
/// `"1.234.567,"` becomes `"1.234.567"`. Idempotent; the result is not
/// validated as a number.
pub fn clean_money_string(text: &str) -> String {
    RE_NON_MONEY
        .replace_all(text, "")
        .trim_end_matches(['.', ','])
        .to_string()
}

fn digit_count(text: &str) -> usize {
    RE_DIGIT.find_iter(text).count()
}

/// Score keyword-labelled lines and read their amount inline or to the right
pub fn keyword_candidates(data: &[StandardizedRecord], tables: &KeywordTables) -> Option<String> {
    let mut candidates: Vec<(usize, u8)> = data
        .iter()
        .enumerate()
        .filter(|(_, item)| !tables.is_excluded_total(&item.lower))
        .map(|(i, item)| (i, tables.total_score(&item.lower)))
        .filter(|(_, score)| *score > 0)
        .collect();

    // Most specific label first, then lowest on the page
    candidates.sort_by_key(|&(i, score)| (Reverse(score), Reverse(data[i].text_box.y2)));

    candidates
        .iter()
        .take(MAX_CANDIDATES)
        .find_map(|&(i, _)| inline_amount(&data[i]).or_else(|| value_to_right(data, i)))
}

/// Last numeric run of the label line with enough digits
fn inline_amount(label: &StandardizedRecord) -> Option<String> {
    RE_MONEY_RUN
        .find_iter(&label.text)
        .map(|m| m.as_str())
        .filter(|run| digit_count(run) >= INLINE_MIN_DIGITS)
        .last()
        .map(clean_money_string)
}

/// Numeric record at or right of the label's left edge on the same line
fn value_to_right(data: &[StandardizedRecord], label_index: usize) -> Option<String> {
    let label = &data[label_index];
    let mut best: Option<(&StandardizedRecord, f32)> = None;

    for (i, item) in data.iter().enumerate() {
        if i == label_index || digit_count(&item.text) < VALUE_MIN_DIGITS {
            continue;
        }
        if item.text_box.x1 < label.text_box.x1 {
            continue;
        }

        let overlap = label.text_box.vertical_overlap(&item.text_box);
        if overlap > VALUE_OVERLAP && best.map_or(true, |(_, o)| overlap > o) {
            best = Some((item, overlap));
        }
    }

    best.map(|(item, _)| clean_money_string(&item.text))
}

/// Bottom-right numeric text, lowest then rightmost first
pub fn bottom_right(data: &[StandardizedRecord], tables: &KeywordTables) -> Option<String> {
    let max_x = data.iter().map(|d| d.text_box.x2).max()?;
    let max_y = data.iter().map(|d| d.text_box.y2).max()?;
    let region_x = max_x as f64 * 0.4;
    let region_y = max_y as f64 * 0.55;

    let mut found: Vec<(String, i32, i32)> = data
        .iter()
        .filter(|d| d.text_box.x1 as f64 > region_x && d.text_box.y1 as f64 > region_y)
        .filter(|d| !tables.is_excluded_total(&d.lower))
        .map(|d| (clean_money_string(&d.text), d.text_box.y1, d.text_box.x1))
        .filter(|(cleaned, _, _)| cleaned.chars().count() >= 3)
        .collect();

    found.sort_by_key(|&(_, y, x)| (Reverse(y), Reverse(x)));
    found.into_iter().next().map(|(cleaned, _, _)| cleaned)
}
