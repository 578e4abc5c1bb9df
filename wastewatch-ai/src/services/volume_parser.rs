//! Free-text volume estimate to cubic meters

use once_cell::sync::Lazy;
use regex::Regex;

static NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+\.?\d*").expect("number pattern is valid"));

const NO_ESTIMATE: [&str; 3] = ["unknown", "n/a", "not specified"];

/// First integer or decimal in `text`, or 0.0 when there is none.
///
/// Units are ignored and signs are dropped, so the result is never negative.
pub fn parse_volume(text: &str) -> f64 {
    let trimmed = text.trim();
    if trimmed.is_empty()
        || NO_ESTIMATE
            .iter()
            .any(|marker| trimmed.eq_ignore_ascii_case(marker))
    {
        return 0.0;
    }

    NUMBER
        .find(trimmed)
        .and_then(|m| m.as_str().trim_end_matches('.').parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}
