//! Positive-metric row filter shared by all sources

use serde_json::Value;
use tracing::debug;

/// Columns that decide whether a URL is included
pub const METRIC_FIELDS: [&str; 4] = ["clicks", "impressions", "ctr", "position"];

/// Parse a metric written as a bare number or a percentage (`"4.5%"`).
///
/// Returns `None` when the text is not a number.
pub fn parse_metric(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    let number = match trimmed.strip_suffix('%') {
        Some("") => return Some(0.0),
        Some(pct) => pct.trim(),
        None => trimmed,
    };
    number.parse::<f64>().ok()
}

/// Numeric value of a text metric; anything unparseable counts as zero
pub fn text_metric(raw: Option<&str>) -> f64 {
    match raw {
        Some(text) if !text.trim().is_empty() => parse_metric(text).unwrap_or_else(|| {
            debug!("Unparseable metric value {:?}", text);
            0.0
        }),
        _ => 0.0,
    }
}

/// Numeric value of a JSON metric; anything unparseable counts as zero
pub fn json_metric(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => text_metric(Some(s)),
        Some(Value::Bool(true)) => 1.0,
        _ => 0.0,
    }
}

/// Whether any metric of a row is strictly positive
pub fn has_positive_metric<F>(mut metric: F) -> bool
where
    F: FnMut(&str) -> f64,
{
    METRIC_FIELDS.into_iter().any(|field| metric(field) > 0.0)
}

/// Whether a JSON row object has a positive metric
pub fn json_row_has_positive_metric(row: &Value) -> bool {
    has_positive_metric(|field| json_metric(row.get(field)))
}
