//! Display formatting helpers

use chrono::{DateTime, Local, NaiveDateTime};
use serde_json::Value;

use super::risk::coerce_number;

/// Placeholder for missing or non-numeric values
pub const PLACEHOLDER: &str = "—";

const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn format_number(value: f64, digits: usize) -> String {
    if value.is_finite() {
        format!("{:.*}", digits, value)
    } else {
        PLACEHOLDER.to_string()
    }
}

/// `0.42` -> `42%`
pub fn format_percent(value: f64, digits: usize) -> String {
    if value.is_finite() {
        format!("{:.*}%", digits, value * 100.0)
    } else {
        PLACEHOLDER.to_string()
    }
}

/// JSON payload fields that may be numbers, numeric strings or junk.
pub fn format_value(value: &Value, digits: usize) -> String {
    coerce_number(value)
        .map(|n| format_number(n, digits))
        .unwrap_or_else(|| PLACEHOLDER.to_string())
}

/// Render a server timestamp in local time.
///
/// Offset-less timestamps are shown as-is; anything unparseable is
/// returned verbatim.
pub fn format_timestamp(ts: &str) -> String {
    let ts = ts.trim();
    if ts.is_empty() {
        return PLACEHOLDER.to_string();
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(ts) {
        return dt.with_timezone(&Local).format(DISPLAY_FORMAT).to_string();
    }

    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(ts, pattern) {
            return naive.format(DISPLAY_FORMAT).to_string();
        }
    }

    ts.to_string()
}
