//! # Timestamp Utilities
//!
//! Every persisted timestamp is a Unix-millisecond string; every duration is
//! computed in whole seconds. Conversion between the two happens here only.

use crate::ValidationError;
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, Utc};

/// Offset-carrying formats tried after RFC 3339, e.g. Jira's `+0200` style.
const OFFSET_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"];

/// Offset-less formats, interpreted as UTC.
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Convert a date representation to a Unix-millisecond timestamp string.
///
/// Accepts RFC 3339 / ISO 8601 with or without an explicit offset, RFC 2822,
/// plain `YYYY-MM-DD` dates, and numeric epoch values (ten digits or fewer
/// are read as seconds, longer values as milliseconds).
///
/// # Errors
///
/// Returns [`ValidationError::MissingTime`] for empty input and
/// [`ValidationError::InvalidTime`] when no format matches.
///
/// # Examples
///
/// ```rust
/// use dora_core::time::to_unix_millis;
///
/// assert_eq!(to_unix_millis("2021-12-06T16:22:44Z").unwrap(), "1638807764000");
/// assert_eq!(to_unix_millis("2021-12-06T18:22:44+02:00").unwrap(), "1638807764000");
/// assert!(to_unix_millis("").is_err());
/// ```
pub fn to_unix_millis(date: &str) -> Result<String, ValidationError> {
    let value = date.trim();
    if value.is_empty() {
        return Err(ValidationError::MissingTime {
            context: "no date supplied for conversion".to_string(),
        });
    }

    parse_to_millis(value)
        .map(|millis| millis.to_string())
        .ok_or_else(|| ValidationError::InvalidTime {
            value: value.to_string(),
        })
}

fn parse_to_millis(value: &str) -> Option<i64> {
    if value.chars().all(|c| c.is_ascii_digit()) {
        let number: i64 = value.parse().ok()?;
        return Some(if value.len() <= 10 { number * 1000 } else { number });
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.timestamp_millis());
    }

    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(value, format) {
            return Some(dt.timestamp_millis());
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.timestamp_millis());
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc().timestamp_millis());
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().timestamp_millis())
}

/// Parse a stored millisecond timestamp string.
///
/// Returns `None` for empty or non-numeric values.
pub fn parse_millis(value: &str) -> Option<i64> {
    value.trim().parse::<i64>().ok()
}

/// Whole seconds between two millisecond timestamps.
///
/// Truncates toward zero, so `diff_seconds(a, b) == -diff_seconds(b, a)`.
/// The result is negative when `later_millis` precedes `earlier_millis`.
pub fn diff_seconds(earlier_millis: i64, later_millis: i64) -> i64 {
    (later_millis - earlier_millis) / 1000
}

/// Format a duration in seconds as `DD:HH:MM:SS`.
///
/// Each field is zero-padded to two digits; the day field grows as needed.
///
/// # Examples
///
/// ```rust
/// use dora_core::time::prettify;
///
/// assert_eq!(prettify(0), "00:00:00:00");
/// assert_eq!(prettify(86_400), "01:00:00:00");
/// assert_eq!(prettify(100 * 86_400), "100:00:00:00");
/// ```
pub fn prettify(seconds: u64) -> String {
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3_600;
    let minutes = (seconds % 3_600) / 60;
    let secs = seconds % 60;

    format!("{:02}:{:02}:{:02}:{:02}", days, hours, minutes, secs)
}

/// Current wall-clock time in Unix milliseconds
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Current local-machine date as `YYYYMMDD`
pub fn local_date_stamp() -> String {
    Local::now().format("%Y%m%d").to_string()
}

#[cfg(test)]
#[path = "time_tests.rs"]
mod tests;
