//! Timestamp parsing and formatting helpers for eventcat.
//!
//! Keeps every textual date/time representation used by the tool in one
//! place: the `yyyyMMdd` filter-option format, the XPath system-time form,
//! the compact output-line form, and the rotation suffix for exported files.

use chrono::{DateTime, NaiveDate, Utc};

/// Parse a `yyyyMMdd` filter date (e.g. `20240115`) into a UTC timestamp at
/// midnight of that day.
///
/// Returns `None` for anything that is not exactly a well-formed compact
/// date; callers treat that as a configuration error, not a silent no-op.
pub fn parse_compact_date(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if input.len() != 8 {
        return None;
    }
    let date = NaiveDate::parse_from_str(input, "%Y%m%d").ok()?;
    let naive = date.and_hms_opt(0, 0, 0)?;
    Some(DateTime::from_naive_utc_and_offset(naive, Utc))
}

/// Format a timestamp for an XPath `TimeCreated[@SystemTime ...]` clause.
///
/// The Event Log API expects ISO 8601 with millisecond precision and a
/// trailing `Z`.
pub fn format_xpath_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Format a timestamp for the compact output line.
///
/// Locale-independent UTC representation, e.g. `2024-01-15 10:23:45.123Z`.
pub fn format_event_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S%.3fZ").to_string()
}

/// Build the `yyyyMMddHHmmss` suffix used when rotating an existing output
/// file out of the way.
pub fn rotation_suffix(now: &DateTime<chrono::Local>) -> String {
    now.format("%Y%m%d%H%M%S").to_string()
}
