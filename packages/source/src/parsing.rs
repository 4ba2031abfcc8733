//! Shared parsing utilities for raw upstream values.
//!
//! Socrata returns most scalars as strings, but some deployments (and the
//! metadata endpoint) use JSON numbers, so every helper accepts both.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Parses a Socrata-style datetime.
///
/// Tries, in order: RFC 3339, naive ISO 8601 with and without fractional
/// seconds (taken as UTC), a plain `YYYY-MM-DD` date (midnight UTC), the
/// ISO 8601 basic forms `YYYYMMDDTHHMMSS` and `YYYYMMDD`, and finally epoch
/// seconds (fractional allowed).
#[must_use]
pub fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y%m%dT%H%M%S") {
        return Some(naive.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y%m%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }
    s.parse::<f64>().ok().and_then(from_epoch_f64)
}

/// Parses a date from a JSON value: a string via [`parse_date`] or a number
/// as epoch seconds.
#[must_use]
pub fn parse_date_value(value: &serde_json::Value) -> Option<DateTime<Utc>> {
    match value {
        serde_json::Value::String(s) => parse_date(s),
        serde_json::Value::Number(n) => n
            .as_i64()
            .and_then(from_epoch_seconds)
            .or_else(|| n.as_f64().and_then(from_epoch_f64)),
        _ => None,
    }
}

/// Reads an `f64` from a JSON number or numeric string.
#[must_use]
pub fn value_as_f64(value: &serde_json::Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

/// Reads an `i64` from a JSON integer or integer string.
#[must_use]
pub fn value_as_i64(value: &serde_json::Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

fn from_epoch_seconds(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn from_epoch_f64(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() || secs.abs() > 1e15 {
        return None;
    }
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1e9).round().min(999_999_999.0) as u32;
    DateTime::from_timestamp(whole as i64, nanos)
}
