//! Time utilities: timestamp parsing/formatting, durations in minutes.
//!
//! Timestamps are stored as RFC 3339 UTC text with second precision
//! (`2025-03-01T08:30:00Z`) so they sort lexicographically.

use crate::errors::{AppError, AppResult};
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse an RFC 3339 timestamp with any offset, normalized to UTC.
pub fn parse_timestamp(s: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s.trim())
        .map(|dt| dt.with_timezone(&Utc).trunc_subsecs(0))
        .map_err(|_| AppError::validation(format!("invalid timestamp: {s}")))
}

pub fn parse_optional_timestamp(input: Option<&str>) -> AppResult<Option<DateTime<Utc>>> {
    input.map(parse_timestamp).transpose()
}

pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

pub fn now_str() -> String {
    format_timestamp(&now())
}

pub fn minutes_between(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    (end - start).num_minutes()
}

pub fn format_minutes(mins: i64) -> String {
    let sign = if mins < 0 { "-" } else { "" };
    let m = mins.abs();
    format!("{}{:02}:{:02}", sign, m / 60, m % 60)
}
