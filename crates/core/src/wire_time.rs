//! Timestamp and date formats used by the SWPC products.
//!
//! Report bodies write instants as `2023 Apr 24 1755 UTC`; the alerts JSON
//! feed writes `2023-04-24 17:55:48.160` with a fractional part whose
//! padding has changed across schema versions.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::error::StormwatchError;

/// Canonical rendering of report instants, e.g. `2023/04/24T17:55Z`.
pub const CANONICAL_TIME_FORMAT: &str = "%Y/%m/%dT%H:%MZ";

const REPORT_TIME_FORMAT: &str = "%Y %b %d %H%M";
const UTC_ZONES: &[&str] = &["UTC", "UT", "GMT", "Z"];

const FEED_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Parse a report instant such as `2023 Apr 30 2205 UTC`.
pub fn parse_report_time(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    let (stamp, zone) = value.rsplit_once(char::is_whitespace)?;
    if !UTC_ZONES.iter().any(|z| zone.eq_ignore_ascii_case(z)) {
        return None;
    }
    NaiveDateTime::parse_from_str(stamp.trim(), REPORT_TIME_FORMAT)
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Rewrite a report instant into [`CANONICAL_TIME_FORMAT`].
pub fn normalize_report_time(field: &str, value: &str) -> Result<String, StormwatchError> {
    parse_report_time(value)
        .map(|dt| dt.format(CANONICAL_TIME_FORMAT).to_string())
        .ok_or_else(|| StormwatchError::timestamp(field, value))
}

/// Parse the alerts feed `issue_datetime`.
///
/// Accepts any fractional padding (`.160`, `.160000`, `.160000000`) and a
/// missing fractional part.
pub fn parse_feed_timestamp(value: &str) -> Result<DateTime<Utc>, StormwatchError> {
    let trimmed = value.trim();
    FEED_TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or_else(|| StormwatchError::timestamp("issue_datetime", value))
}

/// Resolve a `Mon DD` forecast day (e.g. `May 01`) against the issue instant.
///
/// A January day listed in a December issue belongs to the following year.
pub fn resolve_forecast_day(issued: DateTime<Utc>, day: &str) -> Option<NaiveDate> {
    let day = day.trim();
    let mut year = issued.year();
    if issued.month() == 12 && starts_with_month(day, "Jan") {
        year += 1;
    }
    NaiveDate::parse_from_str(&format!("{year} {day}"), "%Y %b %d").ok()
}

/// Resolve a `DD Mon` observation day (e.g. `29 Apr`) against the issue instant.
///
/// A December day observed in a January issue belongs to the previous year.
pub fn resolve_observed_day(issued: DateTime<Utc>, day: &str) -> Option<NaiveDate> {
    let day = day.trim();
    let month = day.split_whitespace().nth(1).unwrap_or_default();
    let mut year = issued.year();
    if issued.month() == 1 && starts_with_month(month, "Dec") {
        year -= 1;
    }
    NaiveDate::parse_from_str(&format!("{year} {day}"), "%Y %d %b").ok()
}

/// Parse a `YYYY Mon DD` calendar date.
pub fn parse_calendar_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y %b %d").ok()
}

fn starts_with_month(value: &str, month: &str) -> bool {
    value
        .get(..month.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(month))
}
