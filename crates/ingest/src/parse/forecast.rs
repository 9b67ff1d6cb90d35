//! 3-day geomagnetic forecast grammar.
//!
//! The report is a header plus three positional tables, each introduced by a
//! marker line. Column dates come from the line under the Kp marker and apply
//! to the Ap and probability tables too, so they are resolved before the scan.

use chrono::{DateTime, NaiveDate, Utc};
use stormwatch_core::wire_time::{resolve_forecast_day, resolve_observed_day};
use stormwatch_core::{ForecastRecord, StormwatchError};

use super::header::read_header;
use super::text::{clean_key, LineCursor};

const AP_MARKER: &str = "NOAA Ap Index Forecast";
const PROBABILITY_MARKER: &str = "NOAA Geomagnetic Activity Probabilities";
const KP_MARKER: &str = "NOAA Kp index forecast";

const AP_ROWS: usize = 3;
/// Active, minor storm, moderate storm, strong-extreme storm.
const PROBABILITY_ROWS: usize = 4;
/// Date line plus eight three-hour windows.
const KP_ROWS: usize = 1 + 8;

const AP_TOKEN: &str = "Ap ";
const TARGET_DATES_FIELD: &str = "kp_index_dates";

/// Parse a 3-day forecast report.
pub fn parse_forecast(text: &str) -> Result<ForecastRecord, StormwatchError> {
    let header = read_header(text)?;
    let mut cursor = LineCursor::for_report(text);
    let targets = target_dates(&cursor, header.issued_at)?;

    let mut record = ForecastRecord {
        product: header.product,
        issued_at: header.issued_at,
        storm_probabilities: Default::default(),
        kp_index: Default::default(),
        ap_index: Default::default(),
        ap_summary: Default::default(),
        raw: text.to_string(),
    };

    while let Some(line) = cursor.next_line() {
        if line.starts_with(AP_MARKER) {
            let rows = take_rows(&mut cursor, AP_ROWS, AP_MARKER)?;
            read_ap_rows(&rows, &targets, &mut record)?;
        } else if line.starts_with(PROBABILITY_MARKER) {
            let rows = take_rows(&mut cursor, PROBABILITY_ROWS, PROBABILITY_MARKER)?;
            read_probability_rows(&rows, &targets, &mut record)?;
        } else if line.starts_with(KP_MARKER) {
            let rows = take_rows(&mut cursor, KP_ROWS, KP_MARKER)?;
            read_kp_rows(&rows[1..], &targets, &mut record)?;
        }
    }

    Ok(record)
}

/// `May 01 May 02 May 03` under the Kp marker, resolved against the issue time.
fn target_dates(cursor: &LineCursor, issued: DateTime<Utc>) -> Result<Vec<NaiveDate>, StormwatchError> {
    let line = cursor
        .line_after(KP_MARKER)
        .ok_or_else(|| StormwatchError::MissingRequiredField(TARGET_DATES_FIELD.to_string()))?;

    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.is_empty() || tokens.len() % 2 != 0 {
        return Err(StormwatchError::table(KP_MARKER, format!("unreadable date line: {line}")));
    }

    tokens
        .chunks(2)
        .map(|pair| {
            let day = pair.join(" ");
            resolve_forecast_day(issued, &day)
                .ok_or_else(|| StormwatchError::table(KP_MARKER, format!("unreadable date: {day}")))
        })
        .collect()
}

fn take_rows(cursor: &mut LineCursor, n: usize, section: &str) -> Result<Vec<String>, StormwatchError> {
    if cursor.remaining() < n {
        return Err(StormwatchError::table(
            section,
            format!("expected {n} lines, found {}", cursor.remaining()),
        ));
    }
    Ok((0..n).filter_map(|_| cursor.next_line()).collect())
}

/// `Observed Ap 29 Apr 010`, `Estimated Ap 30 Apr 008`,
/// `Predicted Ap 01 May-03 May 012-010-008`.
fn read_ap_rows(rows: &[String], targets: &[NaiveDate], record: &mut ForecastRecord) -> Result<(), StormwatchError> {
    for row in rows {
        let tokens: Vec<&str> = row.split_whitespace().collect();
        let (Some(label), Some(value)) = (tokens.first(), tokens.last()) else {
            continue;
        };
        let key = clean_key(label);
        let rest = row[label.len()..].trim();
        let summary = rest.strip_prefix(AP_TOKEN).unwrap_or(rest);
        record.ap_summary.insert(key.clone(), summary.to_string());

        match key.as_str() {
            "observed" | "estimated" => {
                let day = tokens
                    .get(2..4)
                    .map(|t| t.join(" "))
                    .ok_or_else(|| StormwatchError::table(AP_MARKER, format!("no date in row: {row}")))?;
                let date = resolve_observed_day(record.issued_at, &day)
                    .ok_or_else(|| StormwatchError::table(AP_MARKER, format!("unreadable date: {day}")))?;
                record.ap_index.insert(date, value.to_string());
            }
            "predicted" => {
                let parts: Vec<&str> = value.split('-').collect();
                if parts.len() == targets.len() {
                    for (date, part) in targets.iter().zip(parts) {
                        record.ap_index.insert(*date, part.to_string());
                    }
                } else {
                    for date in targets {
                        record.ap_index.insert(*date, value.to_string());
                    }
                }
            }
            _ => return Err(StormwatchError::table(AP_MARKER, format!("unexpected row: {row}"))),
        }
    }
    Ok(())
}

/// `Active 25/20/15` and the three storm rows, in that order.
fn read_probability_rows(
    rows: &[String],
    targets: &[NaiveDate],
    record: &mut ForecastRecord,
) -> Result<(), StormwatchError> {
    for (idx, row) in rows.iter().enumerate() {
        let cells = row
            .split_whitespace()
            .last()
            .unwrap_or_default()
            .split('/')
            .map(|cell| cell.parse::<i64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| StormwatchError::table(PROBABILITY_MARKER, format!("non-numeric row: {row}")))?;
        if cells.len() < targets.len() {
            return Err(StormwatchError::table(PROBABILITY_MARKER, format!("short row: {row}")));
        }

        for (date, pct) in targets.iter().zip(cells) {
            let day = record.storm_probabilities.entry(*date).or_default();
            match idx {
                0 => day.active = pct,
                1 => day.minor = pct,
                2 => day.moderate = pct,
                _ => day.extreme = pct,
            }
        }
    }
    Ok(())
}

/// `00-03UT 3.67 2.67 2.33`; storm annotations such as `(G1)` are skipped.
fn read_kp_rows(rows: &[String], targets: &[NaiveDate], record: &mut ForecastRecord) -> Result<(), StormwatchError> {
    for row in rows {
        let tokens: Vec<&str> = row.split_whitespace().filter(|t| !t.starts_with('(')).collect();
        let Some((window, values)) = tokens.split_first() else {
            continue;
        };
        if values.len() < targets.len() {
            return Err(StormwatchError::table(KP_MARKER, format!("short row: {row}")));
        }

        let values = &values[values.len() - targets.len()..];
        for (date, value) in targets.iter().zip(values) {
            let kp = value
                .parse::<f64>()
                .ok()
                .filter(|kp| kp.is_finite())
                .ok_or_else(|| StormwatchError::table(KP_MARKER, format!("non-numeric cell '{value}' in: {row}")))?;
            record
                .kp_index
                .entry(*date)
                .or_default()
                .insert(window.to_string(), kp);
        }
    }
    Ok(())
}
