//! 27-day outlook grammar: header, `#` comments, then one row per day.

use stormwatch_core::wire_time::parse_calendar_date;
use stormwatch_core::{OutlookRecord, StormwatchError};

use super::header::read_header;
use super::text::LineCursor;

/// `2023 May 01 140 8 3`: date, radio flux, Ap, Kp.
fn parse_row(line: &str) -> Option<(chrono::NaiveDate, i64, i64, i64)> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let [year, month, day, flux, ap, kp] = tokens.as_slice() else {
        return None;
    };
    let date = parse_calendar_date(&format!("{year} {month} {day}"))?;
    Some((date, flux.parse().ok()?, ap.parse().ok()?, kp.parse().ok()?))
}

/// Parse a 27-day outlook report. Rows outside the grammar are kept in
/// `unhandled_lines`.
pub fn parse_outlook(text: &str) -> Result<OutlookRecord, StormwatchError> {
    let header = read_header(text)?;
    let mut cursor = LineCursor::for_report(text);

    let mut record = OutlookRecord {
        product: header.product,
        issued_at: header.issued_at,
        radio_flux: Default::default(),
        ap_index: Default::default(),
        kp_index: Default::default(),
        unhandled_lines: Vec::new(),
        raw: text.to_string(),
    };

    while let Some(line) = cursor.next_line() {
        if line.starts_with('#') || line.starts_with(':') {
            continue;
        }
        match parse_row(&line) {
            Some((date, flux, ap, kp)) => {
                record.radio_flux.insert(date, flux);
                record.ap_index.insert(date, ap);
                record.kp_index.insert(date, kp);
            }
            None => {
                tracing::debug!(line = %line, "unhandled outlook line");
                record.unhandled_lines.push(line);
            }
        }
    }

    Ok(record)
}
