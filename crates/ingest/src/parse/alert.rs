//! Alert bulletin grammar.
//!
//! A bulletin is a CRLF-delimited block of `Label: value` lines. The scanner
//! walks it once, front to back, and sorts every line into one of:
//!
//! - boilerplate, dropped
//! - a line with its own handler (supersedes notice, storm-level table,
//!   potential impacts, poleward latitude)
//! - a known `Label: ` / `Label - ` prefix, stored under its cleaned key
//! - everything else, kept verbatim in `unhandled_lines`
//!
//! More than one handler may fire on the same line: the poleward-latitude
//! line yields `latitude` and also `potential_impacts` from the prefix table.

use indexmap::IndexMap;
use stormwatch_core::wire_time::{normalize_report_time, parse_feed_timestamp};
use stormwatch_core::{AlertRecord, FieldValue, RawProduct, StormwatchError};

use super::text::{clean_key, match_prefix, LineCursor};

/// Page-footer lines carried by every scale-related bulletin.
const IGNORED_LINES: [&str; 2] = [
    "NOAA Space Weather Scale descriptions can be found at",
    "www.swpc.noaa.gov/noaa-scales-explanation",
];

const SUPERSEDES_LINE: &str = "THIS SUPERSEDES ANY/ALL PRIOR WATCHES IN EFFECT";
const SUPERSEDES_KEY: &str = "supersedes";

const STORM_LEVEL_HEADER: &str = "Highest Storm Level Predicted by Day:";
const STORM_LEVEL_SEPARATOR: &str = "   ";

const POTENTIAL_IMPACTS: &str = "Potential Impacts: ";
const SATELLITE_IMPACTS: &str = "Potential Impacts: Satellite";
const AREA_IMPACTS: &str = "Potential Impacts: Area";
const IMPACT_CATEGORIES: [&str; 5] = [
    "Radio - ",
    "Induced Currents - ",
    "Aurora - ",
    "Spacecraft - ",
    "Navigation - ",
];

const POLEWARD_IMPACTS: &str = "Potential Impacts: Area of impact primarily poleward of ";
const LATITUDE_KEY: &str = "latitude";

const MESSAGE_CODE_KEY: &str = "space_weather_message_code";
const SERIAL_NUMBER_KEY: &str = "serial_number";

/// Report-format instants rewritten to the canonical form after the scan.
const TIME_FIELDS: [&str; 5] = [
    "valid_from",
    "valid_to",
    "issue_time",
    "now_valid_until",
    "threshold_reached",
];

/// Known single-line labels, tried in order.
pub const KNOWN_PREFIXES: [&str; 43] = [
    "ALERT: ",
    "Active Warning: ",
    "Aurora - ",
    "Begin Time: ",
    "CANCEL WARNING: ",
    "CONTINUED ALERT: ",
    "Cancel Serial Number: ",
    "Comment: ",
    "Continuation of Serial Number: ",
    "Description: ",
    "Deviation: ",
    "EXTENDED WARNING: ",
    "End Time: ",
    "Estimated Velocity: ",
    "Extension to Serial Number: ",
    "IP Shock Passage Observed: ",
    "Induced Currents - ",
    "Issue Time: ",
    "Location: ",
    "Maximum 10MeV Flux: ",
    "Maximum Time: ",
    "NOAA Scale: ",
    "Navigation - ",
    "Now Valid Until: ",
    "Observed: ",
    "Optical Class: ",
    "Original Issue Time: ",
    "Potential Impacts: ",
    "Radio - ",
    "SUMMARY: ",
    "Serial Number: ",
    "Space Weather Message Code: ",
    "Spacecraft - ",
    "Station: ",
    "Synoptic Period: ",
    "Threshold Reached: ",
    "Valid From: ",
    "Valid To: ",
    "WARNING: ",
    "WATCH: ",
    "Warning Condition: ",
    "X-ray Class: ",
    "Yesterday Maximum 2MeV Flux: ",
];

/// Parse one alert feed item into an [`AlertRecord`].
///
/// Fails only when the identity fields are missing or malformed, or when a
/// time field cannot be read. Unknown lines never fail the record.
pub fn parse_alert(raw: &RawProduct) -> Result<AlertRecord, StormwatchError> {
    let issued_at = parse_feed_timestamp(&raw.issued_at)?;
    let (mut fields, unhandled_lines) = scan_fields(&raw.body);

    normalize_time_fields(&mut fields)?;

    let message_code = fields
        .get(MESSAGE_CODE_KEY)
        .map(FieldValue::to_string)
        .ok_or_else(|| StormwatchError::MissingRequiredField(MESSAGE_CODE_KEY.to_string()))?;
    let serial = fields
        .get(SERIAL_NUMBER_KEY)
        .map(FieldValue::to_string)
        .ok_or_else(|| StormwatchError::MissingRequiredField(SERIAL_NUMBER_KEY.to_string()))?;
    let serial_number = serial.parse::<i64>().map_err(|_| StormwatchError::InvalidField {
        field: SERIAL_NUMBER_KEY.to_string(),
        value: serial.clone(),
    })?;

    Ok(AlertRecord {
        message_code,
        serial_number,
        product_id: raw.product_id.clone(),
        issued_at,
        message: raw.body.clone(),
        fields,
        unhandled_lines,
    })
}

/// The line scan on its own: field bag plus unrecognized lines.
pub fn scan_fields(body: &str) -> (IndexMap<String, FieldValue>, Vec<String>) {
    let mut cursor = LineCursor::for_alert(body);
    let mut fields = IndexMap::new();
    let mut unhandled = Vec::new();

    while let Some(line) = cursor.next_line() {
        if IGNORED_LINES.contains(&line.as_str()) {
            continue;
        }

        if line == SUPERSEDES_LINE {
            fields.insert(SUPERSEDES_KEY.to_string(), FieldValue::Text(line));
            continue;
        }

        if line == STORM_LEVEL_HEADER {
            match cursor.lookahead(0).map(parse_storm_levels) {
                Some((levels, rejected)) => {
                    cursor.consume(1);
                    fields.insert(clean_key(STORM_LEVEL_HEADER), FieldValue::Map(levels));
                    unhandled.extend(rejected);
                }
                None => unhandled.push(line),
            }
            continue;
        }

        let mut handled = false;

        if let Some((key, value)) = impact_category(&line) {
            fields.insert(key, FieldValue::Text(value.to_string()));
            handled = true;
        }

        if let Some(rest) = line.strip_prefix(POLEWARD_IMPACTS) {
            let token = rest.split_whitespace().next().unwrap_or_default();
            let latitude = token
                .parse::<i64>()
                .map(FieldValue::Integer)
                .unwrap_or_else(|_| FieldValue::Text(token.to_string()));
            fields.insert(LATITUDE_KEY.to_string(), latitude);
        }

        if let Some((prefix, value)) = match_prefix(&line, &KNOWN_PREFIXES) {
            fields.insert(clean_key(prefix), FieldValue::Text(value.to_string()));
            handled = true;
        }

        if !handled {
            tracing::debug!(line = %line, "unhandled alert line");
            unhandled.push(line);
        }
    }

    (fields, unhandled)
}

/// `Potential Impacts: <Category> - <text>` for the five impact categories.
/// The satellite and area variants are left to the prefix table.
fn impact_category(line: &str) -> Option<(String, &str)> {
    if line.starts_with(SATELLITE_IMPACTS) || line.starts_with(AREA_IMPACTS) {
        return None;
    }
    let rest = line.strip_prefix(POTENTIAL_IMPACTS)?.trim();
    match_prefix(rest, &IMPACT_CATEGORIES).map(|(category, value)| (clean_key(category), value))
}

/// `Apr 24:  G3 (Strong)   Apr 25:  G1 (Minor)` → `{Apr 24: G3 (Strong), ...}`.
///
/// Pieces without a `:` separator are returned separately.
fn parse_storm_levels(line: &str) -> (IndexMap<String, String>, Vec<String>) {
    let mut normalized = line.to_string();
    while normalized.contains(":  ") {
        normalized = normalized.replace(":  ", ": ");
    }

    let mut levels = IndexMap::new();
    let mut rejected = Vec::new();
    for piece in normalized.split(STORM_LEVEL_SEPARATOR).map(str::trim).filter(|p| !p.is_empty()) {
        match piece.split_once(':') {
            Some((day, level)) => {
                levels.insert(day.trim().to_string(), level.trim().to_string());
            }
            None => rejected.push(piece.to_string()),
        }
    }
    (levels, rejected)
}

fn normalize_time_fields(fields: &mut IndexMap<String, FieldValue>) -> Result<(), StormwatchError> {
    for name in TIME_FIELDS {
        if let Some(value) = fields.get_mut(name) {
            let normalized = normalize_report_time(name, &value.to_string())?;
            *value = FieldValue::Text(normalized);
        }
    }
    Ok(())
}
