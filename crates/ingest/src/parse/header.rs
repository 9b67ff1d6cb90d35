//! `:Product:` / `:Issued:` header shared by the forecast and outlook reports.

use chrono::{DateTime, Utc};
use stormwatch_core::wire_time::parse_report_time;
use stormwatch_core::StormwatchError;

use super::text::{clean_key, clean_line, match_prefix};

const PRODUCT_PREFIX: &str = ":Product: ";
const ISSUED_PREFIX: &str = ":Issued: ";
const HEADER_PREFIXES: [&str; 2] = [PRODUCT_PREFIX, ISSUED_PREFIX];

/// Identity of a report, enough to build its idempotency key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductHeader {
    pub product: String,
    pub issued_at: DateTime<Utc>,
}

/// Read the report header without parsing the body tables.
pub fn read_header(text: &str) -> Result<ProductHeader, StormwatchError> {
    let mut product = None;
    let mut issued = None;

    for line in text.lines().map(clean_line) {
        if let Some((prefix, value)) = match_prefix(&line, &HEADER_PREFIXES) {
            let slot = if prefix == PRODUCT_PREFIX { &mut product } else { &mut issued };
            slot.get_or_insert_with(|| value.to_string());
        }
        if product.is_some() && issued.is_some() {
            break;
        }
    }

    let product = product.ok_or_else(|| StormwatchError::MissingRequiredField(clean_key(PRODUCT_PREFIX)))?;
    let issued = issued.ok_or_else(|| StormwatchError::MissingRequiredField(clean_key(ISSUED_PREFIX)))?;
    let issued_at =
        parse_report_time(&issued).ok_or_else(|| StormwatchError::timestamp(&clean_key(ISSUED_PREFIX), &issued))?;

    Ok(ProductHeader { product, issued_at })
}
