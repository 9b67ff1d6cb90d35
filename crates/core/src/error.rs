use thiserror::Error;

/// Failures that abort processing of a single product.
///
/// An already-stored key is not an error; stores report it through
/// `PutOutcome::AlreadyExists`. Unrecognized lines are kept on the record.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StormwatchError {
    #[error("Malformed timestamp in '{field}': {value}")]
    MalformedTimestamp { field: String, value: String },

    #[error("Missing required field: {0}")]
    MissingRequiredField(String),

    #[error("Invalid value for '{field}': {value}")]
    InvalidField { field: String, value: String },

    #[error("Malformed '{section}' table: {reason}")]
    MalformedTable { section: String, reason: String },

    #[error("Feed decode error: {0}")]
    Decode(String),

    #[error("Upstream fetch failed: {0}")]
    UpstreamFetch(String),

    #[error("Store error: {0}")]
    StorePersist(String),
}

impl StormwatchError {
    pub fn timestamp(field: &str, value: &str) -> Self {
        Self::MalformedTimestamp {
            field: field.to_string(),
            value: value.to_string(),
        }
    }

    pub fn table(section: &str, reason: impl Into<String>) -> Self {
        Self::MalformedTable {
            section: section.to_string(),
            reason: reason.into(),
        }
    }
}
