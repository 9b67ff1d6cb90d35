//! Channel trait and the message type that flows through it.

use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Gateway rejected message ({status}): {detail}")]
    Rejected { status: u16, detail: String },

    #[error("SMTP delivery failed: {0}")]
    Smtp(String),

    #[error("Delivery timed out after {0:?}")]
    Timeout(Duration),

    #[error("Template rendering failed: {0}")]
    Template(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Sms,
    Email,
}

/// One composed message, addressed to every channel of its kind.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    /// Email only.
    pub subject: Option<String>,
    pub body: String,
    pub metadata: HashMap<String, String>,
}

impl Notification {
    pub fn sms(text: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Sms,
            subject: None,
            body: text.into(),
            metadata: HashMap::new(),
        }
    }

    pub fn email(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Email,
            subject: Some(subject.into()),
            body: body.into(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// `CODE/serial` of the alert this message is about, or `""`.
    pub fn alert_key(&self) -> &str {
        self.metadata.get("alert_key").map(String::as_str).unwrap_or("")
    }
}

/// A delivery channel (SMS gateway, SMTP relay, log).
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;

    /// Short name used in logs and dispatch results.
    fn channel_name(&self) -> &str;
}

/// Outcome of one channel delivery.
#[derive(Debug)]
pub struct DispatchResult {
    pub channel: String,
    pub alert_key: String,
    pub success: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
}
