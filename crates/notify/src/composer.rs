//! Derives SMS and email payloads from accepted alert records.
//!
//! Only alerts carrying both an `aurora` and a `latitude` field produce
//! anything. Whether the payload is actually sent is the caller's call,
//! usually via [`below_latitude`].

use std::str::FromStr;

use serde::Serialize;
use stormwatch_core::AlertRecord;

use crate::templating::{SmsContext, TemplateRenderer, LINK_SMS_TEMPLATE, PLAIN_SMS_TEMPLATE};
use crate::traits::NotifyError;

/// Single-segment SMS budget, in characters.
pub const SMS_MAX_CHARS: usize = 160;

/// Applied in order, each only while the text is still over budget.
const SMS_ABBREVIATIONS: [(&str, &str); 3] = [("latitude", "lat"), ("GMLat", "GML"), ("northern", "N")];

/// Email subject candidates, highest priority first.
const HEADLINE_FIELDS: [&str; 7] = [
    "alert",
    "watch",
    "warning",
    "summary",
    "extended_warning",
    "cancel_warning",
    "continued_alert",
];

const NO_HEADLINE_SUBJECT: &str = "-";

/// Built-in SMS template choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SmsStyle {
    /// Includes the aurora description.
    #[default]
    Plain,
    /// Replaces the aurora description with a deep link.
    Link,
}

impl SmsStyle {
    fn template(self) -> &'static str {
        match self {
            SmsStyle::Plain => PLAIN_SMS_TEMPLATE,
            SmsStyle::Link => LINK_SMS_TEMPLATE,
        }
    }
}

impl FromStr for SmsStyle {
    type Err = NotifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plain" | "" => Ok(SmsStyle::Plain),
            "link" | "url" => Ok(SmsStyle::Link),
            other => Err(NotifyError::Config(format!("unknown SMS style: {other}"))),
        }
    }
}

/// Notification text derived from one alert. Never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NotificationPayload {
    pub sms_text: Option<String>,
    pub email_subject: Option<String>,
    pub email_body: Option<String>,
}

impl NotificationPayload {
    pub fn is_empty(&self) -> bool {
        self.sms_text.is_none() && self.email_subject.is_none() && self.email_body.is_none()
    }
}

/// Builds [`NotificationPayload`]s from alert records.
#[derive(Debug)]
pub struct NotificationComposer {
    renderer: TemplateRenderer,
    link_base_url: String,
    sms_template: String,
}

impl NotificationComposer {
    pub fn new(link_base_url: &str, style: SmsStyle) -> Self {
        Self {
            renderer: TemplateRenderer::new(),
            link_base_url: link_base_url.trim_end_matches('/').to_string(),
            sms_template: style.template().to_string(),
        }
    }

    /// Use a custom minijinja SMS template (see [`SmsContext`] for variables).
    pub fn with_template(link_base_url: &str, template: String) -> Result<Self, NotifyError> {
        let mut composer = Self::new(link_base_url, SmsStyle::Plain);
        composer
            .renderer
            .validate(&template)
            .map_err(|e| NotifyError::Config(format!("invalid SMS template: {e}")))?;
        composer.sms_template = template;
        Ok(composer)
    }

    pub fn is_eligible(record: &AlertRecord) -> bool {
        record.field("aurora").is_some() && record.field("latitude").is_some()
    }

    /// Compose SMS and email text. Ineligible records yield an empty payload.
    pub fn compose(&self, record: &AlertRecord) -> Result<NotificationPayload, NotifyError> {
        if !Self::is_eligible(record) {
            return Ok(NotificationPayload::default());
        }

        Ok(NotificationPayload {
            sms_text: Some(self.sms_text(record)?),
            email_subject: Some(email_subject(record)),
            email_body: Some(format!("{}\n\n{}", record.message.trim_end(), self.deep_link(record))),
        })
    }

    pub fn deep_link(&self, record: &AlertRecord) -> String {
        format!(
            "{}/events/{}/{}",
            self.link_base_url, record.message_code, record.serial_number
        )
    }

    fn sms_text(&self, record: &AlertRecord) -> Result<String, NotifyError> {
        let field_text = |name: &str| record.field(name).map(|v| v.to_string());
        let ctx = SmsContext {
            code: record.message_code.clone(),
            serial: record.serial_number,
            aurora: field_text("aurora").unwrap_or_default(),
            link: self.deep_link(record),
            latitude: field_text("latitude").unwrap_or_default(),
            valid_from: field_text("valid_from"),
            valid_to: field_text("valid_to"),
        };
        let rendered = self.renderer.render(&self.sms_template, &ctx)?;
        Ok(abbreviate_sms(rendered))
    }
}

/// `"<LABEL>: <value>"` for the first headline field present, else `"-"`.
pub fn email_subject(record: &AlertRecord) -> String {
    HEADLINE_FIELDS
        .iter()
        .find_map(|name| {
            record.field(name).map(|value| {
                let label = name.to_uppercase().replace('_', " ");
                format!("{label}: {value}")
            })
        })
        .unwrap_or_else(|| NO_HEADLINE_SUBJECT.to_string())
}

/// Shorten an over-budget SMS with the fixed abbreviation sequence.
///
/// Text still over [`SMS_MAX_CHARS`] after all substitutions is returned
/// as-is; nothing is truncated.
pub fn abbreviate_sms(mut text: String) -> String {
    for (long, short) in SMS_ABBREVIATIONS {
        if text.chars().count() <= SMS_MAX_CHARS {
            break;
        }
        text = text.replace(long, short);
    }
    text
}

/// Dispatch gate: integer `latitude` strictly below `max_latitude`.
pub fn below_latitude(record: &AlertRecord, max_latitude: i64) -> bool {
    record
        .field("latitude")
        .and_then(|v| v.as_integer())
        .is_some_and(|lat| lat < max_latitude)
}
