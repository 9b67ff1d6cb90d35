//! Hands newly accepted alerts to the notify crate.
//!
//! Payloads are composed for every eligible alert; they are dispatched only
//! when the alert's impact latitude is below the configured maximum.
//! Delivery problems are logged by the dispatcher and never reach the
//! ingestion cycle.

use std::str::FromStr;
use std::sync::Arc;

use stormwatch_core::config::NotifyConfig;
use stormwatch_core::AlertRecord;
use stormwatch_notify::{
    below_latitude, Dispatcher, EmailNotifier, LogNotifier, NotificationComposer, NotifyError, SmsStyle,
    SmtpSettings, TemplateRenderer, WebhookNotifier,
};

/// What happened to one accepted alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
    /// Missing `aurora` or `latitude`.
    Ineligible,
    /// Composed but held back by the latitude gate.
    Gated,
    Dispatched { delivered: usize, failed: usize },
    ComposeFailed,
}

pub struct AlertNotifications {
    composer: NotificationComposer,
    dispatcher: Arc<Dispatcher>,
    max_latitude: i64,
}

impl AlertNotifications {
    pub fn new(composer: NotificationComposer, dispatcher: Arc<Dispatcher>, max_latitude: i64) -> Self {
        Self {
            composer,
            dispatcher,
            max_latitude,
        }
    }

    /// Build composer and channels from config. With `dry_run`, both SMS and
    /// email go to the log instead of being delivered.
    pub fn from_config(config: &NotifyConfig, dry_run: bool) -> Result<Self, NotifyError> {
        let composer = match &config.sms_template {
            Some(template) => NotificationComposer::with_template(&config.link_base_url, template.clone())?,
            None => NotificationComposer::new(&config.link_base_url, SmsStyle::from_str(&config.sms_style)?),
        };

        let mut dispatcher = Dispatcher::empty();
        if dry_run {
            dispatcher.add_sms_channel(Box::new(LogNotifier::new()));
            dispatcher.add_email_channel(Box::new(LogNotifier::new()));
        } else {
            let renderer = Arc::new(TemplateRenderer::new());
            if let Some(webhook) = WebhookNotifier::from_notify_config(config, renderer)? {
                dispatcher.add_sms_channel(Box::new(webhook));
            }
            if let Some(settings) = SmtpSettings::from_notify_config(config) {
                dispatcher.add_email_channel(Box::new(EmailNotifier::new(&settings)?));
            }
            if !dispatcher.has_channels() {
                tracing::info!("no notification channels configured; alerts will be composed only");
            }
        }

        Ok(Self::new(composer, Arc::new(dispatcher), config.max_latitude))
    }

    pub fn max_latitude(&self) -> i64 {
        self.max_latitude
    }

    /// Compose and, if the latitude gate allows, dispatch one accepted alert.
    pub async fn on_accepted(&self, record: &AlertRecord) -> NotifyOutcome {
        let alert_key = record.key().to_string();

        let payload = match self.composer.compose(record) {
            Ok(payload) if payload.is_empty() => return NotifyOutcome::Ineligible,
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(alert_key = %alert_key, error = %e, "failed to compose notification");
                return NotifyOutcome::ComposeFailed;
            }
        };

        if !below_latitude(record, self.max_latitude) {
            tracing::debug!(
                alert_key = %alert_key,
                max_latitude = self.max_latitude,
                "notification composed but not dispatched"
            );
            return NotifyOutcome::Gated;
        }

        let mut results = Vec::new();
        if let Some(text) = &payload.sms_text {
            results.extend(self.dispatcher.send_sms(text, &alert_key).await);
        }
        if let (Some(subject), Some(body)) = (&payload.email_subject, &payload.email_body) {
            results.extend(self.dispatcher.send_email(subject, body, &alert_key).await);
        }

        let delivered = results.iter().filter(|r| r.success).count();
        NotifyOutcome::Dispatched {
            delivered,
            failed: results.len() - delivered,
        }
    }
}
