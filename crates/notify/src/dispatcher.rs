//! Fans one alert's SMS and email out to their channel lists.
//!
//! A failing or slow channel is logged and reported in the results; it
//! never turns into an error for the caller and never blocks the channels
//! after it for longer than the delivery timeout.

use std::time::{Duration, Instant};

use crate::traits::{DispatchResult, Notification, NotificationKind, Notifier, NotifyError};

const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(30);

pub struct Dispatcher {
    sms_channels: Vec<Box<dyn Notifier>>,
    email_channels: Vec<Box<dyn Notifier>>,
    delivery_timeout: Duration,
}

impl Dispatcher {
    pub fn new(sms_channels: Vec<Box<dyn Notifier>>, email_channels: Vec<Box<dyn Notifier>>) -> Self {
        Self {
            sms_channels,
            email_channels,
            delivery_timeout: DEFAULT_DELIVERY_TIMEOUT,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new())
    }

    pub fn with_delivery_timeout(mut self, timeout: Duration) -> Self {
        self.delivery_timeout = timeout;
        self
    }

    pub fn add_sms_channel(&mut self, channel: Box<dyn Notifier>) {
        self.sms_channels.push(channel);
    }

    pub fn add_email_channel(&mut self, channel: Box<dyn Notifier>) {
        self.email_channels.push(channel);
    }

    pub fn has_channels(&self) -> bool {
        !self.sms_channels.is_empty() || !self.email_channels.is_empty()
    }

    pub async fn send_sms(&self, text: &str, alert_key: &str) -> Vec<DispatchResult> {
        self.dispatch(&Notification::sms(text).with_metadata("alert_key", alert_key))
            .await
    }

    pub async fn send_email(&self, subject: &str, body: &str, alert_key: &str) -> Vec<DispatchResult> {
        self.dispatch(&Notification::email(subject, body).with_metadata("alert_key", alert_key))
            .await
    }

    /// Deliver to every channel of the notification's kind, in order.
    pub async fn dispatch(&self, notification: &Notification) -> Vec<DispatchResult> {
        let alert_key = notification.alert_key();
        let channels = match notification.kind {
            NotificationKind::Sms => &self.sms_channels,
            NotificationKind::Email => &self.email_channels,
        };
        if channels.is_empty() {
            tracing::debug!(alert_key, kind = ?notification.kind, "no channels for notification kind");
        }

        let mut results = Vec::with_capacity(channels.len());
        for channel in channels {
            results.push(self.deliver(channel.as_ref(), notification, alert_key).await);
        }
        results
    }

    async fn deliver(&self, channel: &dyn Notifier, notification: &Notification, alert_key: &str) -> DispatchResult {
        let started = Instant::now();
        let outcome = match tokio::time::timeout(self.delivery_timeout, channel.send(notification)).await {
            Ok(sent) => sent,
            Err(_) => Err(NotifyError::Timeout(self.delivery_timeout)),
        };
        let duration_ms = started.elapsed().as_millis() as u64;

        let error = match outcome {
            Ok(()) => {
                tracing::info!(alert_key, channel = channel.channel_name(), duration_ms, "notification sent");
                None
            }
            Err(e) => {
                tracing::warn!(
                    alert_key,
                    channel = channel.channel_name(),
                    duration_ms,
                    error = %e,
                    "notification not delivered"
                );
                Some(e.to_string())
            }
        };

        DispatchResult {
            channel: channel.channel_name().to_string(),
            alert_key: alert_key.to_string(),
            success: error.is_none(),
            error,
            duration_ms,
        }
    }
}
