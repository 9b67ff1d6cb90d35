//! Log-only notifier for dry runs.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::traits::{Notification, Notifier, NotifyError};

/// Writes notifications to the tracing log instead of delivering them.
#[derive(Debug, Default)]
pub struct LogNotifier {
    sent: AtomicUsize,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> usize {
        self.sent.load(Ordering::Relaxed)
    }
}

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.sent.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            kind = ?notification.kind,
            alert_key = notification.alert_key(),
            subject = notification.subject.as_deref().unwrap_or(""),
            length = notification.body.chars().count(),
            body = %notification.body,
            "dry-run notification"
        );
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "log"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counts_without_delivering() {
        let notifier = LogNotifier::new();
        notifier.send(&Notification::sms("hello")).await.unwrap();
        notifier
            .send(&Notification::email("ALERT: Geomagnetic K-index of 6", "body").with_metadata("alert_key", "ALTK06/1"))
            .await
            .unwrap();
        assert_eq!(notifier.sent(), 2);
    }
}
