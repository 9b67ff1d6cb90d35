//! SMS delivery through an HTTP gateway.
//!
//! The gateway receives one POST per message. By default the body is
//! `{"text": ..., "alert_key": ...}`; a minijinja payload template can
//! reshape it for gateways with their own schema.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use stormwatch_core::config::NotifyConfig;

use crate::templating::TemplateRenderer;
use crate::traits::{Notification, Notifier, NotifyError};

const GATEWAY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct GatewayPayload<'a> {
    text: &'a str,
    alert_key: &'a str,
}

/// Posts SMS text to a gateway endpoint.
#[derive(Debug)]
pub struct WebhookNotifier {
    endpoint: String,
    token: Option<String>,
    payload_template: Option<String>,
    renderer: Arc<TemplateRenderer>,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(endpoint: impl Into<String>, renderer: Arc<TemplateRenderer>) -> Result<Self, NotifyError> {
        let endpoint = endpoint.into();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(NotifyError::Config(format!("SMS gateway URL must be http(s): {endpoint}")));
        }
        let client = reqwest::Client::builder().timeout(GATEWAY_TIMEOUT).build()?;
        Ok(Self {
            endpoint,
            token: None,
            payload_template: None,
            renderer,
            client,
        })
    }

    /// `None` when no gateway URL is configured. The token, if any, is sent
    /// as `Authorization: Bearer <token>`.
    pub fn from_notify_config(
        config: &NotifyConfig,
        renderer: Arc<TemplateRenderer>,
    ) -> Result<Option<Self>, NotifyError> {
        let Some(url) = &config.sms_webhook_url else {
            return Ok(None);
        };
        let mut notifier = Self::new(url.clone(), renderer)?;
        notifier.token = config.sms_webhook_token.clone();
        if let Some(template) = &config.sms_webhook_payload {
            notifier = notifier.with_payload_template(template.clone())?;
        }
        Ok(Some(notifier))
    }

    /// Template rendered with the [`Notification`] as context
    /// (`{{ body }}`, `{{ metadata.alert_key }}`).
    pub fn with_payload_template(mut self, template: impl Into<String>) -> Result<Self, NotifyError> {
        let template = template.into();
        self.renderer
            .validate(&template)
            .map_err(|e| NotifyError::Config(format!("invalid SMS payload template: {e}")))?;
        self.payload_template = Some(template);
        Ok(self)
    }

    fn payload(&self, notification: &Notification) -> Result<String, NotifyError> {
        if let Some(template) = &self.payload_template {
            return self.renderer.render(template, notification);
        }
        serde_json::to_string(&GatewayPayload {
            text: &notification.body,
            alert_key: notification.alert_key(),
        })
        .map_err(|e| NotifyError::Template(e.to_string()))
    }
}

#[async_trait::async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(self.payload(notification)?);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                detail,
            });
        }

        tracing::debug!(endpoint = %self.endpoint, %status, "SMS accepted by gateway");
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "sms-webhook"
    }
}
