//! Alert email over SMTP (`lettre`).

use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use stormwatch_core::config::NotifyConfig;

use crate::traits::{Notification, Notifier, NotifyError};

const DEFAULT_SMTP_PORT: u16 = 587;
const IMPLICIT_TLS_PORT: u16 = 465;

/// Subject used when a notification carries none.
const FALLBACK_SUBJECT: &str = "-";

/// How the SMTP connection is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpSecurity {
    /// TLS from the first byte (port 465).
    Implicit,
    StartTls,
    /// Unencrypted; only for local relays.
    Plain,
}

impl SmtpSecurity {
    /// Port 465 always means implicit TLS; otherwise `tls` picks STARTTLS.
    pub fn for_port(port: u16, tls: bool) -> Self {
        match (port, tls) {
            (IMPLICIT_TLS_PORT, _) => Self::Implicit,
            (_, true) => Self::StartTls,
            (_, false) => Self::Plain,
        }
    }
}

/// Everything needed to open the SMTP transport.
#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub security: SmtpSecurity,
    pub from: String,
    pub to: Vec<String>,
    pub credentials: Option<(String, String)>,
}

impl SmtpSettings {
    /// `None` unless host, sender and at least one recipient are configured.
    pub fn from_notify_config(config: &NotifyConfig) -> Option<Self> {
        let host = config.smtp_host.clone()?;
        let from = config.email_from.clone()?;
        if config.email_to.is_empty() {
            return None;
        }
        let port = config.smtp_port.unwrap_or(DEFAULT_SMTP_PORT);
        let credentials = match (&config.smtp_username, &config.smtp_password) {
            (Some(user), Some(password)) => Some((user.clone(), password.clone())),
            _ => None,
        };
        Some(Self {
            host,
            port,
            security: SmtpSecurity::for_port(port, config.smtp_tls),
            from,
            to: config.email_to.clone(),
            credentials,
        })
    }
}

fn mailbox(address: &str) -> Result<Mailbox, NotifyError> {
    address
        .parse()
        .map_err(|e: lettre::address::AddressError| NotifyError::Config(format!("bad address '{address}': {e}")))
}

/// Sends alert emails to a fixed recipient list.
#[derive(Debug)]
pub struct EmailNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
}

impl EmailNotifier {
    pub fn new(settings: &SmtpSettings) -> Result<Self, NotifyError> {
        let from = mailbox(&settings.from)?;
        let to = settings.to.iter().map(|a| mailbox(a)).collect::<Result<Vec<_>, _>>()?;
        if to.is_empty() {
            return Err(NotifyError::Config("email channel needs a recipient".to_string()));
        }

        let relay_error = |e: lettre::transport::smtp::Error| NotifyError::Config(e.to_string());
        let mut builder = match settings.security {
            SmtpSecurity::Implicit => AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host).map_err(relay_error)?,
            SmtpSecurity::StartTls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host).map_err(relay_error)?
            }
            SmtpSecurity::Plain => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host),
        }
        .port(settings.port);

        if let Some((user, password)) = &settings.credentials {
            builder = builder.credentials(Credentials::new(user.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
            to,
        })
    }

    fn message(&self, notification: &Notification) -> Result<Message, NotifyError> {
        let subject = notification.subject.as_deref().unwrap_or(FALLBACK_SUBJECT);
        let mut builder = Message::builder().from(self.from.clone()).subject(subject);
        for recipient in &self.to {
            builder = builder.to(recipient.clone());
        }
        builder
            .body(notification.body.clone())
            .map_err(|e| NotifyError::Smtp(e.to_string()))
    }
}

#[async_trait::async_trait]
impl Notifier for EmailNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let message = self.message(notification)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| NotifyError::Smtp(e.to_string()))?;
        tracing::debug!(recipients = self.to.len(), "alert email accepted by relay");
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "email"
    }
}
