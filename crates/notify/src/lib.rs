//! Notification engine for space-weather alerts.
//!
//! This crate provides:
//! - `Notifier` trait for pluggable delivery channels
//! - SMTP email, HTTP webhook (SMS gateway), and log-only notifiers
//! - Minijinja rendering for SMS templates
//! - `NotificationComposer` deriving SMS/email payloads from alert records
//! - Dispatcher that routes SMS and email to their configured channels

pub mod composer;
pub mod dispatcher;
pub mod dry_run;
pub mod email;
pub mod templating;
pub mod traits;
pub mod webhook;

pub use composer::{abbreviate_sms, below_latitude, NotificationComposer, NotificationPayload, SmsStyle};
pub use dispatcher::Dispatcher;
pub use dry_run::LogNotifier;
pub use email::{EmailNotifier, SmtpSecurity, SmtpSettings};
pub use templating::TemplateRenderer;
pub use traits::{DispatchResult, Notification, NotificationKind, Notifier, NotifyError};
pub use webhook::WebhookNotifier;
