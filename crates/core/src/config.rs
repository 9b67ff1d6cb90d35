use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u32(profile: &str, key: &str, default: u32) -> u32 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_i64(profile: &str, key: &str, default: i64) -> i64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_bool(profile: &str, key: &str, default: bool) -> bool {
    match profiled_env_opt(profile, key) {
        Some(v) => matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        None => default,
    }
}

/// Comma-separated list; blank entries are dropped.
fn profiled_env_list(profile: &str, key: &str) -> Vec<String> {
    profiled_env_opt(profile, key)
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub feeds: FeedConfig,
    pub storage: StorageConfig,
    pub ingest: IngestConfig,
    pub notify: NotifyConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `STORMWATCH_PROFILE`. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("STORMWATCH_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            feeds: FeedConfig::from_env_profiled(p),
            storage: StorageConfig::from_env_profiled(p),
            ingest: IngestConfig::from_env_profiled(p),
            notify: NotifyConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  feeds:    alerts={}, timeout={}s", self.feeds.alerts_url, self.feeds.timeout_secs);
        tracing::info!("  storage:  data_dir={}", self.storage.data_dir.display());
        tracing::info!("  ingest:   stop_on_seen={}", self.ingest.stop_on_seen);
        tracing::info!(
            "  notify:   max_latitude={}, sms={}, email={}",
            self.notify.max_latitude,
            self.notify.sms_configured(),
            self.notify.email_configured()
        );
    }

    /// Return a redacted view (no secrets, no recipient addresses).
    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "feeds": {
                "alerts_url": self.feeds.alerts_url,
                "forecast_url": self.feeds.forecast_url,
                "outlook_url": self.feeds.outlook_url,
                "timeout_secs": self.feeds.timeout_secs,
            },
            "storage": { "data_dir": self.storage.data_dir },
            "ingest": { "stop_on_seen": self.ingest.stop_on_seen },
            "notify": {
                "max_latitude": self.notify.max_latitude,
                "link_base_url": self.notify.link_base_url,
                "sms_style": self.notify.sms_style,
                "custom_sms_template": self.notify.sms_template.is_some(),
                "sms_configured": self.notify.sms_configured(),
                "email_configured": self.notify.email_configured(),
                "email_recipients": self.notify.email_to.len(),
            },
        })
    }
}

// ── Feeds ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    pub alerts_url: String,
    pub forecast_url: String,
    pub outlook_url: String,
    pub timeout_secs: u32,
}

impl FeedConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            alerts_url: profiled_env_or(p, "ALERTS_URL", "https://services.swpc.noaa.gov/products/alerts.json"),
            forecast_url: profiled_env_or(
                p,
                "FORECAST_URL",
                "https://services.swpc.noaa.gov/text/3-day-geomag-forecast.txt",
            ),
            outlook_url: profiled_env_or(p, "OUTLOOK_URL", "https://services.swpc.noaa.gov/text/27-day-outlook.txt"),
            timeout_secs: profiled_env_u32(p, "FEED_TIMEOUT_SECS", 30),
        }
    }
}

// ── Storage ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl StorageConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            data_dir: PathBuf::from(profiled_env_or(p, "DATA_DIR", "data")),
        }
    }
}

// ── Ingestion ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Stop a cycle's alert batch at the first already-stored bulletin.
    pub stop_on_seen: bool,
}

impl IngestConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            stop_on_seen: profiled_env_bool(p, "INGEST_STOP_ON_SEEN", true),
        }
    }
}

// ── Notifications ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Dispatch only when the alert's geomagnetic latitude is below this.
    pub max_latitude: i64,
    pub link_base_url: String,
    /// "plain" or "link"
    pub sms_style: String,
    pub sms_template: Option<String>,
    pub sms_webhook_url: Option<String>,
    /// Bearer token for the SMS gateway, if it wants one.
    #[serde(skip_serializing)]
    pub sms_webhook_token: Option<String>,
    /// Minijinja template for the gateway request body.
    pub sms_webhook_payload: Option<String>,
    pub smtp_host: Option<String>,
    pub smtp_port: Option<u16>,
    pub smtp_tls: bool,
    pub smtp_username: Option<String>,
    #[serde(skip_serializing)]
    pub smtp_password: Option<String>,
    pub email_from: Option<String>,
    pub email_to: Vec<String>,
}

impl NotifyConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            max_latitude: profiled_env_i64(p, "NOTIFY_MAX_LATITUDE", 56),
            link_base_url: profiled_env_or(p, "LINK_BASE_URL", "http://localhost:3001"),
            sms_style: profiled_env_or(p, "SMS_STYLE", "plain"),
            sms_template: profiled_env_opt(p, "SMS_TEMPLATE"),
            sms_webhook_url: profiled_env_opt(p, "SMS_WEBHOOK_URL"),
            sms_webhook_token: profiled_env_opt(p, "SMS_WEBHOOK_TOKEN"),
            sms_webhook_payload: profiled_env_opt(p, "SMS_WEBHOOK_PAYLOAD"),
            smtp_host: profiled_env_opt(p, "SMTP_HOST"),
            smtp_port: profiled_env_opt(p, "SMTP_PORT").and_then(|v| v.parse().ok()),
            smtp_tls: profiled_env_bool(p, "SMTP_TLS", true),
            smtp_username: profiled_env_opt(p, "SMTP_USERNAME"),
            smtp_password: profiled_env_opt(p, "SMTP_PASSWORD"),
            email_from: profiled_env_opt(p, "EMAIL_FROM"),
            email_to: profiled_env_list(p, "EMAIL_TO"),
        }
    }

    pub fn sms_configured(&self) -> bool {
        self.sms_webhook_url.is_some()
    }

    pub fn email_configured(&self) -> bool {
        self.smtp_host.is_some() && self.email_from.is_some() && !self.email_to.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_prefix_wins_over_plain_key() {
        env::set_var("SWTEST_DATA_DIR", "/var/lib/stormwatch");
        env::set_var("SWTEST_NOTIFY_MAX_LATITUDE", "50");
        env::set_var("SWTEST_EMAIL_TO", "a@example.com, ,b@example.com");
        env::set_var("SWTEST_INGEST_STOP_ON_SEEN", "false");

        let config = Config::for_profile("swtest");
        assert_eq!(config.profile_label(), "SWTEST");
        assert_eq!(config.storage.data_dir, PathBuf::from("/var/lib/stormwatch"));
        assert_eq!(config.notify.max_latitude, 50);
        assert_eq!(config.notify.email_to, vec!["a@example.com", "b@example.com"]);
        assert!(!config.ingest.stop_on_seen);

        env::remove_var("SWTEST_DATA_DIR");
        env::remove_var("SWTEST_NOTIFY_MAX_LATITUDE");
        env::remove_var("SWTEST_EMAIL_TO");
        env::remove_var("SWTEST_INGEST_STOP_ON_SEEN");
    }

    #[test]
    fn redacted_summary_hides_recipients() {
        let config = Config::for_profile("SWTEST_EMPTY");
        let summary = config.redacted_summary();
        assert_eq!(summary["profile"], "SWTEST_EMPTY");
        assert!(summary["notify"].get("email_to").is_none());
        assert_eq!(summary["notify"]["email_recipients"], 0);
    }
}
