//! Feed sources: where raw product text comes from.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use stormwatch_core::config::FeedConfig;
use stormwatch_core::{FeedKind, RawProduct, StormwatchError};

const DEFAULT_PRODUCT_ID: &str = "X00X";
const DEFAULT_MESSAGE: &str = "?";

/// Source of raw feed documents, one per [`FeedKind`].
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch the current document for a feed as text.
    async fn fetch(&self, kind: FeedKind) -> Result<String, StormwatchError>;

    /// Short name used in logs.
    fn source_name(&self) -> &str;
}

/// Live feeds over HTTP.
pub struct HttpFeedSource {
    client: reqwest::Client,
    alerts_url: String,
    forecast_url: String,
    outlook_url: String,
}

impl HttpFeedSource {
    pub fn new(config: &FeedConfig) -> Result<Self, StormwatchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(u64::from(config.timeout_secs)))
            .user_agent(concat!("stormwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StormwatchError::UpstreamFetch(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            alerts_url: config.alerts_url.clone(),
            forecast_url: config.forecast_url.clone(),
            outlook_url: config.outlook_url.clone(),
        })
    }

    fn url(&self, kind: FeedKind) -> &str {
        match kind {
            FeedKind::Alerts => &self.alerts_url,
            FeedKind::ShortTermForecast => &self.forecast_url,
            FeedKind::MonthOutlook => &self.outlook_url,
        }
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch(&self, kind: FeedKind) -> Result<String, StormwatchError> {
        let url = self.url(kind);
        let fetch_err = |e: reqwest::Error| StormwatchError::UpstreamFetch(format!("{kind} from {url}: {e}"));

        let response = self.client.get(url).send().await.map_err(fetch_err)?;
        let status = response.status();
        if !status.is_success() {
            return Err(StormwatchError::UpstreamFetch(format!("{kind} from {url}: HTTP {status}")));
        }
        let body = response.text().await.map_err(fetch_err)?;

        tracing::debug!(feed = %kind, url, bytes = body.len(), "feed fetched");
        Ok(body)
    }

    fn source_name(&self) -> &str {
        "http"
    }
}

/// Replays feeds saved as files in one directory.
pub struct DirectoryFeedSource {
    dir: PathBuf,
}

impl DirectoryFeedSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name each feed is read from, matching the upstream URL's last segment.
    pub fn file_name(kind: FeedKind) -> &'static str {
        match kind {
            FeedKind::Alerts => "alerts.json",
            FeedKind::ShortTermForecast => "3-day-geomag-forecast.txt",
            FeedKind::MonthOutlook => "27-day-outlook.txt",
        }
    }
}

#[async_trait]
impl FeedSource for DirectoryFeedSource {
    async fn fetch(&self, kind: FeedKind) -> Result<String, StormwatchError> {
        let path = self.dir.join(Self::file_name(kind));
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| StormwatchError::UpstreamFetch(format!("{kind} from {}: {e}", path.display())))
    }

    fn source_name(&self) -> &str {
        "directory"
    }
}

/// One entry of the alerts JSON array. `null` and absent optional fields
/// both fall back to placeholders.
#[derive(Debug, Clone, Deserialize)]
pub struct AlertFeedItem {
    #[serde(default)]
    pub product_id: Option<String>,
    pub issue_datetime: String,
    #[serde(default)]
    pub message: Option<String>,
}

impl From<AlertFeedItem> for RawProduct {
    fn from(item: AlertFeedItem) -> Self {
        RawProduct {
            product_id: item.product_id.unwrap_or_else(|| DEFAULT_PRODUCT_ID.to_string()),
            issued_at: item.issue_datetime,
            body: item.message.unwrap_or_else(|| DEFAULT_MESSAGE.to_string()),
            feed_kind: FeedKind::Alerts,
        }
    }
}

/// One decoded alerts-feed element; a malformed element fails on its own.
pub type FeedEntry = Result<RawProduct, StormwatchError>;

/// Decode the alerts feed, keeping its (newest-first) order.
///
/// Only a document that is not a JSON array fails as a whole.
pub fn decode_alert_feed(text: &str) -> Result<Vec<FeedEntry>, StormwatchError> {
    let values: Vec<serde_json::Value> =
        serde_json::from_str(text).map_err(|e| StormwatchError::Decode(format!("alerts feed: {e}")))?;
    Ok(values
        .into_iter()
        .enumerate()
        .map(|(position, value)| {
            serde_json::from_value::<AlertFeedItem>(value)
                .map(RawProduct::from)
                .map_err(|e| StormwatchError::Decode(format!("alert item {position}: {e}")))
        })
        .collect())
}
