//! One poll cycle over the three product families.
//!
//! Alerts arrive newest-first. Each parsed alert is written with a
//! create-if-absent put; the first key that already exists marks the point
//! where the previous cycle left off, and the rest of the batch is skipped.
//! Forecast and outlook reports are single documents whose idempotency key
//! is read from the header before the body is parsed.
//!
//! Families never affect each other, and one bad alert never stops the batch.

use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use serde::Serialize;
use stormwatch_core::{
    AlertRecord, FeedKind, ForecastRecord, OutlookRecord, RawProduct, RecordKey, StormwatchError, StoredRecord,
};
use tracing::{info, warn};

use crate::feed::{decode_alert_feed, FeedEntry, FeedSource};
use crate::notifications::{AlertNotifications, NotifyOutcome};
use crate::parse::{parse_alert, parse_forecast, parse_outlook, read_header};
use crate::store::{PutOutcome, RecordStore};

/// Per-family counters for one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FamilyReport {
    pub fetched: usize,
    /// Items that reached the store.
    pub attempted: usize,
    pub created: usize,
    pub already_seen: usize,
    /// Items that failed to parse or persist.
    pub failed: usize,
    pub stopped_early: bool,
    pub notified: usize,
    /// Failure that prevented the family from running at all.
    pub error: Option<String>,
}

impl FamilyReport {
    fn failed_with(error: &StormwatchError) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub alerts: FamilyReport,
    pub forecast: FamilyReport,
    pub outlook: FamilyReport,
    pub duration_ms: u64,
}

/// A report record after ingestion: either freshly stored or the one
/// already on file for the same key.
#[derive(Debug, Clone, PartialEq)]
pub struct Accepted<T> {
    pub record: T,
    pub outcome: PutOutcome,
}

pub struct IngestionController {
    feeds: Arc<dyn FeedSource>,
    store: Arc<dyn RecordStore>,
    notifications: Option<AlertNotifications>,
    stop_on_seen: bool,
}

impl IngestionController {
    pub fn new(feeds: Arc<dyn FeedSource>, store: Arc<dyn RecordStore>) -> Self {
        Self {
            feeds,
            store,
            notifications: None,
            stop_on_seen: true,
        }
    }

    pub fn with_notifications(mut self, notifications: AlertNotifications) -> Self {
        self.notifications = Some(notifications);
        self
    }

    /// `false` attempts every alert item instead of stopping at the first
    /// already-stored one.
    pub fn with_stop_on_seen(mut self, stop_on_seen: bool) -> Self {
        self.stop_on_seen = stop_on_seen;
        self
    }

    /// Run all three families once.
    pub async fn run_cycle(&self) -> CycleReport {
        let start = Instant::now();
        let alerts = self.ingest_alerts().await;
        let forecast = self.ingest_forecast().await;
        let outlook = self.ingest_outlook().await;

        let report = CycleReport {
            alerts,
            forecast,
            outlook,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            feeds = self.feeds.source_name(),
            store = self.store.backend_name(),
            alerts_created = report.alerts.created,
            alerts_failed = report.alerts.failed,
            forecast_created = report.forecast.created,
            outlook_created = report.outlook.created,
            duration_ms = report.duration_ms,
            "ingestion cycle complete"
        );
        report
    }

    pub async fn ingest_alerts(&self) -> FamilyReport {
        let items = match self.fetch(FeedKind::Alerts).await.and_then(|text| decode_alert_feed(&text)) {
            Ok(items) => items,
            Err(e) => {
                warn!(feed = %FeedKind::Alerts, error = %e, "alert feed unavailable");
                return FamilyReport::failed_with(&e);
            }
        };
        self.ingest_alert_entries(items).await
    }

    /// Parse a newest-first batch in parallel, then persist in feed order.
    pub async fn ingest_alert_items(&self, items: Vec<RawProduct>) -> FamilyReport {
        self.ingest_alert_entries(items.into_iter().map(Ok).collect()).await
    }

    /// Like [`Self::ingest_alert_items`], with feed elements that failed to
    /// decode counted as failed items in their feed position.
    pub async fn ingest_alert_entries(&self, entries: Vec<FeedEntry>) -> FamilyReport {
        let mut report = FamilyReport {
            fetched: entries.len(),
            ..FamilyReport::default()
        };

        let parsed = match tokio::task::spawn_blocking(move || {
            entries
                .into_par_iter()
                .map(|entry| entry.and_then(|raw| parse_alert(&raw)))
                .collect::<Vec<_>>()
        })
        .await
        {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "alert parsing task failed");
                report.error = Some(e.to_string());
                return report;
            }
        };

        for (position, result) in parsed.into_iter().enumerate() {
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    warn!(position, error = %e, "skipping unparseable alert");
                    report.failed += 1;
                    continue;
                }
            };

            let key = record.key();
            report.attempted += 1;
            match self.store.put_if_absent(&key, &StoredRecord::Alert(record.clone())).await {
                Ok(PutOutcome::Created) => {
                    report.created += 1;
                    info!(alert_key = %key, position, "alert stored");
                    if self.notify(&record).await {
                        report.notified += 1;
                    }
                }
                Ok(PutOutcome::AlreadyExists) => {
                    report.already_seen += 1;
                    if self.stop_on_seen {
                        info!(alert_key = %key, position, "reached alerts stored by an earlier cycle");
                        report.stopped_early = true;
                        break;
                    }
                }
                Err(e) => {
                    warn!(alert_key = %key, error = %e, "failed to store alert");
                    report.failed += 1;
                }
            }
        }

        report
    }

    pub async fn ingest_forecast(&self) -> FamilyReport {
        let text = match self.fetch(FeedKind::ShortTermForecast).await {
            Ok(text) => text,
            Err(e) => return Self::family_failed(FeedKind::ShortTermForecast, e),
        };
        Self::single_report(FeedKind::ShortTermForecast, self.accept_forecast(&text).await)
    }

    pub async fn ingest_outlook(&self) -> FamilyReport {
        let text = match self.fetch(FeedKind::MonthOutlook).await {
            Ok(text) => text,
            Err(e) => return Self::family_failed(FeedKind::MonthOutlook, e),
        };
        Self::single_report(FeedKind::MonthOutlook, self.accept_outlook(&text).await)
    }

    /// Store a 3-day forecast, or return the stored one for the same
    /// `(product, issued_at)` without parsing the body.
    pub async fn accept_forecast(&self, text: &str) -> Result<Accepted<ForecastRecord>, StormwatchError> {
        let header = read_header(text)?;
        let key = RecordKey::Forecast {
            product: header.product,
            issued_at: header.issued_at,
        };
        if let Some(StoredRecord::Forecast(existing)) = self.store.get(&key).await? {
            return Ok(Accepted {
                record: existing,
                outcome: PutOutcome::AlreadyExists,
            });
        }

        let record = parse_forecast(text)?;
        let outcome = self.store.put_if_absent(&key, &StoredRecord::Forecast(record.clone())).await?;
        Ok(Accepted { record, outcome })
    }

    /// Store a 27-day outlook, or return the stored one for the same key.
    pub async fn accept_outlook(&self, text: &str) -> Result<Accepted<OutlookRecord>, StormwatchError> {
        let header = read_header(text)?;
        let key = RecordKey::Outlook {
            product: header.product,
            issued_at: header.issued_at,
        };
        if let Some(StoredRecord::Outlook(existing)) = self.store.get(&key).await? {
            return Ok(Accepted {
                record: existing,
                outcome: PutOutcome::AlreadyExists,
            });
        }

        let record = parse_outlook(text)?;
        let outcome = self.store.put_if_absent(&key, &StoredRecord::Outlook(record.clone())).await?;
        Ok(Accepted { record, outcome })
    }

    async fn fetch(&self, kind: FeedKind) -> Result<String, StormwatchError> {
        self.feeds.fetch(kind).await
    }

    async fn notify(&self, record: &AlertRecord) -> bool {
        match &self.notifications {
            Some(n) => matches!(n.on_accepted(record).await, NotifyOutcome::Dispatched { .. }),
            None => false,
        }
    }

    fn family_failed(kind: FeedKind, error: StormwatchError) -> FamilyReport {
        warn!(feed = %kind, error = %error, "feed unavailable");
        FamilyReport::failed_with(&error)
    }

    fn single_report<T>(kind: FeedKind, result: Result<Accepted<T>, StormwatchError>) -> FamilyReport {
        let mut report = FamilyReport {
            fetched: 1,
            ..FamilyReport::default()
        };
        match result {
            Ok(accepted) => {
                report.attempted = 1;
                match accepted.outcome {
                    PutOutcome::Created => {
                        info!(feed = %kind, "report stored");
                        report.created = 1;
                    }
                    PutOutcome::AlreadyExists => {
                        info!(feed = %kind, "report already stored");
                        report.already_seen = 1;
                    }
                }
            }
            Err(e) => {
                warn!(feed = %kind, error = %e, "failed to ingest report");
                report.failed = 1;
            }
        }
        report
    }
}
