/// Integration tests for the ingestion cycle: dedup, early stop on the
/// already-seen boundary, per-item and per-family failure isolation, and
/// notification hand-off.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use stormwatch_core::{FeedKind, RawProduct, RecordKey, StormwatchError, StoredRecord};
use stormwatch_ingest::{
    AlertNotifications, DirectoryFeedSource, FeedSource, FileStore, IngestionController, MemoryStore, PutOutcome,
    RecordStore,
};
use stormwatch_notify::{Dispatcher, Notification, NotificationComposer, Notifier, NotifyError, SmsStyle};

// ============================================================================
// Test Helpers
// ============================================================================

const FORECAST: &str = ":Product: Geomagnetic Forecast
:Issued: 2023 Apr 30 2205 UTC
# Prepared by the U.S. Dept. of Commerce, NOAA, Space Weather Prediction Center
#
NOAA Ap Index Forecast
Observed Ap 29 Apr 010
Estimated Ap 30 Apr 008
Predicted Ap 01 May-03 May 012-010-008

NOAA Geomagnetic Activity Probabilities 01 May-03 May
Active                25/20/15
Minor storm           10/05/01
Moderate storm        01/01/01
Strong-Extreme storm  01/01/01

NOAA Kp index forecast 01 May - 03 May
             May 01    May 02    May 03
00-03UT        3.67      2.67      2.33
03-06UT        3.00      2.33      2.00
06-09UT        2.67      2.00      1.67
09-12UT        2.33      1.67      1.67
12-15UT        2.00      1.67      1.33
15-18UT        2.00      2.00      1.33
18-21UT        2.33      2.33      2.00
21-24UT        3.00      2.67      2.00
";

const OUTLOOK: &str = ":Product: 27-day Space Weather Outlook Table 27DO.txt
:Issued: 2023 May 01 0339 UTC
# Prepared by the US Dept. of Commerce, NOAA, Space Weather Prediction Center
#   UTC      Radio Flux   Planetary   Largest
#  Date       10.7 cm      A Index    Kp Index
2023 May 01     140          12          4
2023 May 02     145           8          3
";

/// Feed source backed by fixed strings; missing kinds fail like an outage.
struct StaticFeeds {
    docs: HashMap<FeedKind, String>,
    fetches: AtomicUsize,
}

impl StaticFeeds {
    fn new(docs: Vec<(FeedKind, String)>) -> Self {
        Self {
            docs: docs.into_iter().collect(),
            fetches: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl FeedSource for StaticFeeds {
    async fn fetch(&self, kind: FeedKind) -> Result<String, StormwatchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.docs
            .get(&kind)
            .cloned()
            .ok_or_else(|| StormwatchError::UpstreamFetch(format!("{kind}: connection refused")))
    }

    fn source_name(&self) -> &str {
        "static"
    }
}

struct CountingNotifier(Arc<AtomicUsize>);

#[async_trait]
impl Notifier for CountingNotifier {
    async fn send(&self, _notification: &Notification) -> Result<(), NotifyError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "counting"
    }
}

fn alert_body(code: &str, serial: i64, extra: &str) -> String {
    format!("Space Weather Message Code: {code}\r\nSerial Number: {serial}\r\nIssue Time: 2023 Apr 24 1755 UTC\r\n{extra}")
}

fn alert_item(code: &str, serial: i64) -> RawProduct {
    RawProduct {
        product_id: "K04A".to_string(),
        issued_at: "2023-04-24 17:55:48.160".to_string(),
        body: alert_body(code, serial, "ALERT: Geomagnetic K-index of 4"),
        feed_kind: FeedKind::Alerts,
    }
}

fn alerts_json(items: &[RawProduct]) -> String {
    let values: Vec<serde_json::Value> = items
        .iter()
        .map(|i| {
            serde_json::json!({
                "product_id": i.product_id,
                "issue_datetime": i.issued_at,
                "message": i.body,
            })
        })
        .collect();
    serde_json::to_string(&values).unwrap()
}

fn alert_key(code: &str, serial: i64) -> RecordKey {
    RecordKey::Alert {
        message_code: code.to_string(),
        serial_number: serial,
    }
}

fn controller(feeds: Arc<dyn FeedSource>, store: Arc<MemoryStore>) -> IngestionController {
    IngestionController::new(feeds, store)
}

// ============================================================================
// Alerts
// ============================================================================

#[tokio::test]
async fn stops_at_first_already_stored_alert() {
    let store = Arc::new(MemoryStore::new());
    let seen = parse_one(&alert_item("ALTK04", 3));
    store.put_if_absent(&seen.key(), &seen).await.unwrap();
    let puts_before = store.put_calls();

    let items: Vec<RawProduct> = (1..=6).map(|serial| alert_item("ALTK04", serial)).collect();
    let controller = controller(Arc::new(StaticFeeds::new(vec![])), store.clone());
    let report = controller.ingest_alert_items(items).await;

    assert_eq!(report.fetched, 6);
    assert_eq!(report.attempted, 3);
    assert_eq!(report.created, 2);
    assert_eq!(report.already_seen, 1);
    assert!(report.stopped_early);
    assert_eq!(store.put_calls() - puts_before, 3);

    for serial in [1, 2] {
        assert!(store.get(&alert_key("ALTK04", serial)).await.unwrap().is_some());
    }
    for serial in 4..=6 {
        assert!(store.get(&alert_key("ALTK04", serial)).await.unwrap().is_none());
    }
}

#[tokio::test]
async fn attempt_all_mode_skips_seen_and_continues() {
    let store = Arc::new(MemoryStore::new());
    let seen = parse_one(&alert_item("ALTK04", 2));
    store.put_if_absent(&seen.key(), &seen).await.unwrap();

    let items: Vec<RawProduct> = (1..=4).map(|serial| alert_item("ALTK04", serial)).collect();
    let report = controller(Arc::new(StaticFeeds::new(vec![])), store.clone())
        .with_stop_on_seen(false)
        .ingest_alert_items(items)
        .await;

    assert_eq!(report.attempted, 4);
    assert_eq!(report.created, 3);
    assert_eq!(report.already_seen, 1);
    assert!(!report.stopped_early);
}

#[tokio::test]
async fn same_alert_twice_is_stored_once() {
    let store = Arc::new(MemoryStore::new());
    let controller = controller(Arc::new(StaticFeeds::new(vec![])), store.clone());

    let first = controller.ingest_alert_items(vec![alert_item("WARK04", 9)]).await;
    let second = controller.ingest_alert_items(vec![alert_item("WARK04", 9)]).await;

    assert_eq!(first.created, 1);
    assert_eq!(second.created, 0);
    assert_eq!(second.already_seen, 1);
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn bad_item_does_not_stop_the_batch() {
    let store = Arc::new(MemoryStore::new());
    let mut broken = alert_item("ALTK05", 2);
    broken.body = "Serial Number: 2\r\nno message code here".to_string();
    let mut bad_time = alert_item("ALTK05", 3);
    bad_time.issued_at = "yesterday".to_string();

    let items = vec![alert_item("ALTK05", 1), broken, bad_time, alert_item("ALTK05", 4)];
    let report = controller(Arc::new(StaticFeeds::new(vec![])), store.clone())
        .ingest_alert_items(items)
        .await;

    assert_eq!(report.failed, 2);
    assert_eq!(report.created, 2);
    assert!(store.get(&alert_key("ALTK05", 4)).await.unwrap().is_some());
}

#[tokio::test]
async fn malformed_feed_item_fails_alone() {
    let store = Arc::new(MemoryStore::new());
    let newest = alert_item("ALTK04", 3);
    let oldest = alert_item("ALTK04", 1);
    let feed = serde_json::json!([
        {"product_id": newest.product_id, "issue_datetime": newest.issued_at, "message": newest.body},
        {"product_id": "K04A", "message": alert_body("ALTK04", 2, "issue_datetime missing")},
        {"product_id": "K04A", "issue_datetime": "2023-04-24 17:55:48.160", "message": null},
        {"product_id": oldest.product_id, "issue_datetime": oldest.issued_at, "message": oldest.body},
    ]);
    let feeds = Arc::new(StaticFeeds::new(vec![(FeedKind::Alerts, feed.to_string())]));

    let report = controller(feeds, store.clone()).ingest_alerts().await;

    assert_eq!(report.error, None);
    assert_eq!(report.fetched, 4);
    assert_eq!(report.failed, 2);
    assert_eq!(report.attempted, 2);
    assert_eq!(report.created, 2);
    assert!(store.get(&alert_key("ALTK04", 3)).await.unwrap().is_some());
    assert!(store.get(&alert_key("ALTK04", 2)).await.unwrap().is_none());
    assert!(store.get(&alert_key("ALTK04", 1)).await.unwrap().is_some());
}

#[tokio::test]
async fn eligible_alerts_below_gate_are_dispatched() {
    let store = Arc::new(MemoryStore::new());
    let sent = Arc::new(AtomicUsize::new(0));
    let sms: Box<dyn Notifier> = Box::new(CountingNotifier(sent.clone()));
    let email: Box<dyn Notifier> = Box::new(CountingNotifier(sent.clone()));
    let notifications = AlertNotifications::new(
        NotificationComposer::new("https://sw.example", SmsStyle::Link),
        Arc::new(Dispatcher::new(vec![sms], vec![email])),
        56,
    );

    let low = RawProduct {
        body: alert_body(
            "WATA50",
            212,
            "WATCH: Geomagnetic Storm Category G3 Predicted\r\nPotential Impacts: Area of impact primarily poleward of 50 degrees Geomagnetic Latitude.\r\nAurora - Aurora may be seen as low as Pennsylvania.",
        ),
        ..alert_item("WATA50", 212)
    };
    let high = RawProduct {
        body: alert_body(
            "WATA20",
            1034,
            "WATCH: Geomagnetic Storm Category G1 Predicted\r\nPotential Impacts: Area of impact primarily poleward of 60 degrees Geomagnetic Latitude.\r\nAurora - Aurora may be visible at high latitudes.",
        ),
        ..alert_item("WATA20", 1034)
    };

    let report = controller(Arc::new(StaticFeeds::new(vec![])), store)
        .with_notifications(notifications)
        .ingest_alert_items(vec![low, high, alert_item("ALTK04", 1)])
        .await;

    assert_eq!(report.created, 3);
    assert_eq!(report.notified, 1);
    assert_eq!(sent.load(Ordering::SeqCst), 2); // one SMS + one email
}

fn parse_one(item: &RawProduct) -> StoredRecord {
    StoredRecord::Alert(stormwatch_ingest::parse::parse_alert(item).unwrap())
}

// ============================================================================
// Reports and full cycles
// ============================================================================

#[tokio::test]
async fn full_cycle_stores_each_family() {
    let store = Arc::new(MemoryStore::new());
    let feeds = Arc::new(StaticFeeds::new(vec![
        (FeedKind::Alerts, alerts_json(&[alert_item("ALTK04", 2), alert_item("ALTK04", 1)])),
        (FeedKind::ShortTermForecast, FORECAST.to_string()),
        (FeedKind::MonthOutlook, OUTLOOK.to_string()),
    ]));
    let controller = controller(feeds, store.clone());

    let first = controller.run_cycle().await;
    assert_eq!(first.alerts.created, 2);
    assert_eq!(first.forecast.created, 1);
    assert_eq!(first.outlook.created, 1);
    assert_eq!(store.len().await, 4);

    let second = controller.run_cycle().await;
    assert_eq!(second.alerts.created, 0);
    assert!(second.alerts.stopped_early);
    assert_eq!(second.alerts.attempted, 1);
    assert_eq!(second.forecast.already_seen, 1);
    assert_eq!(second.outlook.already_seen, 1);
    assert_eq!(store.len().await, 4);
}

#[tokio::test]
async fn stored_report_is_returned_unchanged() {
    let store = Arc::new(MemoryStore::new());
    let controller = controller(Arc::new(StaticFeeds::new(vec![])), store.clone());

    let first = controller.accept_forecast(FORECAST).await.unwrap();
    assert_eq!(first.outcome, PutOutcome::Created);
    let puts = store.put_calls();

    // Same header, different body: the stored record wins and nothing is written.
    let revised = FORECAST.replace("25/20/15", "99/99/99");
    let second = controller.accept_forecast(&revised).await.unwrap();
    assert_eq!(second.outcome, PutOutcome::AlreadyExists);
    assert_eq!(second.record, first.record);
    assert_eq!(store.put_calls(), puts);
}

#[tokio::test]
async fn one_family_failing_does_not_stop_the_others() {
    let store = Arc::new(MemoryStore::new());
    let feeds = Arc::new(StaticFeeds::new(vec![
        (FeedKind::Alerts, "<html>maintenance</html>".to_string()),
        (FeedKind::MonthOutlook, OUTLOOK.to_string()),
    ]));

    let report = controller(feeds.clone(), store).run_cycle().await;

    assert!(report.alerts.error.as_deref().unwrap_or_default().contains("decode"));
    assert!(report.forecast.error.as_deref().unwrap_or_default().contains("connection refused"));
    assert_eq!(report.outlook.created, 1);
    assert_eq!(feeds.fetches.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn malformed_report_counts_as_failed() {
    let store = Arc::new(MemoryStore::new());
    let truncated: String = FORECAST.lines().take(20).collect::<Vec<_>>().join("\n");
    let feeds = Arc::new(StaticFeeds::new(vec![(FeedKind::ShortTermForecast, truncated)]));

    let report = controller(feeds, store.clone()).ingest_forecast().await;
    assert_eq!(report.failed, 1);
    assert_eq!(report.created, 0);
    assert!(store.is_empty().await);
}

// ============================================================================
// Filesystem adapters
// ============================================================================

#[tokio::test]
async fn directory_replay_into_file_store() {
    let feeds_dir = tempfile::tempdir().unwrap();
    let data_dir = tempfile::tempdir().unwrap();
    std::fs::write(
        feeds_dir.path().join("alerts.json"),
        alerts_json(&[alert_item("ALTK06", 11), alert_item("ALTK06", 10)]),
    )
    .unwrap();
    std::fs::write(feeds_dir.path().join("3-day-geomag-forecast.txt"), FORECAST).unwrap();
    std::fs::write(feeds_dir.path().join("27-day-outlook.txt"), OUTLOOK).unwrap();

    let feeds: Arc<dyn FeedSource> = Arc::new(DirectoryFeedSource::new(feeds_dir.path()));
    let store = Arc::new(FileStore::new(data_dir.path().join("records")).unwrap());
    let controller = IngestionController::new(feeds.clone(), store.clone());

    let first = controller.run_cycle().await;
    assert_eq!(first.alerts.created, 2);
    assert_eq!(first.forecast.created, 1);
    assert_eq!(first.outlook.created, 1);

    let files = std::fs::read_dir(store.base_dir()).unwrap().count();
    assert_eq!(files, 4);

    // A fresh controller over the same directory sees everything as stored.
    let again = IngestionController::new(feeds, store.clone()).run_cycle().await;
    assert_eq!(again.alerts.created + again.forecast.created + again.outlook.created, 0);
    assert!(again.alerts.stopped_early);

    match store.get(&alert_key("ALTK06", 11)).await.unwrap() {
        Some(StoredRecord::Alert(record)) => {
            assert_eq!(record.text("alert"), Some("Geomagnetic K-index of 4"));
            assert_eq!(record.text("issue_time"), Some("2023/04/24T17:55Z"));
        }
        other => panic!("expected stored alert, got {other:?}"),
    }
}
