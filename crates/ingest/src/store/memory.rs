use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use stormwatch_core::{RecordKey, StoredRecord};
use tokio::sync::RwLock;

use super::{PutOutcome, RecordQuery, RecordStore, StoreError};

/// In-process store. Counts write attempts so tests can assert how far a
/// cycle got.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<RecordKey, StoredRecord>>,
    put_calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `put_if_absent` calls so far, whatever their outcome.
    pub fn put_calls(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn put_if_absent(&self, key: &RecordKey, record: &StoredRecord) -> Result<PutOutcome, StoreError> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        match self.records.write().await.entry(key.clone()) {
            Entry::Occupied(_) => Ok(PutOutcome::AlreadyExists),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(PutOutcome::Created)
            }
        }
    }

    async fn get(&self, key: &RecordKey) -> Result<Option<StoredRecord>, StoreError> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn load_range(&self, query: &RecordQuery) -> Result<Vec<StoredRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(query.select(records.values().cloned()))
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};
    use indexmap::IndexMap;
    use stormwatch_core::{AlertRecord, FeedKind, OutlookRecord};

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 4, 24, hour, 0, 0).unwrap()
    }

    fn alert(serial: i64, issued_at: DateTime<Utc>) -> StoredRecord {
        StoredRecord::Alert(AlertRecord {
            message_code: "ALTK04".to_string(),
            serial_number: serial,
            product_id: "K04A".to_string(),
            issued_at,
            message: String::new(),
            fields: IndexMap::new(),
            unhandled_lines: Vec::new(),
        })
    }

    fn serials(records: &[StoredRecord]) -> Vec<i64> {
        records
            .iter()
            .map(|r| match r {
                StoredRecord::Alert(a) => a.serial_number,
                other => panic!("expected alert, got {other:?}"),
            })
            .collect()
    }

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        for (serial, hour) in [(3, 12), (1, 8), (4, 14), (2, 10)] {
            let record = alert(serial, at(hour));
            store.put_if_absent(&record.key(), &record).await.unwrap();
        }
        let report = outlook(140);
        store.put_if_absent(&report.key(), &report).await.unwrap();
        store
    }

    fn outlook(flux: i64) -> StoredRecord {
        let date = NaiveDate::from_ymd_opt(2023, 5, 1).unwrap();
        StoredRecord::Outlook(OutlookRecord {
            product: "27-day Space Weather Outlook Table 27DO.txt".to_string(),
            issued_at: Utc.with_ymd_and_hms(2023, 5, 1, 3, 39, 0).unwrap(),
            radio_flux: [(date, flux)].into_iter().collect(),
            ap_index: Default::default(),
            kp_index: Default::default(),
            unhandled_lines: Vec::new(),
            raw: String::new(),
        })
    }

    #[tokio::test]
    async fn first_write_wins_and_every_attempt_counts() {
        let store = MemoryStore::new();
        let first = outlook(140);
        let key = first.key();

        assert_eq!(store.put_if_absent(&key, &first).await.unwrap(), PutOutcome::Created);
        assert_eq!(store.put_if_absent(&key, &outlook(999)).await.unwrap(), PutOutcome::AlreadyExists);

        assert_eq!(store.put_calls(), 2);
        assert_eq!(store.len().await, 1);
        assert_eq!(store.get(&key).await.unwrap(), Some(first));
    }

    #[tokio::test]
    async fn range_queries_order_by_issue_time() {
        let store = seeded().await;

        let all = store.load_range(&RecordQuery::family(FeedKind::Alerts)).await.unwrap();
        assert_eq!(serials(&all), vec![4, 3, 2, 1]);

        // bounds are inclusive
        let window = RecordQuery::family(FeedKind::Alerts).since(at(10)).until(at(12)).oldest_first();
        assert_eq!(serials(&store.load_range(&window).await.unwrap()), vec![2, 3]);

        let capped = RecordQuery::family(FeedKind::Alerts).until(at(12)).limit(2);
        assert_eq!(serials(&store.load_range(&capped).await.unwrap()), vec![3, 2]);
    }

    #[tokio::test]
    async fn shorthand_queries_follow_load_range() {
        let store = seeded().await;

        assert_eq!(store.latest(FeedKind::Alerts).await.unwrap(), Some(alert(4, at(14))));
        assert_eq!(store.latest(FeedKind::MonthOutlook).await.unwrap(), Some(outlook(140)));
        assert_eq!(store.latest(FeedKind::ShortTermForecast).await.unwrap(), None);

        assert_eq!(serials(&store.load_n(FeedKind::Alerts, 2, false).await.unwrap()), vec![4, 3]);
        assert_eq!(serials(&store.load_n(FeedKind::Alerts, 2, true).await.unwrap()), vec![1, 2]);
        assert_eq!(serials(&store.load_n(FeedKind::Alerts, 0, true).await.unwrap()), vec![1, 2, 3, 4]);

        assert_eq!(serials(&store.all_since(FeedKind::Alerts, at(11)).await.unwrap()), vec![4, 3]);
        assert!(store.all_since(FeedKind::Alerts, at(15)).await.unwrap().is_empty());
    }
}
