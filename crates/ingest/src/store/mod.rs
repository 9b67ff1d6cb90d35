//! Create-if-absent record persistence.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use stormwatch_core::{FeedKind, RecordKey, StormwatchError, StoredRecord};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<StoreError> for StormwatchError {
    fn from(e: StoreError) -> Self {
        StormwatchError::StorePersist(e.to_string())
    }
}

/// Result of a conditional write. An existing key is an expected outcome,
/// not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Created,
    AlreadyExists,
}

/// Append-only record storage keyed by [`RecordKey`].
///
/// `put_if_absent` must be atomic: of two concurrent writers for the same
/// key exactly one sees [`PutOutcome::Created`]. Stored records are never
/// overwritten.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn put_if_absent(&self, key: &RecordKey, record: &StoredRecord) -> Result<PutOutcome, StoreError>;

    async fn get(&self, key: &RecordKey) -> Result<Option<StoredRecord>, StoreError>;

    /// Records of one family selected by issue time. See [`RecordQuery`].
    async fn load_range(&self, query: &RecordQuery) -> Result<Vec<StoredRecord>, StoreError>;

    /// Most recently issued record of a family.
    async fn latest(&self, family: FeedKind) -> Result<Option<StoredRecord>, StoreError> {
        let mut records = self.load_range(&RecordQuery::family(family).limit(1)).await?;
        Ok(records.pop())
    }

    /// The `n` newest records, or the `n` oldest with `oldest_first`.
    async fn load_n(&self, family: FeedKind, n: usize, oldest_first: bool) -> Result<Vec<StoredRecord>, StoreError> {
        let mut query = RecordQuery::family(family).limit(n);
        query.oldest_first = oldest_first;
        self.load_range(&query).await
    }

    /// Everything issued at or after `start`, newest first.
    async fn all_since(&self, family: FeedKind, start: DateTime<Utc>) -> Result<Vec<StoredRecord>, StoreError> {
        self.load_range(&RecordQuery::family(family).since(start)).await
    }

    /// Short name used in logs.
    fn backend_name(&self) -> &str;
}

/// Selection for [`RecordStore::load_range`].
///
/// Both bounds are inclusive and compare against `issued_at`. Results are
/// newest first unless `oldest_first` is set; ties fall back to storage key
/// order. A `limit` of 0 means no limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordQuery {
    pub family: FeedKind,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub limit: usize,
    pub oldest_first: bool,
}

impl RecordQuery {
    pub fn family(family: FeedKind) -> Self {
        Self {
            family,
            start: None,
            end: None,
            limit: 0,
            oldest_first: false,
        }
    }

    pub fn since(mut self, start: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self
    }

    pub fn until(mut self, end: DateTime<Utc>) -> Self {
        self.end = Some(end);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn oldest_first(mut self) -> Self {
        self.oldest_first = true;
        self
    }

    pub fn matches(&self, record: &StoredRecord) -> bool {
        let issued_at = record.issued_at();
        record.feed_kind() == self.family
            && self.start.map_or(true, |start| issued_at >= start)
            && self.end.map_or(true, |end| issued_at <= end)
    }

    /// Filter, order and truncate a full scan of a store.
    pub fn select(&self, records: impl IntoIterator<Item = StoredRecord>) -> Vec<StoredRecord> {
        let mut selected: Vec<(DateTime<Utc>, String, StoredRecord)> = records
            .into_iter()
            .filter(|r| self.matches(r))
            .map(|r| (r.issued_at(), r.key().storage_key(), r))
            .collect();
        selected.sort_by(|a, b| (a.0, &a.1).cmp(&(b.0, &b.1)));
        if !self.oldest_first {
            selected.reverse();
        }
        if self.limit > 0 {
            selected.truncate(self.limit);
        }
        selected.into_iter().map(|(_, _, record)| record).collect()
    }
}
