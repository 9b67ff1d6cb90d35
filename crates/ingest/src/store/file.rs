use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use stormwatch_core::{RecordKey, StoredRecord};

use super::{PutOutcome, RecordQuery, RecordStore, StoreError};

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// One pretty-printed JSON file per record:
/// ```text
/// records/
///   alert-WATA50-212.json
///   forecast-Geomagnetic_Forecast-20230430T2205Z.json
///   outlook-27~2Dday_Space_Weather_Outlook_Table_27DO.txt-20230501T0339Z.json
/// ```
///
/// A record is written to a temp file and then hard-linked to its final
/// name; the link fails if the name exists, which makes the create atomic.
pub struct FileStore {
    base_dir: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `base_dir`, creating the directory if needed.
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn record_path(&self, key: &RecordKey) -> PathBuf {
        self.base_dir.join(format!("{}.json", key.storage_key()))
    }

    fn tmp_path(&self, key: &RecordKey) -> PathBuf {
        let n = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        self.base_dir
            .join(format!(".{}.{}.{n}.tmp", key.storage_key(), std::process::id()))
    }
}

/// Write `bytes` to `tmp`, then hard-link it to `path`. The temp file is
/// removed whatever happens, including a write that fails halfway.
async fn stage_and_link(tmp: &Path, path: &Path, bytes: Vec<u8>) -> std::io::Result<()> {
    let linked = match tokio::fs::write(tmp, bytes).await {
        Ok(()) => tokio::fs::hard_link(tmp, path).await,
        Err(e) => Err(e),
    };
    match tokio::fs::remove_file(tmp).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %tmp.display(), error = %e, "failed to remove temp record file"),
    }
    linked
}

#[async_trait]
impl RecordStore for FileStore {
    async fn put_if_absent(&self, key: &RecordKey, record: &StoredRecord) -> Result<PutOutcome, StoreError> {
        let path = self.record_path(key);
        if tokio::fs::try_exists(&path).await? {
            return Ok(PutOutcome::AlreadyExists);
        }

        let json = serde_json::to_vec_pretty(record)?;
        match stage_and_link(&self.tmp_path(key), &path, json).await {
            Ok(()) => Ok(PutOutcome::Created),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(PutOutcome::AlreadyExists),
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, key: &RecordKey) -> Result<Option<StoredRecord>, StoreError> {
        match tokio::fs::read(self.record_path(key)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Full scan of the family's files. Temp files are skipped.
    async fn load_range(&self, query: &RecordQuery) -> Result<Vec<StoredRecord>, StoreError> {
        let prefix = format!("{}-", RecordKey::storage_prefix(query.family));
        let mut records = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.base_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !name.starts_with(&prefix) || !name.ends_with(".json") {
                continue;
            }
            let bytes = tokio::fs::read(entry.path()).await?;
            records.push(serde_json::from_slice::<StoredRecord>(&bytes)?);
        }
        Ok(query.select(records))
    }

    fn backend_name(&self) -> &str {
        "file"
    }
}
