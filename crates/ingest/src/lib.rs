//! Ingestion pipeline for SWPC space-weather products.
//!
//! - `parse`: the three text grammars (alerts, 3-day forecast, 27-day outlook)
//! - `feed`: where raw products come from (HTTP, or a directory for replay)
//! - `store`: create-if-absent persistence
//! - `controller`: one poll cycle with dedup and early stop
//! - `notifications`: hands accepted alerts to the notify crate

pub mod controller;
pub mod feed;
pub mod notifications;
pub mod parse;
pub mod store;

pub use controller::{Accepted, CycleReport, FamilyReport, IngestionController};
pub use feed::{DirectoryFeedSource, FeedEntry, FeedSource, HttpFeedSource};
pub use notifications::{AlertNotifications, NotifyOutcome};
pub use store::{FileStore, MemoryStore, PutOutcome, RecordQuery, RecordStore, StoreError};
