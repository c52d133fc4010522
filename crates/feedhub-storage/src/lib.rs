//! Storage layer for feedhub.
//!
//! Provides RocksDB-backed storage with:
//! - Two column families: `Data` for JSON records, `Index` for secondary indexes
//! - Order-preserving composite keys for equality and range scans
//! - Snapshot reads and single-writer transactions with per-save savepoints
//! - Durable id sequences kept in the config record
//! - Index rebuild, verification and orphan purge for maintenance
//!
//! ```no_run
//! use feedhub_storage::{Database, FeedStore};
//!
//! let db = Database::open(std::path::Path::new("/tmp/feedhub")).unwrap();
//! db.update(|tx| FeedStore::save(tx, &mut FeedStore::new("https://example.com/feed")))
//!     .unwrap();
//! ```

pub mod db;
pub mod entity;
pub mod error;
pub mod keys;
pub mod maintenance;
pub mod schema;
pub mod sequence;
pub mod stores;
pub mod tx;

pub use db::{Database, EntityStats, StorageStats};
pub use entity::{Entity, EntitySchema, IndexDef, KeyKind};
pub use error::StorageError;
pub use keys::{CompositeKey, EndBound, KeyRange};
pub use maintenance::{
    purge_orphans, rebuild_indexes, verify_indexes, IndexIssue, PurgeReport, RebuildProgress,
    VerifyReport,
};
pub use stores::{
    ConfigStore, EntryQuery, EntryStore, FeedStore, GroupStore, ItemStore, SubscriptionStore,
    TransmissionStore, UserStore,
};
pub use tx::{Bucket, Cursor, Transaction};
