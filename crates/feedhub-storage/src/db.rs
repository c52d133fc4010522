//! RocksDB wrapper for feedhub storage.
//!
//! Provides:
//! - Database open/close with column family setup and schema check
//! - Read-only snapshot transactions (`select`), any number concurrently
//! - Read-write transactions (`update`), one at a time
//! - Record and index statistics

use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};
use rocksdb::{Options, TransactionDB, TransactionDBOptions};
use tracing::{debug, info, warn};

use feedhub_types::StorageSettings;

use crate::error::StorageError;
use crate::keys::KeyRange;
use crate::maintenance;
use crate::schema::{build_cf_descriptors, ALL_SCHEMAS, CF_DATA, CF_INDEX};
use crate::tx::Transaction;

/// Main storage handle.
///
/// The handle owns the store directory; RocksDB's lock file keeps a second
/// process (or a second handle) from opening it at the same time.
pub struct Database {
    db: RwLock<Option<TransactionDB>>,
    /// Serialises read-write transactions
    writer: Mutex<()>,
    path: PathBuf,
}

impl Database {
    /// Open the store at `path` with default tuning, creating it if necessary.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        Self::open_with(path, &StorageSettings::default())
    }

    /// Open the store at `path`, creating it if necessary.
    ///
    /// If the index layout recorded in the store differs from the current
    /// one, every index is rebuilt before this returns.
    pub fn open_with(path: &Path, settings: &StorageSettings) -> Result<Self, StorageError> {
        info!("Opening storage at {:?}", path);

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_max_background_jobs(settings.max_background_jobs);

        let db = TransactionDB::open_cf_descriptors(
            &db_opts,
            &TransactionDBOptions::default(),
            path,
            build_cf_descriptors(settings),
        )?;

        let database = Self {
            db: RwLock::new(Some(db)),
            writer: Mutex::new(()),
            path: path.to_path_buf(),
        };
        maintenance::ensure_schema(&database)?;
        Ok(database)
    }

    /// Store directory
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` in a read-only snapshot transaction.
    ///
    /// Writes attempted through the transaction fail with
    /// [`StorageError::ReadOnly`].
    pub fn select<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, StorageError>,
    {
        let guard = self.db.read_recursive();
        let db = guard.as_ref().ok_or(StorageError::Closed)?;
        let tx = Transaction::read(db);
        f(&tx)
    }

    /// Run `f` in a read-write transaction.
    ///
    /// The transaction commits when `f` returns `Ok` and is rolled back
    /// entirely when it returns `Err`. Only one update runs at a time;
    /// calling `update` from inside an update closure deadlocks.
    pub fn update<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, StorageError>,
    {
        let _writer = self.writer.lock();
        let guard = self.db.read_recursive();
        let db = guard.as_ref().ok_or(StorageError::Closed)?;

        let tx = Transaction::write(db);
        match f(&tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback() {
                    warn!(error = %rollback_err, "Rollback failed");
                }
                debug!(error = %err, "Update rolled back");
                Err(err)
            }
        }
    }

    /// Close the store. Later calls on this handle fail with
    /// [`StorageError::Closed`]; closing twice is a no-op.
    pub fn close(&self) {
        let mut guard = self.db.write();
        if guard.take().is_some() {
            info!("Closed storage at {:?}", self.path);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.db.read().is_none()
    }

    /// Get database statistics.
    pub fn stats(&self) -> Result<StorageStats, StorageError> {
        let mut stats = self.select(|tx| {
            let mut stats = StorageStats::default();
            for schema in ALL_SCHEMAS {
                let records = tx.bucket(&[CF_DATA, schema.name])?.count(&KeyRange::all())?;
                let mut index_entries = 0;
                for def in schema.indexes {
                    index_entries += tx
                        .bucket(&[CF_INDEX, schema.name, def.name])?
                        .count(&KeyRange::all())?;
                }
                stats.entities.push(EntityStats {
                    name: schema.name,
                    records,
                    index_entries,
                });
            }
            Ok(stats)
        })?;
        stats.disk_usage_bytes = self.disk_usage();
        Ok(stats)
    }

    fn disk_usage(&self) -> u64 {
        let mut total_size = 0u64;
        if let Ok(entries) = std::fs::read_dir(&self.path) {
            for entry in entries.flatten() {
                if let Ok(metadata) = entry.metadata() {
                    total_size += metadata.len();
                }
            }
        }
        total_size
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        self.close();
    }
}

/// Record and index counts for one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityStats {
    pub name: &'static str,
    pub records: u64,
    pub index_entries: u64,
}

/// Statistics about the storage.
#[derive(Debug, Default)]
pub struct StorageStats {
    /// Per-entity counts, in schema order
    pub entities: Vec<EntityStats>,
    /// Total disk usage in bytes
    pub disk_usage_bytes: u64,
}

impl StorageStats {
    pub fn records(&self, entity: &str) -> u64 {
        self.entities
            .iter()
            .find(|e| e.name == entity)
            .map_or(0, |e| e.records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ALL_CF_NAMES;
    use tempfile::TempDir;

    fn create_test_db() -> (Database, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::open(temp_dir.path()).unwrap();
        (db, temp_dir)
    }

    #[test]
    fn test_open_creates_column_families() {
        let (db, _temp) = create_test_db();
        let guard = db.db.read();
        let inner = guard.as_ref().unwrap();
        for cf_name in ALL_CF_NAMES {
            assert!(inner.cf_handle(cf_name).is_some(), "CF {} should exist", cf_name);
        }
    }

    #[test]
    fn test_update_commits() {
        let (db, _temp) = create_test_db();
        db.update(|tx| tx.bucket(&["Data", "Feed"])?.put(b"k", b"v"))
            .unwrap();

        let value = db
            .select(|tx| tx.bucket(&["Data", "Feed"])?.get(b"k"))
            .unwrap();
        assert_eq!(value, Some(b"v".to_vec()));
    }

    #[test]
    fn test_update_error_rolls_back() {
        let (db, _temp) = create_test_db();
        let result: Result<(), StorageError> = db.update(|tx| {
            tx.bucket(&["Data", "Feed"])?.put(b"k", b"v")?;
            Err(StorageError::Key("boom".to_string()))
        });
        assert!(result.is_err());

        let value = db
            .select(|tx| tx.bucket(&["Data", "Feed"])?.get(b"k"))
            .unwrap();
        assert_eq!(value, None);
    }

    #[test]
    fn test_select_is_read_only() {
        let (db, _temp) = create_test_db();
        let result = db.select(|tx| tx.bucket(&["Data", "Feed"])?.put(b"k", b"v"));
        assert!(matches!(result, Err(StorageError::ReadOnly)));
    }

    #[test]
    fn test_unknown_container() {
        let (db, _temp) = create_test_db();
        let result = db.select(|tx| tx.bucket(&["Data", "Nope"]).map(|_| ()));
        assert!(matches!(result, Err(StorageError::ContainerNotFound(_))));
    }

    #[test]
    fn test_select_inside_update() {
        let (db, _temp) = create_test_db();
        db.update(|tx| {
            tx.bucket(&["Data", "Feed"])?.put(b"k", b"v")?;
            // a nested reader sees the last committed state only
            let outside = db.select(|rtx| rtx.bucket(&["Data", "Feed"])?.get(b"k"))?;
            assert_eq!(outside, None);
            assert_eq!(tx.bucket(&["Data", "Feed"])?.get(b"k")?, Some(b"v".to_vec()));
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_buckets_are_isolated() {
        let (db, _temp) = create_test_db();
        db.update(|tx| {
            tx.bucket(&["Data", "Feed"])?.put(b"1", b"feed")?;
            tx.bucket(&["Data", "Item"])?.put(b"1", b"item")?;
            tx.bucket(&["Data", "Group"])?.put(b"1", b"group")
        })
        .unwrap();

        db.select(|tx| {
            let items = tx.bucket(&["Data", "Item"])?;
            assert_eq!(items.count(&KeyRange::all())?, 1);

            let mut cursor = items.cursor();
            assert_eq!(cursor.first()?, Some((b"1".to_vec(), b"item".to_vec())));
            assert_eq!(cursor.next()?, None);
            assert_eq!(cursor.last()?, Some((b"1".to_vec(), b"item".to_vec())));
            assert_eq!(cursor.prev()?, None);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_cursor_walks_both_directions() {
        let (db, _temp) = create_test_db();
        db.update(|tx| {
            let b = tx.bucket(&["Data", "Feed"])?;
            for key in ["a", "b", "c", "d"] {
                b.put(key.as_bytes(), b"")?;
            }
            Ok(())
        })
        .unwrap();

        db.select(|tx| {
            let b = tx.bucket(&["Data", "Feed"])?;
            let mut cursor = b.cursor();
            assert_eq!(cursor.seek(b"bb")?.map(|kv| kv.0), Some(b"c".to_vec()));
            assert_eq!(cursor.prev()?.map(|kv| kv.0), Some(b"b".to_vec()));
            assert_eq!(cursor.seek_before(b"c")?.map(|kv| kv.0), Some(b"b".to_vec()));

            let mut keys = Vec::new();
            b.scan(&KeyRange::all(), true, |k, _| {
                keys.push(k.to_vec());
                Ok(true)
            })?;
            assert_eq!(keys, vec![b"d".to_vec(), b"c".to_vec(), b"b".to_vec(), b"a".to_vec()]);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_close_is_idempotent() {
        let (db, _temp) = create_test_db();
        db.close();
        db.close();
        assert!(db.is_closed());
        assert!(matches!(db.select(|_| Ok(())), Err(StorageError::Closed)));
        assert!(matches!(db.update(|_| Ok(())), Err(StorageError::Closed)));
    }

    #[test]
    fn test_second_open_is_locked_out() {
        let (db, temp) = create_test_db();
        assert!(matches!(
            Database::open(temp.path()),
            Err(StorageError::Engine(_))
        ));

        db.close();
        assert!(Database::open(temp.path()).is_ok());
    }

    #[test]
    fn test_stats() {
        let (db, _temp) = create_test_db();
        let stats = db.stats().unwrap();
        assert_eq!(stats.entities.len(), ALL_SCHEMAS.len());
        assert_eq!(stats.records("Feed"), 0);
        // the schema check writes the config record on first open
        assert_eq!(stats.records("Config"), 1);
        assert!(stats.disk_usage_bytes > 0);
    }
}
