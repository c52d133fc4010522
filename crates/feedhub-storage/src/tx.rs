//! Transactions, buckets and cursors.
//!
//! A [`Transaction`] is either a read-only snapshot or a read-write engine
//! transaction. Both expose the same bucket view: a container path such as
//! `["Index", "Entry", "Updated"]` resolves to a column family plus a key
//! prefix, and keys read back through a bucket have that prefix removed.

use rocksdb::{
    ColumnFamily, DBRawIteratorWithThreadMode, SnapshotWithThreadMode, Transaction as DbTransaction,
    TransactionDB,
};

use crate::error::StorageError;
use crate::keys::{KeyRange, SEP};
use crate::schema::check_container;

enum Mode<'db> {
    Read(SnapshotWithThreadMode<'db, TransactionDB>),
    Write(DbTransaction<'db, TransactionDB>),
}

/// An open transaction. Obtained from `Database::select` or `Database::update`.
pub struct Transaction<'db> {
    db: &'db TransactionDB,
    mode: Mode<'db>,
}

impl<'db> Transaction<'db> {
    pub(crate) fn read(db: &'db TransactionDB) -> Self {
        Self {
            db,
            mode: Mode::Read(db.snapshot()),
        }
    }

    pub(crate) fn write(db: &'db TransactionDB) -> Self {
        Self {
            db,
            mode: Mode::Write(db.transaction()),
        }
    }

    pub fn is_writable(&self) -> bool {
        matches!(self.mode, Mode::Write(_))
    }

    fn engine_tx(&self) -> Result<&DbTransaction<'db, TransactionDB>, StorageError> {
        match &self.mode {
            Mode::Write(tx) => Ok(tx),
            Mode::Read(_) => Err(StorageError::ReadOnly),
        }
    }

    pub(crate) fn commit(self) -> Result<(), StorageError> {
        match self.mode {
            Mode::Write(tx) => Ok(tx.commit()?),
            Mode::Read(_) => Ok(()),
        }
    }

    pub(crate) fn rollback(self) -> Result<(), StorageError> {
        match self.mode {
            Mode::Write(tx) => Ok(tx.rollback()?),
            Mode::Read(_) => Ok(()),
        }
    }

    /// Mark a point that [`rollback_to_savepoint`](Self::rollback_to_savepoint) returns to.
    pub fn set_savepoint(&self) -> Result<(), StorageError> {
        self.engine_tx()?.set_savepoint();
        Ok(())
    }

    /// Undo every write since the most recent savepoint.
    pub fn rollback_to_savepoint(&self) -> Result<(), StorageError> {
        Ok(self.engine_tx()?.rollback_to_savepoint()?)
    }

    /// Open a container by path.
    pub fn bucket<'tx>(&'tx self, path: &[&str]) -> Result<Bucket<'tx, 'db>, StorageError> {
        check_container(path)?;
        let cf = self
            .db
            .cf_handle(path[0])
            .ok_or_else(|| StorageError::ContainerNotFound(path[0].to_string()))?;

        let mut prefix = Vec::new();
        for name in &path[1..] {
            prefix.extend_from_slice(name.as_bytes());
            prefix.push(SEP);
        }

        Ok(Bucket {
            tx: self,
            cf,
            path: path.iter().map(|s| s.to_string()).collect(),
            prefix,
        })
    }

    fn get_raw(&self, cf: &ColumnFamily, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        let value = match &self.mode {
            Mode::Read(snapshot) => snapshot.get_cf(cf, key)?,
            Mode::Write(tx) => tx.get_cf(cf, key)?,
        };
        Ok(value)
    }

    fn put_raw(&self, cf: &ColumnFamily, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        Ok(self.engine_tx()?.put_cf(cf, key, value)?)
    }

    fn delete_raw(&self, cf: &ColumnFamily, key: &[u8]) -> Result<(), StorageError> {
        Ok(self.engine_tx()?.delete_cf(cf, key)?)
    }

    fn raw_iterator<'tx>(&'tx self, cf: &ColumnFamily) -> RawIter<'tx, 'db> {
        match &self.mode {
            Mode::Read(snapshot) => RawIter::Read(snapshot.raw_iterator_cf(cf)),
            Mode::Write(tx) => RawIter::Write(tx.raw_iterator_cf(cf)),
        }
    }
}

/// A container: a column family narrowed to a key prefix.
pub struct Bucket<'tx, 'db> {
    tx: &'tx Transaction<'db>,
    cf: &'db ColumnFamily,
    path: Vec<String>,
    prefix: Vec<u8>,
}

impl<'tx, 'db> Bucket<'tx, 'db> {
    /// Container path, `/`-joined
    pub fn name(&self) -> String {
        self.path.join("/")
    }

    fn full_key(&self, key: &[u8]) -> Vec<u8> {
        let mut full = Vec::with_capacity(self.prefix.len() + key.len());
        full.extend_from_slice(&self.prefix);
        full.extend_from_slice(key);
        full
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        self.tx.get_raw(self.cf, &self.full_key(key))
    }

    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        self.tx.put_raw(self.cf, &self.full_key(key), value)
    }

    pub fn delete(&self, key: &[u8]) -> Result<(), StorageError> {
        self.tx.delete_raw(self.cf, &self.full_key(key))
    }

    /// Open a container nested below this one.
    pub fn bucket(&self, names: &[&str]) -> Result<Bucket<'tx, 'db>, StorageError> {
        let mut path: Vec<&str> = self.path.iter().map(String::as_str).collect();
        path.extend_from_slice(names);
        self.tx.bucket(&path)
    }

    pub fn cursor(&self) -> Cursor<'tx, 'db> {
        Cursor {
            iter: self.tx.raw_iterator(self.cf),
            prefix: self.prefix.clone(),
        }
    }

    /// Visit every key/value in `range`, ascending or descending.
    ///
    /// The visitor returns `false` to stop early.
    pub fn scan<F>(&self, range: &KeyRange, reverse: bool, mut visit: F) -> Result<(), StorageError>
    where
        F: FnMut(&[u8], &[u8]) -> Result<bool, StorageError>,
    {
        let mut cursor = self.cursor();
        let mut entry = if reverse {
            match &range.end {
                Some(end) => cursor.seek_before(end)?,
                None => cursor.last()?,
            }
        } else {
            cursor.seek(&range.start)?
        };

        while let Some((key, value)) = entry {
            let in_range = if reverse {
                key.as_slice() >= range.start.as_slice()
            } else {
                !range.past_end(&key)
            };
            if !in_range || !visit(&key, &value)? {
                break;
            }
            entry = if reverse { cursor.prev()? } else { cursor.next()? };
        }
        Ok(())
    }

    /// Number of keys in `range`.
    pub fn count(&self, range: &KeyRange) -> Result<u64, StorageError> {
        let mut count = 0u64;
        self.scan(range, false, |_, _| {
            count += 1;
            Ok(true)
        })?;
        Ok(count)
    }
}

enum RawIter<'tx, 'db> {
    Read(DBRawIteratorWithThreadMode<'tx, TransactionDB>),
    Write(DBRawIteratorWithThreadMode<'tx, DbTransaction<'db, TransactionDB>>),
}

macro_rules! with_iter {
    ($iter:expr, $it:ident => $body:expr) => {
        match $iter {
            RawIter::Read($it) => $body,
            RawIter::Write($it) => $body,
        }
    };
}

/// Key/value pair with the bucket prefix removed
pub type KeyValue = (Vec<u8>, Vec<u8>);

/// Ordered cursor over one bucket.
///
/// Positioning calls return the entry the cursor lands on, or `None` once it
/// leaves the bucket.
pub struct Cursor<'tx, 'db> {
    iter: RawIter<'tx, 'db>,
    prefix: Vec<u8>,
}

impl<'tx, 'db> Cursor<'tx, 'db> {
    fn current(&self) -> Result<Option<KeyValue>, StorageError> {
        with_iter!(&self.iter, it => {
            if !it.valid() {
                it.status()?;
                return Ok(None);
            }
            match (it.key(), it.value()) {
                (Some(key), Some(value)) if key.starts_with(&self.prefix) => Ok(Some((
                    key[self.prefix.len()..].to_vec(),
                    value.to_vec(),
                ))),
                _ => Ok(None),
            }
        })
    }

    fn prefix_end(&self) -> Option<Vec<u8>> {
        if self.prefix.is_empty() {
            return None;
        }
        // prefixes end in SEP, so bumping the last byte bounds the bucket
        let mut end = self.prefix.clone();
        if let Some(last) = end.last_mut() {
            *last = SEP + 1;
        }
        Some(end)
    }

    pub fn first(&mut self) -> Result<Option<KeyValue>, StorageError> {
        with_iter!(&mut self.iter, it => it.seek(&self.prefix));
        self.current()
    }

    pub fn last(&mut self) -> Result<Option<KeyValue>, StorageError> {
        match self.prefix_end() {
            Some(end) => {
                with_iter!(&mut self.iter, it => it.seek_for_prev(&end));
                // a key equal to the bound belongs to the next bucket
                if self.at_key(&end) {
                    with_iter!(&mut self.iter, it => it.prev());
                }
            }
            None => with_iter!(&mut self.iter, it => it.seek_to_last()),
        }
        self.current()
    }

    fn at_key(&self, key: &[u8]) -> bool {
        with_iter!(&self.iter, it => it.key() == Some(key))
    }

    /// Position at the first key `>= key`.
    pub fn seek(&mut self, key: &[u8]) -> Result<Option<KeyValue>, StorageError> {
        let mut target = self.prefix.clone();
        target.extend_from_slice(key);
        with_iter!(&mut self.iter, it => it.seek(&target));
        self.current()
    }

    /// Position at the last key `< key`.
    pub fn seek_before(&mut self, key: &[u8]) -> Result<Option<KeyValue>, StorageError> {
        let mut target = self.prefix.clone();
        target.extend_from_slice(key);
        with_iter!(&mut self.iter, it => it.seek_for_prev(&target));
        if self.at_key(&target) {
            with_iter!(&mut self.iter, it => it.prev());
        }
        self.current()
    }

    pub fn next(&mut self) -> Result<Option<KeyValue>, StorageError> {
        if !with_iter!(&self.iter, it => it.valid()) {
            return Ok(None);
        }
        with_iter!(&mut self.iter, it => it.next());
        self.current()
    }

    pub fn prev(&mut self) -> Result<Option<KeyValue>, StorageError> {
        if !with_iter!(&self.iter, it => it.valid()) {
            return Ok(None);
        }
        with_iter!(&mut self.iter, it => it.prev());
        self.current()
    }
}
