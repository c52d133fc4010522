//! Generic record persistence and index maintenance.
//!
//! Every persisted type implements [`Entity`], describing its container name,
//! its secondary indexes and how to derive their keys. [`save`] and
//! [`delete`] keep the `Data` and `Index` containers consistent with each
//! other inside the caller's transaction.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::StorageError;
use crate::keys::{CompositeKey, KeyRange};
use crate::schema::{CF_DATA, CF_INDEX};
use crate::sequence;
use crate::tx::{Bucket, Transaction};

/// How an entity gets its primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    /// Minted from the entity's sequence on first save
    Sequence,
    /// Derived from the record's own fields
    Natural,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexDef {
    pub name: &'static str,
    /// At most one record per index key
    pub unique: bool,
}

impl IndexDef {
    pub const fn unique(name: &'static str) -> Self {
        Self { name, unique: true }
    }

    pub const fn multi(name: &'static str) -> Self {
        Self {
            name,
            unique: false,
        }
    }
}

/// Static description of a persisted type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntitySchema {
    pub name: &'static str,
    pub indexes: &'static [IndexDef],
    pub key: KeyKind,
}

impl EntitySchema {
    pub fn index(&self, name: &str) -> Option<&'static IndexDef> {
        self.indexes.iter().find(|i| i.name == name)
    }
}

/// Index name -> encoded index key. Indexes absent from the map have no
/// entry for the record.
pub type IndexKeys = BTreeMap<&'static str, Vec<u8>>;

/// A record type that can be saved through [`save`].
pub trait Entity: Serialize + DeserializeOwned + Sized {
    const SCHEMA: EntitySchema;

    /// Current primary key; empty when not yet assigned.
    fn primary_key(&self) -> String;

    /// Store a freshly minted key. Only called for [`KeyKind::Sequence`].
    fn assign_key(&mut self, key: String);

    /// Keys for every index this record appears in.
    fn index_keys(&self) -> IndexKeys;

    /// First required field that is empty, if any.
    fn missing_field(&self) -> Option<&'static str>;

    fn validate(&self) -> Result<(), StorageError> {
        match self.missing_field() {
            Some(field) => Err(StorageError::Validation {
                entity: Self::SCHEMA.name,
                field,
            }),
            None => Ok(()),
        }
    }

    fn encode(&self) -> Result<Vec<u8>, StorageError> {
        Ok(serde_json::to_vec(self)?)
    }

    fn decode(key: &[u8], bytes: &[u8]) -> Result<Self, StorageError> {
        serde_json::from_slice(bytes).map_err(|source| StorageError::Corruption {
            entity: Self::SCHEMA.name,
            key: String::from_utf8_lossy(key).into_owned(),
            source,
        })
    }
}

/// Data container of `E`.
pub fn data_bucket<'tx, 'db, E: Entity>(
    tx: &'tx Transaction<'db>,
) -> Result<Bucket<'tx, 'db>, StorageError> {
    tx.bucket(&[CF_DATA, E::SCHEMA.name])
}

/// Container of one index of `E`.
pub fn index_bucket<'tx, 'db, E: Entity>(
    tx: &'tx Transaction<'db>,
    index: &str,
) -> Result<Bucket<'tx, 'db>, StorageError> {
    tx.bucket(&[CF_INDEX, E::SCHEMA.name, index])
}

/// Load a record by primary key.
pub fn get<E: Entity>(tx: &Transaction<'_>, id: &str) -> Result<Option<E>, StorageError> {
    match data_bucket::<E>(tx)?.get(id.as_bytes())? {
        Some(bytes) => Ok(Some(E::decode(id.as_bytes(), &bytes)?)),
        None => Ok(None),
    }
}

/// Load the record an index key points at.
pub fn get_by_index<E: Entity>(
    tx: &Transaction<'_>,
    index: &str,
    key: &CompositeKey,
) -> Result<Option<E>, StorageError> {
    match index_bucket::<E>(tx, index)?.get(&key.to_bytes())? {
        Some(id) => get::<E>(tx, &String::from_utf8_lossy(&id)),
        None => Ok(None),
    }
}

/// Load every record whose index key lies in `range`, in index order.
///
/// Index entries whose record has disappeared are skipped.
pub fn scan_index<E: Entity>(
    tx: &Transaction<'_>,
    index: &str,
    range: &KeyRange,
    reverse: bool,
    limit: Option<usize>,
) -> Result<Vec<E>, StorageError> {
    if limit == Some(0) {
        return Ok(Vec::new());
    }
    let data = data_bucket::<E>(tx)?;
    let mut records = Vec::new();
    index_bucket::<E>(tx, index)?.scan(range, reverse, |_, id| {
        if let Some(bytes) = data.get(id)? {
            records.push(E::decode(id, &bytes)?);
        }
        Ok(limit.map_or(true, |n| records.len() < n))
    })?;
    Ok(records)
}

/// Load every record whose primary key lies in `range`.
pub fn scan_data<E: Entity>(
    tx: &Transaction<'_>,
    range: &KeyRange,
    reverse: bool,
) -> Result<Vec<E>, StorageError> {
    let mut records = Vec::new();
    data_bucket::<E>(tx)?.scan(range, reverse, |key, bytes| {
        records.push(E::decode(key, bytes)?);
        Ok(true)
    })?;
    Ok(records)
}

/// Insert or update a record and its index entries.
///
/// A record without a key gets one from the entity's sequence. If anything
/// fails, the writes made by this call are undone and a freshly assigned key
/// is cleared again; the rest of the enclosing transaction is untouched.
pub fn save<E: Entity>(tx: &Transaction<'_>, record: &mut E) -> Result<(), StorageError> {
    if !tx.is_writable() {
        return Err(StorageError::ReadOnly);
    }
    record.validate()?;

    tx.set_savepoint()?;
    let minted = record.primary_key().is_empty();
    match write_record(tx, record) {
        Ok(()) => Ok(()),
        Err(err) => {
            tx.rollback_to_savepoint()?;
            if minted {
                record.assign_key(String::new());
            }
            Err(err)
        }
    }
}

fn write_record<E: Entity>(tx: &Transaction<'_>, record: &mut E) -> Result<(), StorageError> {
    let schema = E::SCHEMA;
    if record.primary_key().is_empty() {
        let id = sequence::next_id(tx, schema.name)?;
        record.assign_key(id);
    }
    let id = record.primary_key();

    let old_keys = match get::<E>(tx, &id)? {
        Some(previous) => previous.index_keys(),
        None => IndexKeys::new(),
    };
    let new_keys = record.index_keys();

    for index in schema.indexes.iter().filter(|i| i.unique) {
        let Some(key) = new_keys.get(index.name) else {
            continue;
        };
        if old_keys.get(index.name) == Some(key) {
            continue;
        }
        if let Some(owner) = index_bucket::<E>(tx, index.name)?.get(key)? {
            if owner != id.as_bytes() {
                return Err(StorageError::Conflict {
                    entity: schema.name,
                    index: index.name,
                    key: String::from_utf8_lossy(key).into_owned(),
                });
            }
        }
    }

    data_bucket::<E>(tx)?.put(id.as_bytes(), &record.encode()?)?;

    for index in schema.indexes {
        let old = old_keys.get(index.name);
        let new = new_keys.get(index.name);
        if old == new {
            continue;
        }
        let bucket = index_bucket::<E>(tx, index.name)?;
        if let Some(old) = old {
            // never drop a mapping owned by another record
            if bucket.get(old)?.as_deref() == Some(id.as_bytes()) {
                bucket.delete(old)?;
            }
        }
        if let Some(new) = new {
            bucket.put(new, id.as_bytes())?;
        }
    }

    debug!(entity = schema.name, id = %id, "Saved record");
    Ok(())
}

/// Remove a record and its index entries.
///
/// Returns `false` when no record had that key. Dependent records are left
/// alone.
pub fn delete<E: Entity>(tx: &Transaction<'_>, id: &str) -> Result<bool, StorageError> {
    if !tx.is_writable() {
        return Err(StorageError::ReadOnly);
    }
    let Some(record) = get::<E>(tx, id)? else {
        return Ok(false);
    };

    for (index, key) in record.index_keys() {
        let bucket = index_bucket::<E>(tx, index)?;
        if bucket.get(&key)?.as_deref() == Some(id.as_bytes()) {
            bucket.delete(&key)?;
        }
    }
    data_bucket::<E>(tx)?.delete(id.as_bytes())?;

    debug!(entity = E::SCHEMA.name, id = %id, "Deleted record");
    Ok(true)
}

/// Save every record, stopping at the first failure.
pub fn save_all<E: Entity>(tx: &Transaction<'_>, records: &mut [E]) -> Result<(), StorageError> {
    for record in records.iter_mut() {
        save(tx, record)?;
    }
    Ok(())
}
