//! Durable id sequences.
//!
//! Counters live in the `sequences` map of the config record and are
//! advanced inside the caller's transaction, so a rolled-back transaction
//! never leaves a counter ahead of committed data it did not write. Ids are
//! strictly increasing per entity; an id handed out by an aborted save may be
//! handed out again.

use feedhub_types::{Config, CONFIG_KEY};

use crate::entity::{data_bucket, get, Entity};
use crate::error::StorageError;
use crate::keys::{encode_uint, UINT_MAX};
use crate::tx::Transaction;

/// Mint the next primary key for `entity`.
pub fn next_id(tx: &Transaction<'_>, entity: &str) -> Result<String, StorageError> {
    let mut config = get::<Config>(tx, CONFIG_KEY)?.unwrap_or_default();
    let next = config.sequence(entity) + 1;
    if next > UINT_MAX {
        return Err(StorageError::Key(format!("{} sequence exhausted", entity)));
    }
    config.sequences.insert(entity.to_string(), next);

    // Config has no indexes, so the record is written directly rather than
    // through entity::save, keeping the caller's savepoint on top.
    data_bucket::<Config>(tx)?.put(CONFIG_KEY.as_bytes(), &config.encode()?)?;
    encode_uint(next)
}
