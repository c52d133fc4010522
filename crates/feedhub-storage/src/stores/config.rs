//! The store's configuration record.

use feedhub_types::{Config, CONFIG_KEY};

use crate::entity::{self, Entity, EntitySchema, IndexKeys, KeyKind};
use crate::error::StorageError;
use crate::tx::Transaction;

impl Entity for Config {
    const SCHEMA: EntitySchema = EntitySchema {
        name: "Config",
        indexes: &[],
        key: KeyKind::Natural,
    };

    fn primary_key(&self) -> String {
        CONFIG_KEY.to_string()
    }

    fn assign_key(&mut self, _key: String) {}

    fn index_keys(&self) -> IndexKeys {
        IndexKeys::new()
    }

    fn missing_field(&self) -> Option<&'static str> {
        None
    }
}

pub struct ConfigStore;

impl ConfigStore {
    /// The config record, or a default one if none has been saved.
    pub fn get(tx: &Transaction<'_>) -> Result<Config, StorageError> {
        Ok(entity::get::<Config>(tx, CONFIG_KEY)?.unwrap_or_default())
    }

    /// Persist `config`.
    ///
    /// Sequences never move backwards: each counter keeps the larger of the
    /// stored value and the one in `config`, and `config` is updated to match.
    pub fn save(tx: &Transaction<'_>, config: &mut Config) -> Result<(), StorageError> {
        let stored = Self::get(tx)?;
        for (entity, current) in stored.sequences {
            let counter = config.sequences.entry(entity).or_insert(current);
            *counter = (*counter).max(current);
        }
        entity::save(tx, config)
    }
}
