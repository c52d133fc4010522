//! Persistent store configuration record.
//!
//! Exactly one `Config` exists per store, saved under the reserved key
//! [`CONFIG_KEY`]. It carries the id sequences of every sequence-keyed
//! entity, so it is rewritten whenever a new record is first saved.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Primary key of the single config record
pub const CONFIG_KEY: &str = "config";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Free-form application settings
    pub settings: BTreeMap<String, String>,

    /// Last id minted per entity name
    pub sequences: BTreeMap<String, u64>,

    /// Layout version of the index keyspace when last opened
    pub schema_version: u32,
}

impl Config {
    pub fn setting(&self, name: &str) -> Option<&str> {
        self.settings.get(name).map(String::as_str)
    }

    pub fn set_setting(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.settings.insert(name.into(), value.into());
    }

    pub fn remove_setting(&mut self, name: &str) -> Option<String> {
        self.settings.remove(name)
    }

    /// Last value minted for `entity`, zero if none yet.
    pub fn sequence(&self, entity: &str) -> u64 {
        self.sequences.get(entity).copied().unwrap_or(0)
    }
}
