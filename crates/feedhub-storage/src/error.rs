//! Storage layer error types.

use thiserror::Error;

/// Errors that can occur in the storage layer
#[derive(Error, Debug)]
pub enum StorageError {
    /// RocksDB operation failed
    #[error("RocksDB error: {0}")]
    Engine(#[from] rocksdb::Error),

    /// A unique index already maps the key to another record
    #[error("{entity}.{index} already holds {key:?}")]
    Conflict {
        entity: &'static str,
        index: &'static str,
        key: String,
    },

    /// A stored record could not be decoded
    #[error("corrupt {entity} record {key:?}: {source}")]
    Corruption {
        entity: &'static str,
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// A required field is empty
    #[error("{entity}: {field} is required")]
    Validation {
        entity: &'static str,
        field: &'static str,
    },

    /// Container (column family or nested bucket) not found
    #[error("Container not found: {0}")]
    ContainerNotFound(String),

    /// Write attempted inside a read-only transaction
    #[error("Write attempted in a read-only transaction")]
    ReadOnly,

    /// Database handle already closed
    #[error("Database is closed")]
    Closed,

    /// Key encoding error
    #[error("Key error: {0}")]
    Key(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StorageError {
    /// True for unique-index violations, which callers usually report as
    /// "already exists".
    pub fn is_conflict(&self) -> bool {
        matches!(self, StorageError::Conflict { .. })
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}
