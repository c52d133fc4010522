//! Container layout.
//!
//! Two column families hold everything:
//! - `Data`: `<Entity>\0<primary key>` -> JSON record
//! - `Index`: `<Entity>\0<Index>\0<index key>` -> primary key
//!
//! Nested containers are key prefixes inside a column family. Only the
//! containers named by a registered [`EntitySchema`] exist.

use rocksdb::{ColumnFamilyDescriptor, DBCompressionType, Options};

use feedhub_types::{
    Compression, Config, Entry, Feed, Group, Item, StorageSettings, Subscription, Transmission,
    User,
};

use crate::entity::{Entity, EntitySchema};
use crate::error::StorageError;

/// Column family holding encoded records
pub const CF_DATA: &str = "Data";

/// Column family holding secondary index entries
pub const CF_INDEX: &str = "Index";

pub const ALL_CF_NAMES: &[&str] = &[CF_DATA, CF_INDEX];

/// Version of the index layout. Bumping it makes the next open rebuild
/// every index.
pub const SCHEMA_VERSION: u32 = 1;

/// Every persisted entity type.
pub const ALL_SCHEMAS: &[&EntitySchema] = &[
    &<Config as Entity>::SCHEMA,
    &<Entry as Entity>::SCHEMA,
    &<Feed as Entity>::SCHEMA,
    &<Group as Entity>::SCHEMA,
    &<Item as Entity>::SCHEMA,
    &<Subscription as Entity>::SCHEMA,
    &<Transmission as Entity>::SCHEMA,
    &<User as Entity>::SCHEMA,
];

pub fn find_schema(name: &str) -> Option<&'static EntitySchema> {
    ALL_SCHEMAS.iter().copied().find(|s| s.name == name)
}

/// Check a container path against the registered schemas.
///
/// Valid paths are `[Data]`, `[Data, Entity]`, `[Index]`, `[Index, Entity]`
/// and `[Index, Entity, IndexName]`.
pub fn check_container(path: &[&str]) -> Result<(), StorageError> {
    let not_found = || StorageError::ContainerNotFound(path.join("/"));

    let (root, rest) = path.split_first().ok_or_else(not_found)?;
    let max_depth = match *root {
        CF_DATA => 1,
        CF_INDEX => 2,
        _ => return Err(not_found()),
    };
    if rest.len() > max_depth {
        return Err(not_found());
    }

    if let Some(entity) = rest.first() {
        let schema = find_schema(entity).ok_or_else(not_found)?;
        if let Some(index) = rest.get(1) {
            if schema.index(index).is_none() {
                return Err(not_found());
            }
        }
    }
    Ok(())
}

fn compression_type(compression: Compression) -> DBCompressionType {
    match compression {
        Compression::None => DBCompressionType::None,
        Compression::Lz4 => DBCompressionType::Lz4,
        Compression::Zstd => DBCompressionType::Zstd,
    }
}

fn cf_options(settings: &StorageSettings) -> Options {
    let mut opts = Options::default();
    opts.set_compression_type(compression_type(settings.compression));
    opts
}

/// Build all column family descriptors
pub fn build_cf_descriptors(settings: &StorageSettings) -> Vec<ColumnFamilyDescriptor> {
    ALL_CF_NAMES
        .iter()
        .map(|name| ColumnFamilyDescriptor::new(*name, cf_options(settings)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_containers() {
        assert!(check_container(&["Data"]).is_ok());
        assert!(check_container(&["Data", "Feed"]).is_ok());
        assert!(check_container(&["Index", "Entry", "FeedReadUpdated"]).is_ok());
        assert!(check_container(&["Index", "User", "FeverHash"]).is_ok());
    }

    #[test]
    fn test_unknown_containers() {
        for path in [
            &[][..],
            &["Blobs"][..],
            &["Data", "Article"][..],
            &["Data", "Feed", "URL"][..],
            &["Index", "Feed", "Title"][..],
            &["Index", "Feed", "URL", "extra"][..],
        ] {
            assert!(
                matches!(check_container(path), Err(StorageError::ContainerNotFound(_))),
                "{:?} should not exist",
                path
            );
        }
    }

    #[test]
    fn test_schema_names_unique() {
        for (i, a) in ALL_SCHEMAS.iter().enumerate() {
            for b in &ALL_SCHEMAS[i + 1..] {
                assert_ne!(a.name, b.name);
            }
        }
    }

    #[test]
    fn test_descriptors_cover_all_families() {
        let cfs = build_cf_descriptors(&StorageSettings::default());
        assert_eq!(cfs.len(), ALL_CF_NAMES.len());
    }
}
