//! Item persistence.
//!
//! Index `GUID` (unique): feed_id, guid.

use feedhub_types::{Entry, Item};

use crate::entity::{self, Entity, EntitySchema, IndexDef, IndexKeys, KeyKind};
use crate::error::StorageError;
use crate::keys::{CompositeKey, KeyRange};
use crate::tx::Transaction;

pub const INDEX_GUID: &str = "GUID";

impl Entity for Item {
    const SCHEMA: EntitySchema = EntitySchema {
        name: "Item",
        indexes: &[IndexDef::unique(INDEX_GUID)],
        key: KeyKind::Sequence,
    };

    fn primary_key(&self) -> String {
        self.id.clone()
    }

    fn assign_key(&mut self, key: String) {
        self.id = key;
    }

    fn index_keys(&self) -> IndexKeys {
        let mut keys = IndexKeys::new();
        keys.insert(
            INDEX_GUID,
            CompositeKey::new().text(&self.feed_id).text(&self.guid).to_bytes(),
        );
        keys
    }

    fn missing_field(&self) -> Option<&'static str> {
        if self.feed_id.is_empty() {
            Some("feed_id")
        } else if self.guid.is_empty() {
            Some("guid")
        } else {
            None
        }
    }
}

pub struct ItemStore;

impl ItemStore {
    pub fn new(feed_id: &str, guid: &str) -> Item {
        Item::new(feed_id, guid)
    }

    pub fn get(tx: &Transaction<'_>, id: &str) -> Result<Option<Item>, StorageError> {
        entity::get(tx, id)
    }

    pub fn get_by_guid(
        tx: &Transaction<'_>,
        feed_id: &str,
        guid: &str,
    ) -> Result<Option<Item>, StorageError> {
        entity::get_by_index(tx, INDEX_GUID, &CompositeKey::new().text(feed_id).text(guid))
    }

    /// Every item of a feed, in guid order.
    pub fn get_for_feed(tx: &Transaction<'_>, feed_id: &str) -> Result<Vec<Item>, StorageError> {
        let range = KeyRange::prefix(&CompositeKey::new().text(feed_id));
        entity::scan_index(tx, INDEX_GUID, &range, false, None)
    }

    /// Items referenced by `entries`, in entry order. Missing items are skipped.
    pub fn get_by_entries(
        tx: &Transaction<'_>,
        entries: &[Entry],
    ) -> Result<Vec<Item>, StorageError> {
        let mut items = Vec::with_capacity(entries.len());
        for entry in entries {
            if let Some(item) = Self::get(tx, &entry.item_id)? {
                items.push(item);
            }
        }
        Ok(items)
    }

    pub fn save(tx: &Transaction<'_>, item: &mut Item) -> Result<(), StorageError> {
        entity::save(tx, item)
    }

    pub fn save_all(tx: &Transaction<'_>, items: &mut [Item]) -> Result<(), StorageError> {
        entity::save_all(tx, items)
    }

    pub fn delete(tx: &Transaction<'_>, id: &str) -> Result<bool, StorageError> {
        entity::delete::<Item>(tx, id)
    }
}
