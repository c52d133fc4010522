//! Group persistence.
//!
//! Index `UserName` (unique): user_id, name.

use feedhub_types::Group;

use crate::entity::{self, Entity, EntitySchema, IndexDef, IndexKeys, KeyKind};
use crate::error::StorageError;
use crate::keys::{CompositeKey, KeyRange};
use crate::tx::Transaction;

pub const INDEX_USER_NAME: &str = "UserName";

impl Entity for Group {
    const SCHEMA: EntitySchema = EntitySchema {
        name: "Group",
        indexes: &[IndexDef::unique(INDEX_USER_NAME)],
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
            INDEX_USER_NAME,
            CompositeKey::new().text(&self.user_id).text(&self.name).to_bytes(),
        );
        keys
    }

    fn missing_field(&self) -> Option<&'static str> {
        if self.user_id.is_empty() {
            Some("user_id")
        } else if self.name.is_empty() {
            Some("name")
        } else {
            None
        }
    }
}

pub struct GroupStore;

impl GroupStore {
    pub fn new(user_id: &str, name: &str) -> Group {
        Group::new(user_id, name)
    }

    pub fn get(tx: &Transaction<'_>, id: &str) -> Result<Option<Group>, StorageError> {
        entity::get(tx, id)
    }

    pub fn get_by_name(
        tx: &Transaction<'_>,
        user_id: &str,
        name: &str,
    ) -> Result<Option<Group>, StorageError> {
        entity::get_by_index(tx, INDEX_USER_NAME, &CompositeKey::new().text(user_id).text(name))
    }

    /// A user's groups, by name.
    pub fn get_for_user(tx: &Transaction<'_>, user_id: &str) -> Result<Vec<Group>, StorageError> {
        let range = KeyRange::prefix(&CompositeKey::new().text(user_id));
        entity::scan_index(tx, INDEX_USER_NAME, &range, false, None)
    }

    pub fn save(tx: &Transaction<'_>, group: &mut Group) -> Result<(), StorageError> {
        entity::save(tx, group)
    }

    /// Delete a group. Subscriptions keep the stale id until the next
    /// orphan purge.
    pub fn delete(tx: &Transaction<'_>, id: &str) -> Result<bool, StorageError> {
        entity::delete::<Group>(tx, id)
    }
}
