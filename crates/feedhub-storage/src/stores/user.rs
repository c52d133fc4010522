//! User persistence.
//!
//! Indexes:
//! - `Username` (unique): lower-cased username
//! - `FeverHash` (unique): fever_hash, only while it is set

use feedhub_types::User;

use crate::entity::{self, Entity, EntitySchema, IndexDef, IndexKeys, KeyKind};
use crate::error::StorageError;
use crate::keys::{CompositeKey, KeyRange};
use crate::tx::Transaction;

pub const INDEX_USERNAME: &str = "Username";
pub const INDEX_FEVER_HASH: &str = "FeverHash";

impl Entity for User {
    const SCHEMA: EntitySchema = EntitySchema {
        name: "User",
        indexes: &[IndexDef::unique(INDEX_FEVER_HASH), IndexDef::unique(INDEX_USERNAME)],
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
        keys.insert(INDEX_USERNAME, CompositeKey::new().folded(&self.username).to_bytes());
        if !self.fever_hash.is_empty() {
            keys.insert(INDEX_FEVER_HASH, CompositeKey::new().text(&self.fever_hash).to_bytes());
        }
        keys
    }

    fn missing_field(&self) -> Option<&'static str> {
        self.username.is_empty().then_some("username")
    }
}

pub struct UserStore;

impl UserStore {
    pub fn new(username: &str) -> User {
        User::new(username)
    }

    pub fn get(tx: &Transaction<'_>, id: &str) -> Result<Option<User>, StorageError> {
        entity::get(tx, id)
    }

    /// Look up a user by name, ignoring case.
    pub fn get_by_username(
        tx: &Transaction<'_>,
        username: &str,
    ) -> Result<Option<User>, StorageError> {
        entity::get_by_index(tx, INDEX_USERNAME, &CompositeKey::new().folded(username))
    }

    pub fn get_by_fever_hash(
        tx: &Transaction<'_>,
        fever_hash: &str,
    ) -> Result<Option<User>, StorageError> {
        if fever_hash.is_empty() {
            return Ok(None);
        }
        entity::get_by_index(tx, INDEX_FEVER_HASH, &CompositeKey::new().text(fever_hash))
    }

    /// Every user, in id order.
    pub fn all(tx: &Transaction<'_>) -> Result<Vec<User>, StorageError> {
        entity::scan_data(tx, &KeyRange::all(), false)
    }

    pub fn save(tx: &Transaction<'_>, user: &mut User) -> Result<(), StorageError> {
        entity::save(tx, user)
    }

    pub fn delete(tx: &Transaction<'_>, id: &str) -> Result<bool, StorageError> {
        entity::delete::<User>(tx, id)
    }
}
