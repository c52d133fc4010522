//! Subscription persistence.
//!
//! Keyed by `(user_id, feed_id)`, so a user's subscriptions are a key
//! prefix of the data container. Index `Feed` (feed, user) lists a feed's
//! subscribers.

use feedhub_types::Subscription;

use crate::entity::{self, Entity, EntitySchema, IndexDef, IndexKeys, KeyKind};
use crate::error::StorageError;
use crate::keys::{compose, CompositeKey, KeyRange};
use crate::tx::Transaction;

pub const INDEX_FEED: &str = "Feed";

impl Entity for Subscription {
    const SCHEMA: EntitySchema = EntitySchema {
        name: "Subscription",
        indexes: &[IndexDef::multi(INDEX_FEED)],
        key: KeyKind::Natural,
    };

    fn primary_key(&self) -> String {
        compose(&[&self.user_id, &self.feed_id])
    }

    fn assign_key(&mut self, _key: String) {}

    fn index_keys(&self) -> IndexKeys {
        let mut keys = IndexKeys::new();
        keys.insert(
            INDEX_FEED,
            CompositeKey::new().text(&self.feed_id).text(&self.user_id).to_bytes(),
        );
        keys
    }

    fn missing_field(&self) -> Option<&'static str> {
        if self.user_id.is_empty() {
            Some("user_id")
        } else if self.feed_id.is_empty() {
            Some("feed_id")
        } else {
            None
        }
    }
}

pub struct SubscriptionStore;

impl SubscriptionStore {
    pub fn new(user_id: &str, feed_id: &str) -> Subscription {
        Subscription::new(user_id, feed_id)
    }

    pub fn get(
        tx: &Transaction<'_>,
        user_id: &str,
        feed_id: &str,
    ) -> Result<Option<Subscription>, StorageError> {
        entity::get(tx, &compose(&[user_id, feed_id]))
    }

    pub fn get_for_user(
        tx: &Transaction<'_>,
        user_id: &str,
    ) -> Result<Vec<Subscription>, StorageError> {
        entity::scan_data(tx, &KeyRange::prefix(&CompositeKey::new().text(user_id)), false)
    }

    pub fn get_for_feed(
        tx: &Transaction<'_>,
        feed_id: &str,
    ) -> Result<Vec<Subscription>, StorageError> {
        let range = KeyRange::prefix(&CompositeKey::new().text(feed_id));
        entity::scan_index(tx, INDEX_FEED, &range, false, None)
    }

    pub fn save(tx: &Transaction<'_>, subscription: &mut Subscription) -> Result<(), StorageError> {
        entity::save(tx, subscription)
    }

    pub fn delete(tx: &Transaction<'_>, user_id: &str, feed_id: &str) -> Result<bool, StorageError> {
        entity::delete::<Subscription>(tx, &compose(&[user_id, feed_id]))
    }
}
