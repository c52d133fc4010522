//! Feed persistence.
//!
//! Indexes:
//! - `URL` (unique): lower-cased url
//! - `NextFetch`: next_fetch, id

use chrono::{DateTime, Duration, Utc};

use feedhub_types::Feed;

use crate::entity::{self, Entity, EntitySchema, IndexDef, IndexKeys, KeyKind};
use crate::error::StorageError;
use crate::keys::{CompositeKey, EndBound, KeyRange};
use crate::tx::Transaction;

pub const INDEX_URL: &str = "URL";
pub const INDEX_NEXT_FETCH: &str = "NextFetch";

impl Entity for Feed {
    const SCHEMA: EntitySchema = EntitySchema {
        name: "Feed",
        indexes: &[IndexDef::unique(INDEX_URL), IndexDef::multi(INDEX_NEXT_FETCH)],
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
        keys.insert(INDEX_URL, CompositeKey::new().folded(&self.url).to_bytes());
        keys.insert(
            INDEX_NEXT_FETCH,
            CompositeKey::new()
                .maybe_time(self.next_fetch.as_ref())
                .text(&self.id)
                .to_bytes(),
        );
        keys
    }

    fn missing_field(&self) -> Option<&'static str> {
        self.url.is_empty().then_some("url")
    }
}

pub struct FeedStore;

impl FeedStore {
    pub fn new(url: &str) -> Feed {
        Feed::new(url)
    }

    pub fn get(tx: &Transaction<'_>, id: &str) -> Result<Option<Feed>, StorageError> {
        entity::get(tx, id)
    }

    /// Look up a feed by url, ignoring case.
    pub fn get_by_url(tx: &Transaction<'_>, url: &str) -> Result<Option<Feed>, StorageError> {
        entity::get_by_index(tx, INDEX_URL, &CompositeKey::new().folded(url))
    }

    /// Feeds due by `max_time`, soonest first.
    ///
    /// Comparison is at second resolution, so a feed due within the same
    /// second as `max_time` is included. Feeds without a fetch time are
    /// always due.
    pub fn get_next(tx: &Transaction<'_>, max_time: DateTime<Utc>) -> Result<Vec<Feed>, StorageError> {
        let range = match max_time.checked_add_signed(Duration::seconds(1)) {
            Some(end) => KeyRange::between(
                &CompositeKey::new(),
                &CompositeKey::new().time(&end),
                EndBound::Exclusive,
            ),
            None => KeyRange::all(),
        };
        entity::scan_index(tx, INDEX_NEXT_FETCH, &range, false, None)
    }

    /// Every feed, in id order.
    pub fn all(tx: &Transaction<'_>) -> Result<Vec<Feed>, StorageError> {
        entity::scan_data(tx, &KeyRange::all(), false)
    }

    pub fn save(tx: &Transaction<'_>, feed: &mut Feed) -> Result<(), StorageError> {
        entity::save(tx, feed)
    }

    /// Delete a feed. Its items, entries, subscriptions and transmissions
    /// are the caller's to remove.
    pub fn delete(tx: &Transaction<'_>, id: &str) -> Result<bool, StorageError> {
        entity::delete::<Feed>(tx, id)
    }
}
