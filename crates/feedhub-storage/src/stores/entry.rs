//! Entry persistence and queries.
//!
//! Entries are keyed by `(user_id, item_id)`. Six indexes, all ending in
//! the updated time and item id, serve the per-user listings:
//!
//! | index             | fields                               |
//! |-------------------|--------------------------------------|
//! | `Updated`         | user, updated, item                  |
//! | `ReadUpdated`     | user, read, updated, item            |
//! | `StarUpdated`     | user, star, updated, item            |
//! | `FeedUpdated`     | user, feed, updated, item            |
//! | `FeedReadUpdated` | user, feed, read, updated, item      |
//! | `FeedStarUpdated` | user, feed, star, updated, item      |

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use tracing::debug;

use feedhub_types::{Entry, Item};

use crate::entity::{self, Entity, EntitySchema, IndexDef, IndexKeys, KeyKind};
use crate::error::StorageError;
use crate::keys::{compose, CompositeKey, EndBound, KeyRange};
use crate::stores::subscription::SubscriptionStore;
use crate::tx::Transaction;

pub const INDEX_UPDATED: &str = "Updated";
pub const INDEX_READ_UPDATED: &str = "ReadUpdated";
pub const INDEX_STAR_UPDATED: &str = "StarUpdated";
pub const INDEX_FEED_UPDATED: &str = "FeedUpdated";
pub const INDEX_FEED_READ_UPDATED: &str = "FeedReadUpdated";
pub const INDEX_FEED_STAR_UPDATED: &str = "FeedStarUpdated";

impl Entity for Entry {
    const SCHEMA: EntitySchema = EntitySchema {
        name: "Entry",
        indexes: &[
            IndexDef::multi(INDEX_FEED_READ_UPDATED),
            IndexDef::multi(INDEX_FEED_STAR_UPDATED),
            IndexDef::multi(INDEX_FEED_UPDATED),
            IndexDef::multi(INDEX_READ_UPDATED),
            IndexDef::multi(INDEX_STAR_UPDATED),
            IndexDef::multi(INDEX_UPDATED),
        ],
        key: KeyKind::Natural,
    };

    fn primary_key(&self) -> String {
        compose(&[&self.user_id, &self.item_id])
    }

    fn assign_key(&mut self, _key: String) {}

    fn index_keys(&self) -> IndexKeys {
        let user = || CompositeKey::new().text(&self.user_id);
        let feed = || user().text(&self.feed_id);
        let tail = |key: CompositeKey| {
            key.maybe_time(self.updated.as_ref())
                .text(&self.item_id)
                .to_bytes()
        };

        let mut keys = IndexKeys::new();
        keys.insert(INDEX_UPDATED, tail(user()));
        keys.insert(INDEX_READ_UPDATED, tail(user().flag(self.read)));
        keys.insert(INDEX_STAR_UPDATED, tail(user().flag(self.star)));
        keys.insert(INDEX_FEED_UPDATED, tail(feed()));
        keys.insert(INDEX_FEED_READ_UPDATED, tail(feed().flag(self.read)));
        keys.insert(INDEX_FEED_STAR_UPDATED, tail(feed().flag(self.star)));
        keys
    }

    fn missing_field(&self) -> Option<&'static str> {
        if self.user_id.is_empty() {
            Some("user_id")
        } else if self.item_id.is_empty() {
            Some("item_id")
        } else if self.feed_id.is_empty() {
            Some("feed_id")
        } else {
            None
        }
    }
}

pub struct EntryStore;

impl EntryStore {
    pub fn new(user_id: &str, item_id: &str, feed_id: &str) -> Entry {
        Entry {
            feed_id: feed_id.to_string(),
            ..Entry::new(user_id, item_id)
        }
    }

    pub fn get(
        tx: &Transaction<'_>,
        user_id: &str,
        item_id: &str,
    ) -> Result<Option<Entry>, StorageError> {
        entity::get(tx, &compose(&[user_id, item_id]))
    }

    /// Start a time-ordered listing of a user's entries.
    pub fn query<'a, 'db>(tx: &'a Transaction<'db>, user_id: &str) -> EntryQuery<'a, 'db> {
        EntryQuery::new(tx, user_id)
    }

    /// A user's entries by item id, `min_id` inclusive to `max_id` exclusive.
    pub fn range(
        tx: &Transaction<'_>,
        user_id: &str,
        min_id: Option<&str>,
        max_id: Option<&str>,
    ) -> Result<Vec<Entry>, StorageError> {
        let user = CompositeKey::new().text(user_id);
        let mut range = KeyRange::prefix(&user);
        if let Some(min) = min_id {
            range.start = user.clone().text(min).to_bytes();
        }
        if let Some(max) = max_id {
            range.end = Some(user.text(max).to_bytes());
        }
        entity::scan_data(tx, &range, false)
    }

    /// Create entries for newly fetched items for every subscriber of their
    /// feeds, honouring each subscription's auto-read and auto-star flags.
    ///
    /// Items must already be saved. Entries that exist are left untouched so
    /// re-adding an item never resets a user's read state. Returns the
    /// entries created.
    pub fn add_items(tx: &Transaction<'_>, items: &[Item]) -> Result<Vec<Entry>, StorageError> {
        let mut by_feed: BTreeMap<&str, Vec<&Item>> = BTreeMap::new();
        for item in items {
            by_feed.entry(item.feed_id.as_str()).or_default().push(item);
        }

        let mut created = Vec::new();
        for (feed_id, items) in by_feed {
            for subscription in SubscriptionStore::get_for_feed(tx, feed_id)? {
                for item in &items {
                    if Self::get(tx, &subscription.user_id, &item.id)?.is_some() {
                        continue;
                    }
                    let mut entry = Self::new(&subscription.user_id, &item.id, feed_id);
                    entry.updated = item.updated.or(item.created);
                    entry.read = subscription.auto_read;
                    entry.star = subscription.auto_star;
                    Self::save(tx, &mut entry)?;
                    created.push(entry);
                }
            }
        }

        debug!(items = items.len(), entries = created.len(), "Added entries");
        Ok(created)
    }

    pub fn save(tx: &Transaction<'_>, entry: &mut Entry) -> Result<(), StorageError> {
        entity::save(tx, entry)
    }

    pub fn save_all(tx: &Transaction<'_>, entries: &mut [Entry]) -> Result<(), StorageError> {
        entity::save_all(tx, entries)
    }

    pub fn delete(tx: &Transaction<'_>, user_id: &str, item_id: &str) -> Result<bool, StorageError> {
        entity::delete::<Entry>(tx, &compose(&[user_id, item_id]))
    }
}

/// Builder for time-ranged entry listings.
///
/// Entries are ordered by updated time, then item id. `min` is inclusive and
/// `max` exclusive, both at second resolution; `max` defaults to one second
/// past the time the query was created so entries saved in the current
/// second are found. Without `min`, entries that have no updated time are
/// included.
pub struct EntryQuery<'a, 'db> {
    tx: &'a Transaction<'db>,
    user_id: String,
    feed_id: Option<String>,
    min: Option<DateTime<Utc>>,
    max: DateTime<Utc>,
    reverse: bool,
    limit: Option<usize>,
}

/// Which flag, if any, narrows the listing.
#[derive(Clone, Copy)]
enum Filter {
    All,
    Unread,
    Starred,
}

impl<'a, 'db> EntryQuery<'a, 'db> {
    fn new(tx: &'a Transaction<'db>, user_id: &str) -> Self {
        Self {
            tx,
            user_id: user_id.to_string(),
            feed_id: None,
            min: None,
            max: Utc::now().trunc_subsecs(0) + Duration::seconds(1),
            reverse: false,
            limit: None,
        }
    }

    /// Restrict to one feed.
    pub fn feed(mut self, feed_id: &str) -> Self {
        self.feed_id = Some(feed_id.to_string());
        self
    }

    /// Earliest updated time, inclusive.
    pub fn min(mut self, min: DateTime<Utc>) -> Self {
        self.min = Some(min);
        self
    }

    /// Latest updated time, exclusive.
    pub fn max(mut self, max: DateTime<Utc>) -> Self {
        self.max = max;
        self
    }

    /// Newest first.
    pub fn reverse(mut self) -> Self {
        self.reverse = true;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn plan(&self, filter: Filter) -> (&'static str, KeyRange) {
        let mut segment = CompositeKey::new().text(&self.user_id);
        if let Some(feed) = &self.feed_id {
            segment = segment.text(feed);
        }
        let (index, segment) = match (filter, self.feed_id.is_some()) {
            (Filter::All, false) => (INDEX_UPDATED, segment),
            (Filter::All, true) => (INDEX_FEED_UPDATED, segment),
            (Filter::Unread, false) => (INDEX_READ_UPDATED, segment.flag(false)),
            (Filter::Unread, true) => (INDEX_FEED_READ_UPDATED, segment.flag(false)),
            (Filter::Starred, false) => (INDEX_STAR_UPDATED, segment.flag(true)),
            (Filter::Starred, true) => (INDEX_FEED_STAR_UPDATED, segment.flag(true)),
        };

        let mut range = KeyRange::between(
            &segment,
            &segment.clone().time(&self.max),
            EndBound::Exclusive,
        );
        range.start = match &self.min {
            Some(min) => segment.time(min).to_bytes(),
            None => KeyRange::prefix(&segment).start,
        };
        (index, range)
    }

    fn fetch(self, filter: Filter) -> Result<Vec<Entry>, StorageError> {
        let (index, range) = self.plan(filter);
        entity::scan_index(self.tx, index, &range, self.reverse, self.limit)
    }

    /// Every entry in range.
    pub fn get(self) -> Result<Vec<Entry>, StorageError> {
        self.fetch(Filter::All)
    }

    /// Unread entries in range.
    pub fn unread(self) -> Result<Vec<Entry>, StorageError> {
        self.fetch(Filter::Unread)
    }

    /// Starred entries in range.
    pub fn starred(self) -> Result<Vec<Entry>, StorageError> {
        self.fetch(Filter::Starred)
    }

    /// Number of entries in range, without loading them. `limit` caps the count.
    pub fn count(self) -> Result<u64, StorageError> {
        let (index, range) = self.plan(Filter::All);
        let count = entity::index_bucket::<Entry>(self.tx, index)?.count(&range)?;
        Ok(match self.limit {
            Some(limit) => count.min(limit as u64),
            None => count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn create_test_db() -> (Database, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::open(temp_dir.path()).unwrap();
        (db, temp_dir)
    }

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, h, 0, 0).unwrap()
    }

    fn entry(user: &str, item: &str, feed: &str, hour: u32, read: bool, star: bool) -> Entry {
        let mut e = EntryStore::new(user, item, feed);
        e.updated = Some(at(hour));
        e.read = read;
        e.star = star;
        e
    }

    /// u1 has three entries in f1 and one in f2; u2 has one.
    fn seed(db: &Database) {
        db.update(|tx| {
            let mut entries = vec![
                entry("u1", "i1", "f1", 1, false, false),
                entry("u1", "i2", "f1", 2, true, false),
                entry("u1", "i3", "f1", 3, false, true),
                entry("u1", "i4", "f2", 4, false, false),
                entry("u2", "i1", "f1", 1, false, false),
            ];
            EntryStore::save_all(tx, &mut entries)
        })
        .unwrap();
    }

    fn items(entries: &[Entry]) -> Vec<&str> {
        entries.iter().map(|e| e.item_id.as_str()).collect()
    }

    #[test]
    fn test_natural_key() {
        let (db, _temp) = create_test_db();
        seed(&db);
        db.select(|tx| {
            let e = EntryStore::get(tx, "u1", "i2")?.unwrap();
            assert!(e.read);
            assert!(EntryStore::get(tx, "u2", "i2")?.is_none());
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_query_orders_by_updated() {
        let (db, _temp) = create_test_db();
        seed(&db);
        db.select(|tx| {
            assert_eq!(items(&EntryStore::query(tx, "u1").get()?), vec!["i1", "i2", "i3", "i4"]);
            assert_eq!(
                items(&EntryStore::query(tx, "u1").reverse().limit(2).get()?),
                vec!["i4", "i3"]
            );
            assert_eq!(EntryStore::query(tx, "u1").count()?, 4);
            assert_eq!(EntryStore::query(tx, "u2").count()?, 1);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_query_min_inclusive_max_exclusive() {
        let (db, _temp) = create_test_db();
        seed(&db);
        db.select(|tx| {
            let got = EntryStore::query(tx, "u1").min(at(2)).max(at(4)).get()?;
            assert_eq!(items(&got), vec!["i2", "i3"]);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_query_filters() {
        let (db, _temp) = create_test_db();
        seed(&db);
        db.select(|tx| {
            assert_eq!(items(&EntryStore::query(tx, "u1").unread()?), vec!["i1", "i3", "i4"]);
            assert_eq!(items(&EntryStore::query(tx, "u1").starred()?), vec!["i3"]);
            assert_eq!(
                items(&EntryStore::query(tx, "u1").feed("f1").unread()?),
                vec!["i1", "i3"]
            );
            assert_eq!(EntryStore::query(tx, "u1").feed("f2").count()?, 1);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_marking_read_moves_between_listings() {
        let (db, _temp) = create_test_db();
        seed(&db);
        db.update(|tx| {
            let mut e = EntryStore::get(tx, "u1", "i1")?.unwrap();
            e.read = true;
            EntryStore::save(tx, &mut e)
        })
        .unwrap();

        db.select(|tx| {
            assert_eq!(items(&EntryStore::query(tx, "u1").unread()?), vec!["i3", "i4"]);
            assert_eq!(EntryStore::query(tx, "u1").count()?, 4);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_entries_without_time_listed_unless_min_set() {
        let (db, _temp) = create_test_db();
        db.update(|tx| EntryStore::save(tx, &mut EntryStore::new("u1", "i9", "f1")))
            .unwrap();
        db.select(|tx| {
            assert_eq!(EntryStore::query(tx, "u1").count()?, 1);
            assert_eq!(EntryStore::query(tx, "u1").min(at(0)).count()?, 0);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_range_by_item_id() {
        let (db, _temp) = create_test_db();
        seed(&db);
        db.select(|tx| {
            assert_eq!(items(&EntryStore::range(tx, "u1", None, None)?), vec!["i1", "i2", "i3", "i4"]);
            assert_eq!(items(&EntryStore::range(tx, "u1", Some("i2"), Some("i4"))?), vec!["i2", "i3"]);
            assert_eq!(items(&EntryStore::range(tx, "u2", Some("i2"), None)?), Vec::<&str>::new());
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_add_items_fans_out_to_subscribers() {
        let (db, _temp) = create_test_db();
        db.update(|tx| {
            let mut plain = SubscriptionStore::new("u1", "f1");
            SubscriptionStore::save(tx, &mut plain)?;
            let mut auto = SubscriptionStore::new("u2", "f1");
            auto.auto_read = true;
            auto.auto_star = true;
            SubscriptionStore::save(tx, &mut auto)
        })
        .unwrap();

        let mut item = Item::new("f1", "g1");
        item.id = "0000000007".to_string();
        item.updated = Some(at(5));
        let other = Item {
            id: "0000000008".to_string(),
            ..Item::new("f9", "g2")
        };

        let created = db
            .update(|tx| EntryStore::add_items(tx, &[item.clone(), other.clone()]))
            .unwrap();
        assert_eq!(created.len(), 2);

        db.select(|tx| {
            let e1 = EntryStore::get(tx, "u1", "0000000007")?.unwrap();
            assert!(!e1.read && !e1.star);
            assert_eq!(e1.updated, Some(at(5)));
            let e2 = EntryStore::get(tx, "u2", "0000000007")?.unwrap();
            assert!(e2.read && e2.star);
            Ok(())
        })
        .unwrap();

        // re-adding keeps user state
        db.update(|tx| {
            let mut e = EntryStore::get(tx, "u1", "0000000007")?.unwrap();
            e.read = true;
            EntryStore::save(tx, &mut e)
        })
        .unwrap();
        let created = db.update(|tx| EntryStore::add_items(tx, &[item.clone()])).unwrap();
        assert!(created.is_empty());
        let e1 = db
            .select(|tx| EntryStore::get(tx, "u1", "0000000007"))
            .unwrap()
            .unwrap();
        assert!(e1.read);
    }
}
