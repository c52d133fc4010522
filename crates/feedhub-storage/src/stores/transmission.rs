//! Transmission persistence.
//!
//! Indexes:
//! - `Time`: start_time, id
//! - `FeedTime`: feed_id, start_time, id

use chrono::{DateTime, Duration, Utc};

use feedhub_types::Transmission;

use crate::entity::{self, Entity, EntitySchema, IndexDef, IndexKeys, KeyKind};
use crate::error::StorageError;
use crate::keys::{CompositeKey, EndBound, KeyRange};
use crate::tx::Transaction;

pub const INDEX_TIME: &str = "Time";
pub const INDEX_FEED_TIME: &str = "FeedTime";

impl Entity for Transmission {
    const SCHEMA: EntitySchema = EntitySchema {
        name: "Transmission",
        indexes: &[IndexDef::multi(INDEX_FEED_TIME), IndexDef::multi(INDEX_TIME)],
        key: KeyKind::Sequence,
    };

    fn primary_key(&self) -> String {
        self.id.clone()
    }

    fn assign_key(&mut self, key: String) {
        self.id = key;
    }

    fn index_keys(&self) -> IndexKeys {
        let start = self.start_time.as_ref();
        let mut keys = IndexKeys::new();
        keys.insert(
            INDEX_TIME,
            CompositeKey::new().maybe_time(start).text(&self.id).to_bytes(),
        );
        keys.insert(
            INDEX_FEED_TIME,
            CompositeKey::new()
                .text(&self.feed_id)
                .maybe_time(start)
                .text(&self.id)
                .to_bytes(),
        );
        keys
    }

    fn missing_field(&self) -> Option<&'static str> {
        self.feed_id.is_empty().then_some("feed_id")
    }
}

/// `end - since`, saturating at the earliest representable time.
fn window_start(end: DateTime<Utc>, since: Duration) -> DateTime<Utc> {
    end.checked_sub_signed(since).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

pub struct TransmissionStore;

impl TransmissionStore {
    pub fn new(feed_id: &str) -> Transmission {
        Transmission::new(feed_id)
    }

    pub fn get(tx: &Transaction<'_>, id: &str) -> Result<Option<Transmission>, StorageError> {
        entity::get(tx, id)
    }

    /// A feed's transmissions started within `since` before `now`, newest first.
    ///
    /// Both ends are inclusive at second resolution.
    pub fn get_for_feed(
        tx: &Transaction<'_>,
        feed_id: &str,
        since: Duration,
        now: DateTime<Utc>,
    ) -> Result<Vec<Transmission>, StorageError> {
        let feed = CompositeKey::new().text(feed_id);
        let range = KeyRange::between(
            &feed.clone().time(&window_start(now, since)),
            &feed.time(&now),
            EndBound::Inclusive,
        );
        entity::scan_index(tx, INDEX_FEED_TIME, &range, true, None)
    }

    /// All transmissions started within `since` before `max_time`, newest first.
    pub fn get_range(
        tx: &Transaction<'_>,
        max_time: DateTime<Utc>,
        since: Duration,
    ) -> Result<Vec<Transmission>, StorageError> {
        let range = KeyRange::between(
            &CompositeKey::new().time(&window_start(max_time, since)),
            &CompositeKey::new().time(&max_time),
            EndBound::Inclusive,
        );
        entity::scan_index(tx, INDEX_TIME, &range, true, None)
    }

    /// The most recently created transmission.
    pub fn get_last(tx: &Transaction<'_>) -> Result<Option<Transmission>, StorageError> {
        let mut cursor = entity::data_bucket::<Transmission>(tx)?.cursor();
        match cursor.last()? {
            Some((key, bytes)) => Ok(Some(Transmission::decode(&key, &bytes)?)),
            None => Ok(None),
        }
    }

    pub fn save(tx: &Transaction<'_>, transmission: &mut Transmission) -> Result<(), StorageError> {
        entity::save(tx, transmission)
    }

    pub fn delete(tx: &Transaction<'_>, id: &str) -> Result<bool, StorageError> {
        entity::delete::<Transmission>(tx, id)
    }
}
