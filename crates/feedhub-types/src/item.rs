//! Feed item record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A single article published by a feed.
///
/// Items are shared between users; per-user state lives in `Entry`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Item {
    /// Sequence-minted primary key (empty until first save)
    pub id: String,

    /// Owning feed
    pub feed_id: String,

    /// Publisher-assigned identifier, unique within the feed
    pub guid: String,

    pub title: String,
    pub author: String,
    pub content: String,
    pub url: String,

    /// Time the item was first seen
    pub created: Option<DateTime<Utc>>,

    /// Time the item was last changed by the publisher
    pub updated: Option<DateTime<Utc>>,
}

impl Item {
    pub fn new(feed_id: impl Into<String>, guid: impl Into<String>) -> Self {
        Self {
            feed_id: feed_id.into(),
            guid: guid.into(),
            ..Default::default()
        }
    }

    /// Hex SHA-256 fingerprint of the visible content.
    ///
    /// Fetchers compare hashes to decide whether a re-fetched item changed.
    pub fn hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.author.as_bytes());
        hasher.update(self.content.as_bytes());
        hasher.update(self.title.as_bytes());
        hasher.update(self.url.as_bytes());
        hex::encode(hasher.finalize())
    }
}
