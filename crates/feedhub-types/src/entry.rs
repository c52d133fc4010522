//! Per-user item state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Read/star state of one item for one user.
///
/// Keyed naturally by `(user_id, item_id)`; `feed_id` is carried so the
/// per-feed indexes can be derived without loading the item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Entry {
    pub user_id: String,
    pub item_id: String,
    pub feed_id: String,

    /// Ordering time, normally the item's updated time
    pub updated: Option<DateTime<Utc>>,

    pub read: bool,
    pub star: bool,
}

impl Entry {
    pub fn new(user_id: impl Into<String>, item_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            item_id: item_id.into(),
            ..Default::default()
        }
    }
}
