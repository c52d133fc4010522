//! User subscriptions to feeds.
//!
//! Group membership is denormalised into `group_ids`; nothing enforces
//! that the referenced groups exist.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A user's subscription to a feed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Subscription {
    pub user_id: String,
    pub feed_id: String,

    /// Groups (folders) the subscription is filed under
    pub group_ids: Vec<String>,

    /// Time the user subscribed
    pub added: Option<DateTime<Utc>>,

    /// User override for the feed title
    pub title: String,

    pub notes: String,

    /// New entries are created already read
    pub auto_read: bool,

    /// New entries are created already starred
    pub auto_star: bool,
}

impl Subscription {
    pub fn new(user_id: impl Into<String>, feed_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            feed_id: feed_id.into(),
            ..Default::default()
        }
    }

    pub fn add_group(&mut self, group_id: &str) {
        if !self.has_group(group_id) {
            self.group_ids.push(group_id.to_string());
        }
    }

    pub fn remove_group(&mut self, group_id: &str) {
        self.group_ids.retain(|id| id != group_id);
    }

    pub fn has_group(&self, group_id: &str) -> bool {
        self.group_ids.iter().any(|id| id == group_id)
    }
}

/// Index subscriptions by feed id.
pub fn group_by_feed(subscriptions: &[Subscription]) -> BTreeMap<&str, &Subscription> {
    subscriptions
        .iter()
        .map(|s| (s.feed_id.as_str(), s))
        .collect()
}

/// Subscriptions filed under `group_id`.
pub fn with_group<'a>(subscriptions: &'a [Subscription], group_id: &str) -> Vec<&'a Subscription> {
    subscriptions.iter().filter(|s| s.has_group(group_id)).collect()
}

/// Sort oldest subscription first. Subscriptions without `added` sort first.
pub fn sort_by_added(subscriptions: &mut [Subscription]) {
    subscriptions.sort_by(|a, b| a.added.cmp(&b.added));
}
