//! Per-user subscription groups.

use serde::{Deserialize, Serialize};

/// A named folder of subscriptions. Names are unique per user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Group {
    pub id: String,
    pub user_id: String,
    pub name: String,
}

impl Group {
    pub fn new(user_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            name: name.into(),
            ..Default::default()
        }
    }
}
