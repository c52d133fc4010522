//! User accounts.
//!
//! Only the stored hashes live here. Producing and checking them is the
//! job of the authentication layer.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct User {
    pub id: String,

    /// Login name, unique ignoring case
    pub username: String,

    /// Opaque password hash
    pub password_hash: String,

    /// Fever API key; unique when set
    pub fever_hash: String,
}

impl User {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ..Default::default()
        }
    }
}
