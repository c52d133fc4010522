//! # feedhub-types
//!
//! Domain records shared by the feedhub crates.
//!
//! - Feeds, items and transmissions: what the fetcher polls and logs
//! - Users, groups, subscriptions and entries: per-user state
//! - Config: the store's persistent configuration record
//! - Settings: layered process configuration
//!
//! Records are plain data. Persistence lives in `feedhub-storage`.
//!
//! ## Usage
//!
//! ```rust
//! use feedhub_types::Feed;
//!
//! let feed = Feed::new("https://example.com/feed.xml");
//! assert!(feed.id.is_empty());
//! ```

pub mod config;
pub mod entry;
pub mod error;
pub mod feed;
pub mod group;
pub mod item;
pub mod store_config;
pub mod subscription;
pub mod transmission;
pub mod user;

pub use config::{Compression, Settings, StorageSettings};
pub use entry::Entry;
pub use error::TypesError;
pub use feed::Feed;
pub use group::Group;
pub use item::Item;
pub use store_config::{Config, CONFIG_KEY};
pub use subscription::Subscription;
pub use transmission::{FetchResult, Transmission};
pub use user::User;
