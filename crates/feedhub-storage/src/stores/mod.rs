//! Typed stores, one per entity.
//!
//! Stores are stateless; every call takes the transaction it runs in.

pub mod config;
pub mod entry;
pub mod feed;
pub mod group;
pub mod item;
pub mod subscription;
pub mod transmission;
pub mod user;

pub use config::ConfigStore;
pub use entry::{EntryQuery, EntryStore};
pub use feed::FeedStore;
pub use group::GroupStore;
pub use item::ItemStore;
pub use subscription::SubscriptionStore;
pub use transmission::TransmissionStore;
pub use user::UserStore;
