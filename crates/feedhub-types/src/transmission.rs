//! Fetch log.
//!
//! One transmission is recorded per HTTP attempt against a feed, whether
//! or not it produced items.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Outcome of a fetch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchResult {
    /// Feed fetched and parsed
    #[serde(rename = "OK")]
    Ok,
    /// Feed moved; message holds old URL -> new URL
    #[serde(rename = "MV")]
    Redirect,
    /// Request failed on our side; message holds the error text
    #[serde(rename = "EC")]
    ClientError,
    /// Server answered with an error status
    #[serde(rename = "ES")]
    ServerError,
    /// Body could not be parsed as a feed
    #[serde(rename = "FP")]
    FeedError,
}

impl FetchResult {
    pub fn code(&self) -> &'static str {
        match self {
            FetchResult::Ok => "OK",
            FetchResult::Redirect => "MV",
            FetchResult::ClientError => "EC",
            FetchResult::ServerError => "ES",
            FetchResult::FeedError => "FP",
        }
    }
}

impl fmt::Display for FetchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A recorded fetch attempt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transmission {
    /// Sequence-minted primary key (empty until first save)
    pub id: String,

    pub feed_id: String,

    /// Wall time spent on the request
    pub duration: Duration,

    pub result: Option<FetchResult>,
    pub result_message: String,

    /// When the request started
    pub start_time: Option<DateTime<Utc>>,

    /// URL actually requested
    pub url: String,

    // Response metadata
    pub content_length: u64,
    pub content_type: String,
    pub etag: String,
    pub last_modified: Option<DateTime<Utc>>,
    pub status_code: u16,
    pub uses_gzip: bool,

    // Parsed feed metadata
    pub flavor: String,
    pub generator: String,
    pub title: String,
    pub last_updated: Option<DateTime<Utc>>,
    pub item_count: u32,
    pub new_items: u32,
}

impl Transmission {
    pub fn new(feed_id: impl Into<String>) -> Self {
        Self {
            feed_id: feed_id.into(),
            ..Default::default()
        }
    }
}
