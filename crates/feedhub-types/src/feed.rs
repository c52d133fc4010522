//! Feed descriptor.
//!
//! A feed is a polled syndication source shared by all subscribers.
//! The scheduler orders feeds by `next_fetch`.

use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// A polled feed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Feed {
    /// Sequence-minted primary key (empty until first save)
    pub id: String,

    /// Feed URL, unique ignoring case
    pub url: String,

    /// Homepage of the site publishing the feed
    pub site_url: String,

    /// ETag header from the last successful fetch
    pub etag: String,

    /// Last-Modified header from the last successful fetch
    pub last_modified: Option<DateTime<Utc>>,

    /// Time the feed content last changed
    pub last_updated: Option<DateTime<Utc>>,

    /// Time the feed is next due to be fetched
    pub next_fetch: Option<DateTime<Utc>>,

    /// Free-form notes
    pub notes: String,

    /// Feed title
    pub title: String,

    /// Result code of the last fetch
    pub status: String,

    /// Message accompanying `status`
    pub status_message: String,

    /// Time `status` last changed
    pub status_since: Option<DateTime<Utc>>,
}

impl Feed {
    /// Create a new feed due for fetching now.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            next_fetch: Some(Utc::now().trunc_subsecs(0)),
            ..Default::default()
        }
    }

    /// Bump `next_fetch` after a fetch that found content last changed at `last_updated`.
    ///
    /// Feeds updated within the last two hours are polled in 15 minute steps,
    /// everything else hourly. The result is at least five minutes past `now`.
    pub fn update_fetch_time(&mut self, last_updated: DateTime<Utc>, now: DateTime<Utc>) {
        let interval = if now - last_updated < Duration::hours(2) {
            Duration::minutes(15)
        } else {
            Duration::hours(1)
        };

        let min = now + Duration::minutes(5);
        let mut next = last_updated;
        if next < min {
            // whole steps needed to reach min, rounded up
            let steps = ((min - next).num_seconds() + interval.num_seconds() - 1)
                / interval.num_seconds();
            next += interval * steps as i32;
        }
        self.next_fetch = Some(next.trunc_subsecs(0));
    }

    /// Set `next_fetch` to `interval` past `now`.
    pub fn adjust_fetch_time(&mut self, interval: Duration, now: DateTime<Utc>) {
        self.next_fetch = Some((now + interval).trunc_subsecs(0));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, h, m, 0).unwrap()
    }

    #[test]
    fn test_new_feed_is_due() {
        let feed = Feed::new("http://example.com/feed");
        assert!(feed.id.is_empty());
        assert!(feed.next_fetch.unwrap() <= Utc::now());
    }

    #[test]
    fn test_update_fetch_time_recent_feed() {
        let mut feed = Feed::new("http://example.com/feed");
        feed.update_fetch_time(at(11, 0), at(12, 0));
        // 11:00 + 5 * 15m = 12:15 is the first step past 12:05
        assert_eq!(feed.next_fetch, Some(at(12, 15)));
    }

    #[test]
    fn test_update_fetch_time_stale_feed() {
        let mut feed = Feed::new("http://example.com/feed");
        feed.update_fetch_time(at(1, 30), at(12, 0));
        assert_eq!(feed.next_fetch, Some(at(12, 30)));
    }

    #[test]
    fn test_update_fetch_time_future_last_updated() {
        let mut feed = Feed::new("http://example.com/feed");
        feed.update_fetch_time(at(13, 0), at(12, 0));
        assert_eq!(feed.next_fetch, Some(at(13, 0)));
    }

    #[test]
    fn test_adjust_fetch_time() {
        let mut feed = Feed::new("http://example.com/feed");
        feed.adjust_fetch_time(Duration::minutes(30), at(12, 0));
        assert_eq!(feed.next_fetch, Some(at(12, 30)));
    }

    #[test]
    fn test_decode_ignores_unknown_and_defaults_missing() {
        let feed: Feed =
            serde_json::from_str(r#"{"id":"0000000001","url":"http://x/","legacy":42}"#).unwrap();
        assert_eq!(feed.url, "http://x/");
        assert!(feed.title.is_empty());
        assert!(feed.next_fetch.is_none());
    }

    #[test]
    fn test_json_round_trip_keeps_every_field() {
        let stamp = Utc.timestamp_opt(1_709_294_400, 123_456_789).unwrap();
        let feed = Feed {
            id: "0000000003".to_string(),
            url: "http://example.com/feed".to_string(),
            site_url: "http://example.com/".to_string(),
            etag: "\"abc\"".to_string(),
            last_modified: Some(stamp),
            last_updated: Some(stamp - Duration::hours(2)),
            next_fetch: Some(stamp + Duration::minutes(15)),
            notes: "weekly".to_string(),
            title: "Example".to_string(),
            status: "error".to_string(),
            status_message: "timeout".to_string(),
            status_since: Some(stamp),
        };

        let json = serde_json::to_vec(&feed).unwrap();
        let decoded: Feed = serde_json::from_slice(&json).unwrap();
        assert_eq!(decoded, feed);
        assert_eq!(decoded.last_modified.unwrap().timestamp_subsec_nanos(), 123_456_789);
    }
}
