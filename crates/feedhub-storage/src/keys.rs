//! Key encoding for records and index entries.
//!
//! Every field is encoded so that byte order matches value order:
//! - bool: `0` / `1`
//! - unsigned: zero-padded to 10 digits
//! - time: UTC `YYYYMMDDHHMMSSZ` (second resolution); absent time is empty
//! - text: as-is, or lower-cased for case-insensitive indexes
//!
//! Fields are joined with [`SEP`] (`0x00`). Text bytes `0x00` and `0x01` are
//! escaped as `0x01 0x01` and `0x01 0x02`, so a separator never appears inside
//! a field and escaped text still sorts like the original.

use chrono::{DateTime, Datelike, TimeZone, Utc};

use crate::error::StorageError;

/// Field separator
pub const SEP: u8 = 0x00;

const ESC: char = '\u{1}';

/// Width of an encoded unsigned integer
pub const UINT_WIDTH: usize = 10;

/// Largest value that fits in [`UINT_WIDTH`] digits
pub const UINT_MAX: u64 = 9_999_999_999;

const TIME_FORMAT: &str = "%Y%m%d%H%M%SZ";

/// Encodings of the earliest and latest representable times. `%Y` is only
/// four digits wide for years 0 through 9999.
const TIME_FLOOR: &str = "00000101000000Z";
const TIME_CEIL: &str = "99991231235959Z";

/// Encode a boolean field.
pub fn encode_bool(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}

/// Encode an unsigned integer as a fixed-width decimal.
pub fn encode_uint(value: u64) -> Result<String, StorageError> {
    if value > UINT_MAX {
        return Err(StorageError::Key(format!(
            "{} does not fit in {} digits",
            value, UINT_WIDTH
        )));
    }
    Ok(format!("{:010}", value))
}

/// Encode a timestamp, normalised to UTC.
///
/// Times before year 0 or after year 9999 are clamped to the nearest
/// representable second.
pub fn encode_time<Tz: TimeZone>(value: &DateTime<Tz>) -> String {
    let utc = value.with_timezone(&Utc);
    match utc.year() {
        year if year < 0 => TIME_FLOOR.to_string(),
        year if year > 9999 => TIME_CEIL.to_string(),
        _ => utc.format(TIME_FORMAT).to_string(),
    }
}

/// Escape a text field so it cannot contain the separator.
pub fn escape_text(value: &str) -> String {
    if !value.contains(['\0', ESC]) {
        return value.to_string();
    }
    let mut out = String::with_capacity(value.len() + 2);
    for c in value.chars() {
        match c {
            '\0' => {
                out.push(ESC);
                out.push(ESC);
            }
            ESC => {
                out.push(ESC);
                out.push('\u{2}');
            }
            _ => out.push(c),
        }
    }
    out
}

/// Builder for separator-joined keys.
///
/// ```
/// use feedhub_storage::keys::CompositeKey;
///
/// let key = CompositeKey::new().text("0000000001").flag(true).to_bytes();
/// assert_eq!(key, b"0000000001\x001".to_vec());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompositeKey {
    buf: String,
    fields: usize,
}

impl CompositeKey {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(mut self, encoded: &str) -> Self {
        if self.fields > 0 {
            self.buf.push(SEP as char);
        }
        self.buf.push_str(encoded);
        self.fields += 1;
        self
    }

    /// Append a text field verbatim.
    pub fn text(self, value: &str) -> Self {
        let escaped = escape_text(value);
        self.push(&escaped)
    }

    /// Append a text field, lower-cased.
    pub fn folded(self, value: &str) -> Self {
        let escaped = escape_text(&value.to_lowercase());
        self.push(&escaped)
    }

    pub fn flag(self, value: bool) -> Self {
        self.push(encode_bool(value))
    }

    pub fn uint(self, value: u64) -> Result<Self, StorageError> {
        let encoded = encode_uint(value)?;
        Ok(self.push(&encoded))
    }

    pub fn time<Tz: TimeZone>(self, value: &DateTime<Tz>) -> Self {
        let encoded = encode_time(value);
        self.push(&encoded)
    }

    /// Append an optional time; `None` encodes as the empty field and sorts first.
    pub fn maybe_time(self, value: Option<&DateTime<Utc>>) -> Self {
        match value {
            Some(t) => self.time(t),
            None => self.push(""),
        }
    }

    /// Number of fields appended so far
    pub fn len(&self) -> usize {
        self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields == 0
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }

    pub fn into_string(self) -> String {
        self.buf
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.buf.as_bytes().to_vec()
    }
}

/// Join already-encoded parts with the separator.
pub fn compose<S: AsRef<str>>(parts: &[S]) -> String {
    parts
        .iter()
        .fold(CompositeKey::new(), |key, part| key.text(part.as_ref()))
        .into_string()
}

/// Whether an upper range bound is included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndBound {
    Exclusive,
    Inclusive,
}

/// Half-open byte range `[start, end)`; no `end` means unbounded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRange {
    pub start: Vec<u8>,
    pub end: Option<Vec<u8>>,
}

impl KeyRange {
    /// Every key.
    pub fn all() -> Self {
        Self {
            start: Vec::new(),
            end: None,
        }
    }

    /// Every key whose leading fields equal `key`.
    ///
    /// An empty prefix covers the whole container.
    pub fn prefix(key: &CompositeKey) -> Self {
        if key.is_empty() {
            return Self::all();
        }
        let mut start = key.to_bytes();
        let mut end = start.clone();
        start.push(SEP);
        end.push(SEP + 1);
        Self {
            start,
            end: Some(end),
        }
    }

    /// Keys from `min` up to `max`.
    ///
    /// An inclusive bound also covers every key that extends `max` with
    /// further fields, which is what a caller means by "up to and including
    /// this value".
    pub fn between(min: &CompositeKey, max: &CompositeKey, bound: EndBound) -> Self {
        let mut end = max.to_bytes();
        if bound == EndBound::Inclusive {
            end.push(SEP + 1);
        }
        Self {
            start: min.to_bytes(),
            end: Some(end),
        }
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        key >= self.start.as_slice() && self.end.as_deref().map_or(true, |end| key < end)
    }

    /// True once `key` is at or beyond the upper bound.
    pub fn past_end(&self, key: &[u8]) -> bool {
        self.end.as_deref().is_some_and(|end| key >= end)
    }
}

/// Split a composite key into its (still escaped) fields.
pub fn split(key: &[u8]) -> Vec<&[u8]> {
    key.split(|b| *b == SEP).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    #[test]
    fn test_uint_fixed_width() {
        assert_eq!(encode_uint(0).unwrap(), "0000000000");
        assert_eq!(encode_uint(42).unwrap(), "0000000042");
        assert_eq!(encode_uint(UINT_MAX).unwrap(), "9999999999");
        assert!(encode_uint(UINT_MAX + 1).is_err());
    }

    #[test]
    fn test_uint_order_matches_bytes() {
        let a = encode_uint(9).unwrap();
        let b = encode_uint(10).unwrap();
        assert!(a.as_bytes() < b.as_bytes());
    }

    #[test]
    fn test_time_normalised_to_utc() {
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let local = offset.with_ymd_and_hms(2024, 1, 2, 5, 4, 5).unwrap();
        assert_eq!(encode_time(&local), "20240102030405Z");

        let utc = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(encode_time(&utc), encode_time(&local));
    }

    #[test]
    fn test_time_outside_four_digit_years_is_clamped() {
        let late = Utc.with_ymd_and_hms(10000, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(encode_time(&late), "99991231235959Z");
        assert_eq!(encode_time(&DateTime::<Utc>::MAX_UTC), "99991231235959Z");

        let early = Utc.with_ymd_and_hms(-1, 12, 31, 0, 0, 0).unwrap();
        assert_eq!(encode_time(&early), "00000101000000Z");
        assert_eq!(encode_time(&DateTime::<Utc>::MIN_UTC).len(), 15);

        let year_zero = Utc.with_ymd_and_hms(0, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(encode_time(&year_zero), "00000101000000Z");
    }

    #[test]
    fn test_time_order_matches_bytes() {
        let early = Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 59).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert!(encode_time(&early) < encode_time(&late));
    }

    #[test]
    fn test_bool() {
        assert_eq!(encode_bool(false), "0");
        assert_eq!(encode_bool(true), "1");
    }

    #[test]
    fn test_composite_key() {
        let key = CompositeKey::new()
            .text("0000000001")
            .flag(false)
            .folded("MiXeD");
        assert_eq!(key.len(), 3);
        assert_eq!(key.to_bytes(), b"0000000001\x000\x00mixed".to_vec());
        assert_eq!(split(&key.to_bytes()).len(), 3);
    }

    #[test]
    fn test_escape_keeps_separator_out_of_fields() {
        let key = CompositeKey::new().text("a\0b").text("c\u{1}");
        assert_eq!(split(&key.to_bytes()).len(), 2);
        assert_eq!(escape_text("plain"), "plain");
    }

    #[test]
    fn test_escape_preserves_order() {
        let values = ["", "\0", "\0z", "\u{1}", "a", "a\0", "a\u{1}", "ab"];
        for pair in values.windows(2) {
            assert!(
                escape_text(pair[0]) < escape_text(pair[1]),
                "{:?} should sort before {:?}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_compose() {
        assert_eq!(compose(&["u1", "i2"]), "u1\0i2");
        assert_eq!(compose::<&str>(&[]), "");
    }

    #[test]
    fn test_missing_time_sorts_first() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let none = CompositeKey::new().text("u").maybe_time(None).text("z");
        let some = CompositeKey::new().text("u").maybe_time(Some(&t)).text("a");
        assert!(none.to_bytes() < some.to_bytes());
    }

    #[test]
    fn test_prefix_range() {
        let prefix = CompositeKey::new().text("u1");
        let range = KeyRange::prefix(&prefix);

        assert!(range.contains(CompositeKey::new().text("u1").text("x").as_str().as_bytes()));
        assert!(!range.contains(b"u1"));
        assert!(!range.contains(CompositeKey::new().text("u10").text("x").as_str().as_bytes()));
        assert!(!range.contains(CompositeKey::new().text("u2").as_str().as_bytes()));
    }

    #[test]
    fn test_empty_prefix_is_everything() {
        let range = KeyRange::prefix(&CompositeKey::new());
        assert_eq!(range, KeyRange::all());
        assert!(range.contains(b""));
        assert!(!range.past_end(b"\xff\xff"));
    }

    #[test]
    fn test_between_bounds() {
        let min = CompositeKey::new().text("u").text("b");
        let max = CompositeKey::new().text("u").text("d");

        let exclusive = KeyRange::between(&min, &max, EndBound::Exclusive);
        let inclusive = KeyRange::between(&min, &max, EndBound::Inclusive);
        let at_max = CompositeKey::new().text("u").text("d").text("id");

        assert!(exclusive.contains(min.as_str().as_bytes()));
        assert!(exclusive.past_end(at_max.as_str().as_bytes()));
        assert!(inclusive.contains(at_max.as_str().as_bytes()));
        assert!(inclusive.past_end(CompositeKey::new().text("u").text("e").as_str().as_bytes()));
    }
}
