//! Timestamp parsing for the shapes `created_at` takes across the corpus.
//! Everything is normalized to unix milliseconds.

use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

/// Parse a timestamp string into unix milliseconds.
///
/// Accepted forms:
/// - Twitter API: `Wed Oct 10 20:19:24 +0000 2018`
/// - SQL datetime: `2018-10-10 20:19:24` (taken as UTC), optionally with fractional seconds
/// - RFC 3339: `2018-10-10T20:19:24Z`
/// - bare integers, read as milliseconds (the `timestamp_ms` field)
pub fn parse_timestamp_ms(raw: &str) -> Option<i64> {
    let s = raw.trim();
    if s.is_empty() { return None; }

    if s.bytes().all(|b| b.is_ascii_digit()) {
        return s.parse::<i64>().ok();
    }

    let twitter = format_description!(
        "[weekday repr:short] [month repr:short] [day] [hour]:[minute]:[second] [offset_hour sign:mandatory][offset_minute] [year]"
    );
    if let Ok(dt) = OffsetDateTime::parse(s, twitter) {
        return Some(to_millis(dt));
    }

    let sql = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    if let Ok(dt) = PrimitiveDateTime::parse(s, sql) {
        return Some(to_millis(dt.assume_utc()));
    }
    let sql_frac = format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]");
    if let Ok(dt) = PrimitiveDateTime::parse(s, sql_frac) {
        return Some(to_millis(dt.assume_utc()));
    }

    OffsetDateTime::parse(s, &Rfc3339).ok().map(to_millis)
}

#[inline]
fn to_millis(dt: OffsetDateTime) -> i64 {
    (dt.unix_timestamp_nanos() / 1_000_000) as i64
}

/// Render unix milliseconds as RFC 3339 (UTC).
pub fn format_millis_rfc3339(ms: i64) -> Option<String> {
    let dt = OffsetDateTime::from_unix_timestamp_nanos(ms as i128 * 1_000_000).ok()?;
    dt.format(&Rfc3339).ok()
}

/// Render unix milliseconds in the SQL datetime shape the store uses.
/// Sub-second precision is written only when present.
pub fn format_millis_sql(ms: i64) -> Option<String> {
    let dt = OffsetDateTime::from_unix_timestamp_nanos(ms as i128 * 1_000_000).ok()?;
    if ms.rem_euclid(1000) == 0 {
        dt.format(format_description!("[year]-[month]-[day] [hour]:[minute]:[second]")).ok()
    } else {
        dt.format(format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]")).ok()
    }
}
