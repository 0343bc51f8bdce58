//! Timestamp helpers.
//!
//! Every timestamp this crate writes is an RFC3339 UTC string from
//! `Utc::now().to_rfc3339()`. Recency cutoffs are computed here in Rust and
//! compared lexicographically in SQL, which stays sound only while no other
//! format (e.g. SQLite's space-separated `datetime('now')`) is ever mixed in.

use chrono::{DateTime, Duration, Utc};

/// Current instant as an RFC3339 UTC string.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

/// RFC3339 UTC string `hours` before now. Recency-window cutoff for
/// peek/has_recent.
pub fn rfc3339_hours_ago(hours: i64) -> String {
    (Utc::now() - Duration::hours(hours)).to_rfc3339()
}

/// RFC3339 UTC string `days` before now. Retention cutoff for housekeeping.
pub fn rfc3339_days_ago(days: i64) -> String {
    (Utc::now() - Duration::days(days)).to_rfc3339()
}

/// Parse an RFC3339 timestamp into UTC. None on malformed input.
pub fn parse_rfc3339(ts: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(ts)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
