//! # Time Helpers
//!
//! Challenge tokens and the replay store reason in unix seconds. Every
//! operation that depends on the current time also has a variant that takes
//! `now` explicitly, so expiry boundaries are testable without a clock.

use chrono::{DateTime, TimeZone, Utc};

/// Current UTC time as unix seconds.
pub fn unix_now() -> i64 {
    Utc::now().timestamp()
}

/// Convert unix seconds to a UTC datetime. Out-of-range values clamp to the
/// unix epoch.
pub fn from_unix(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}
