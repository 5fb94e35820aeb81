//! Whole-second time helpers
//!
//! Every boundary the engine computes is floored to whole seconds exactly
//! once, so repeated arithmetic over the same inputs cannot drift across
//! sub-second fractions.

use chrono::{DateTime, Duration, Utc};

/// Truncate a timestamp to whole seconds.
pub fn floor_seconds(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt - Duration::nanoseconds(i64::from(dt.timestamp_subsec_nanos()))
}

/// Whole seconds from `from` to `to`; negative when `to` is earlier.
pub fn elapsed_seconds(to: DateTime<Utc>, from: DateTime<Utc>) -> i64 {
    (to - from).num_seconds()
}

/// `start + seconds`, saturating at the representable time range. Periods
/// without an upper bound use `i64::MAX` seconds ("forever").
pub fn offset_from(start: DateTime<Utc>, seconds: i64) -> DateTime<Utc> {
    match Duration::try_seconds(seconds).and_then(|d| start.checked_add_signed(d)) {
        Some(dt) => dt,
        None if seconds >= 0 => DateTime::<Utc>::MAX_UTC,
        None => DateTime::<Utc>::MIN_UTC,
    }
}
