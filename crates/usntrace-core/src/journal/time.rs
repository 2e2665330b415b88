/// FILETIME conversion helpers
use chrono::{DateTime, Utc};

/// Ticks between 1601-01-01 and 1970-01-01
pub const FILETIME_UNIX_EPOCH_OFFSET: i64 = 116_444_736_000_000_000;

pub const TICKS_PER_SECOND: i64 = 10_000_000;

pub const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Convert 100ns ticks since 1601 to a UTC datetime
pub fn filetime_to_datetime(ticks: i64) -> Option<DateTime<Utc>> {
    let since_unix = ticks.checked_sub(FILETIME_UNIX_EPOCH_OFFSET)?;
    let secs = since_unix.div_euclid(TICKS_PER_SECOND);
    let nanos = (since_unix.rem_euclid(TICKS_PER_SECOND) * 100) as u32;
    DateTime::from_timestamp(secs, nanos)
}

pub fn datetime_to_filetime(time: DateTime<Utc>) -> i64 {
    time.timestamp() * TICKS_PER_SECOND
        + i64::from(time.timestamp_subsec_nanos() / 100)
        + FILETIME_UNIX_EPOCH_OFFSET
}

/// Display string for a tick count; empty when out of range
pub fn format_filetime(ticks: i64) -> String {
    filetime_to_datetime(ticks)
        .map(|time| time.format(DISPLAY_FORMAT).to_string())
        .unwrap_or_default()
}
