/// Utility functions for timestamps, rounding and formatting
use time::macros::{datetime, format_description};
use time::{Duration, OffsetDateTime};

/// Reference instant the backend counts timestamps from
pub const CUSTOM_EPOCH: OffsetDateTime = datetime!(2000-01-01 0:00 UTC);

const NANOS_PER_SECOND: i128 = 1_000_000_000;

/// Convert a wall-clock instant to whole seconds since the custom epoch
///
/// Sub-second parts are floored, so an instant half a second before the
/// epoch maps to -1 rather than 0.
pub fn to_custom_timestamp(dt: OffsetDateTime) -> i64 {
    let nanos = dt.unix_timestamp_nanos() - CUSTOM_EPOCH.unix_timestamp_nanos();
    nanos.div_euclid(NANOS_PER_SECOND) as i64
}

/// Inverse of [`to_custom_timestamp`] for whole seconds
pub fn from_custom_timestamp(seconds: i64) -> OffsetDateTime {
    CUSTOM_EPOCH + Duration::seconds(seconds)
}

/// Round to a fixed number of decimal places
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Format a timestamp for human-readable logging
///
/// Converts an OffsetDateTime to DD.MM.YYYY - HH:MM:SS format
/// Falls back to default string representation if formatting fails.
pub fn format_datetime(dt: &OffsetDateTime) -> String {
    let format = format_description!("[day].[month].[year] - [hour]:[minute]:[second]");
    dt.format(format).unwrap_or_else(|_| dt.to_string())
}

/// Convert a time::Duration to seconds as u64
pub fn duration_to_seconds(duration: time::Duration) -> u64 {
    duration.whole_seconds().max(0) as u64
}
