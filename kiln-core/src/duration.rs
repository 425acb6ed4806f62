//! Millisecond helpers for durations that cross the reporting boundary.

use std::time::Duration;

use serde::{Serialize, Serializer};

/// A duration as fractional milliseconds.
pub fn as_millis(duration: Duration) -> f64 {
    duration.as_nanos() as f64 / 1_000_000.0
}

/// Format a duration the way timing reports show it, e.g. `12.50ms`.
pub fn format_millis(duration: Duration) -> String {
    format!("{:.2}ms", as_millis(duration))
}

/// Serialize a Duration as fractional milliseconds.
pub fn serialize_duration_ms<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    as_millis(*duration).serialize(serializer)
}

/// Serialize an Option<Duration> as Option<fractional milliseconds>.
pub fn serialize_option_duration_ms<S>(
    duration: &Option<Duration>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    duration.map(as_millis).serialize(serializer)
}
