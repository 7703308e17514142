//! Age thresholds given as human duration strings (`7d`, `36h`, `1w2d`).

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

/// Default `--older-then` threshold.
pub const DEFAULT_OLDER_THEN: &str = "7d";

/// A duration string that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid duration '{input}': {reason}")]
pub struct DurationError {
    /// The rejected input.
    pub input: String,
    /// Parser diagnostic.
    pub reason: String,
}

/// Parse a duration string such as `7d`, `5w` or `1w2d`.
///
/// # Errors
///
/// Returns [`DurationError`] for empty input, unknown units or overflow.
pub fn parse_duration(input: &str) -> Result<Duration, DurationError> {
    humantime::parse_duration(input.trim()).map_err(|err| DurationError {
        input: input.to_string(),
        reason: err.to_string(),
    })
}

/// Render a duration the way [`parse_duration`] reads it.
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    humantime::format_duration(duration).to_string()
}

/// The instant `age` before `now`.
///
/// Saturates at the earliest representable instant instead of overflowing.
#[must_use]
pub fn cutoff(now: DateTime<Utc>, age: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(age)
        .ok()
        .and_then(|delta| now.checked_sub_signed(delta))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
