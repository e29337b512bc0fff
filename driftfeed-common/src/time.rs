//! Timestamp utilities

use chrono::{DateTime, Duration, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Whether `published_at` is within `hours` of `at` (recency bonus window)
pub fn within_hours(published_at: DateTime<Utc>, at: DateTime<Utc>, hours: i64) -> bool {
    at.signed_duration_since(published_at) < Duration::hours(hours)
}

/// Start of the trailing interaction window ending at `at`
pub fn window_start(at: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    at - Duration::days(days)
}
