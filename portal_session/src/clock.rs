//! Session expiry arithmetic.

use chrono::{DateTime, Duration, Utc};

use crate::config::SESSION_DURATION_HOURS;

/// Absolute session lifetime configured for this process.
pub fn session_duration() -> Duration {
    Duration::hours(*SESSION_DURATION_HOURS)
}

/// Expiry instant of a session created at `now`, capped at the latest
/// representable instant.
pub fn compute_expiry(now: DateTime<Utc>, duration: Duration) -> DateTime<Utc> {
    now.checked_add_signed(duration)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// A session is still valid at the exact expiry instant.
pub fn is_expired(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now > expires_at
}
