//! Central configuration for the portal_session crate
//!
//! Every value is read once from the environment and falls back to the
//! defaults the portal ships with.

use std::sync::LazyLock;
use std::time::Duration;

use crate::inactivity::InactivityConfig;

/// Absolute lifetime of a session record in hours. Default: 24
pub static SESSION_DURATION_HOURS: LazyLock<i64> = LazyLock::new(|| {
    std::env::var("SESSION_DURATION_HOURS")
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|hours: &i64| *hours > 0)
        .unwrap_or(24)
});

/// Idle time before an authenticated user is logged out. Default: 30 minutes
pub static INACTIVITY_TIMEOUT_SECS: LazyLock<u64> = LazyLock::new(|| {
    std::env::var("INACTIVITY_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(30 * 60)
});

/// How long before the inactivity logout the warning is shown. Default: 5 minutes
pub static INACTIVITY_WARNING_SECS: LazyLock<u64> = LazyLock::new(|| {
    std::env::var("INACTIVITY_WARNING_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(5 * 60)
});

/// Granularity of the inactivity countdown. Default: 1 second
pub static INACTIVITY_TICK_MILLIS: LazyLock<u64> = LazyLock::new(|| {
    std::env::var("INACTIVITY_TICK_MILLIS")
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|ms: &u64| *ms > 0)
        .unwrap_or(1000)
});

/// Upper bound for `wait_for_auth_ready`. Default: 2 seconds
pub static AUTH_READY_TIMEOUT_MILLIS: LazyLock<u64> = LazyLock::new(|| {
    std::env::var("AUTH_READY_TIMEOUT_MILLIS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(2000)
});

/// Storage poll interval used by `wait_for_auth_ready`. Default: 100 milliseconds
pub static AUTH_READY_POLL_MILLIS: LazyLock<u64> = LazyLock::new(|| {
    std::env::var("AUTH_READY_POLL_MILLIS")
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|ms: &u64| *ms > 0)
        .unwrap_or(100)
});

/// Login endpoint of the portal backend
pub static AUTH_LOGIN_URL: LazyLock<String> = LazyLock::new(|| {
    std::env::var("AUTH_LOGIN_URL")
        .unwrap_or_else(|_| "http://localhost:8000/api/auth/login".to_string())
});

/// Storage key holding the serialized session record
pub static SESSION_RECORD_KEY: LazyLock<String> = LazyLock::new(|| {
    std::env::var("SESSION_RECORD_KEY").unwrap_or_else(|_| "portal_session".to_string())
});

/// Key written by older portal releases; only read by the migration step
pub static LEGACY_SESSION_KEY: LazyLock<String> = LazyLock::new(|| {
    std::env::var("LEGACY_SESSION_KEY").unwrap_or_else(|_| "auth".to_string())
});

/// Storage key holding the role the user last selected
pub static ACTIVE_ROLE_KEY: LazyLock<String> = LazyLock::new(|| {
    std::env::var("ACTIVE_ROLE_KEY").unwrap_or_else(|_| "active_role".to_string())
});

/// Tunables of a [`SessionManager`](crate::SessionManager).
///
/// `Default` gathers the environment-backed statics above; tests build the
/// struct directly with short durations.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub session_duration: chrono::Duration,
    pub inactivity: InactivityConfig,
    pub auth_ready_timeout: Duration,
    pub auth_ready_poll_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_duration: chrono::Duration::hours(*SESSION_DURATION_HOURS),
            inactivity: InactivityConfig::default(),
            auth_ready_timeout: Duration::from_millis(*AUTH_READY_TIMEOUT_MILLIS),
            auth_ready_poll_interval: Duration::from_millis(*AUTH_READY_POLL_MILLIS),
        }
    }
}

impl Default for InactivityConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(*INACTIVITY_TIMEOUT_SECS),
            warning: Duration::from_secs(*INACTIVITY_WARNING_SECS),
            tick: Duration::from_millis(*INACTIVITY_TICK_MILLIS),
        }
    }
}
