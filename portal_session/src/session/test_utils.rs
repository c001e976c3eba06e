//! Shared fixtures for session tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::config::SessionConfig;
use crate::endpoint::{AuthEndpoint, EndpointError, LoginResponse};
use crate::inactivity::InactivityConfig;
use crate::session::types::SessionUser;
use crate::storage::{InMemoryCredentialStore, SharedCredentialStore, shared};

pub(crate) fn test_store() -> SharedCredentialStore {
    shared(InMemoryCredentialStore::new())
}

/// Single-role member.
pub(crate) fn test_user() -> SessionUser {
    serde_json::from_value(json!({
        "id": "member-1",
        "name": "Test Member",
        "role": "member",
        "section": {"id": 1, "name": "Central"}
    }))
    .unwrap()
}

/// Member who also holds a family role.
pub(crate) fn family_user() -> SessionUser {
    serde_json::from_value(json!({
        "id": 2,
        "name": "Family Member",
        "role": "member",
        "roles": ["member", "treasurer", "family"]
    }))
    .unwrap()
}

/// Current time truncated to what the stored record keeps.
pub(crate) fn now_millis() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(Utc::now().timestamp_millis()).unwrap()
}

/// Writes `value` without any serialization.
pub(crate) async fn put_raw(store: &SharedCredentialStore, key: &str, value: &str) {
    store.lock().await.set(key, value.to_string()).await.unwrap();
}

pub(crate) async fn raw(store: &SharedCredentialStore, key: &str) -> Option<String> {
    store.lock().await.get(key).await.unwrap()
}

/// Short timings so paused-clock tests stay readable.
pub(crate) fn test_config() -> SessionConfig {
    SessionConfig {
        session_duration: chrono::Duration::hours(24),
        inactivity: InactivityConfig {
            timeout: Duration::from_secs(10),
            warning: Duration::from_secs(3),
            tick: Duration::from_secs(1),
        },
        auth_ready_timeout: Duration::from_secs(2),
        auth_ready_poll_interval: Duration::from_millis(100),
    }
}

/// In-process stand-in for the login endpoint.
#[derive(Clone, Default)]
pub(crate) struct MockEndpoint {
    accounts: HashMap<String, (String, SessionUser)>,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl MockEndpoint {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_account(mut self, email: &str, password: &str, user: SessionUser) -> Self {
        self.accounts
            .insert(email.to_string(), (password.to_string(), user));
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthEndpoint for MockEndpoint {
    async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<LoginResponse, EndpointError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match self.accounts.get(email) {
            Some((expected, user)) if expected == password => Ok(LoginResponse {
                token: format!("token-{call}"),
                user: user.clone(),
            }),
            _ => Err(EndpointError::InvalidCredentials),
        }
    }
}
