//! portal_session - Client-side session lifecycle for the membership portal
//!
//! This crate keeps track of who is signed in, enforces the absolute session
//! expiry, logs idle users out after a warning, and gives network code a way
//! to request a logout without holding a reference to the session manager.

mod api;
mod broadcast;
mod clock;
mod config;
mod endpoint;
mod inactivity;
mod session;
mod storage;

pub use api::{ApiClient, ApiError};
pub use broadcast::{LogoutBroadcast, SubscriptionId};
pub use clock::{compute_expiry, is_expired, session_duration};
pub use config::{
    ACTIVE_ROLE_KEY, AUTH_LOGIN_URL, AUTH_READY_POLL_MILLIS, AUTH_READY_TIMEOUT_MILLIS,
    INACTIVITY_TICK_MILLIS, INACTIVITY_TIMEOUT_SECS, INACTIVITY_WARNING_SECS,
    LEGACY_SESSION_KEY, SESSION_DURATION_HOURS, SESSION_RECORD_KEY, SessionConfig,
};
pub use endpoint::{AuthEndpoint, EndpointError, HttpAuthEndpoint, LoginResponse};
pub use inactivity::{ActivityEvent, InactivityConfig, InactivityStatus, InactivityTimer, TimerPhase};
pub use session::{
    AuthState, ExpiryReason, RoleSelection, SessionError, SessionManager, SessionRecord,
    SessionUser,
};
pub use storage::{
    CREDENTIAL_STORE_TYPE, CREDENTIAL_STORE_URL, CredentialStore, InMemoryCredentialStore,
    RedisCredentialStore, SharedCredentialStore, StorageError, credential_store_from_env, shared,
};
