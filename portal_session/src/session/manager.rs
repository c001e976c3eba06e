use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::broadcast::{LogoutBroadcast, SubscriptionId};
use crate::config::SessionConfig;
use crate::endpoint::{AuthEndpoint, EndpointError, LoginResponse};
use crate::inactivity::{ActivityEvent, InactivityStatus, InactivityTimer};
use crate::storage::{SharedCredentialStore, StorageError};

use super::errors::SessionError;
use super::record::{
    clear_session_keys, load_active_role, load_session_record, migrate_legacy_session,
    save_active_role, save_session_record,
};
use super::roles::RoleSelection;
use super::types::{
    AuthState, ExpiryReason, SessionRecord, SessionUser, StoredSessionRecord, StoredState,
};

/// What the credential store currently says about the session.
enum StorageView {
    Empty,
    Expired,
    Valid(SessionRecord),
    Legacy(StoredSessionRecord),
}

async fn inspect_storage(
    store: &SharedCredentialStore,
    now: DateTime<Utc>,
    duration: Duration,
) -> Result<StorageView, StorageError> {
    let Some(stored) = load_session_record(store).await? else {
        return Ok(StorageView::Empty);
    };

    Ok(match stored.classify(duration) {
        StoredState::Current(record) if record.is_expired(now) => StorageView::Expired,
        StoredState::Current(record) => StorageView::Valid(record),
        StoredState::Legacy(legacy) => StorageView::Legacy(legacy),
        StoredState::Malformed => {
            tracing::warn!("Stored session record has out-of-range timestamps, ignoring it");
            StorageView::Empty
        }
    })
}

/// Who asked for a session to end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    /// A public operation; always applied.
    Direct,
    /// The inactivity timer or a broadcast; dropped when no session exists.
    Request,
}

struct ManagerInner {
    store: SharedCredentialStore,
    endpoint: Box<dyn AuthEndpoint>,
    broadcast: LogoutBroadcast,
    config: SessionConfig,
    state_tx: watch::Sender<AuthState>,
    timer: InactivityTimer,
    /// Serializes state transitions. Never held across an endpoint call.
    transition: Mutex<()>,
    /// Bumped whenever a session is cleared; a login commits only if the
    /// value it started with is still current.
    generation: AtomicU64,
    subscription: parking_lot::Mutex<Option<SubscriptionId>>,
    pump: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl ManagerInner {
    fn detach(&self) {
        if let Some(id) = self.subscription.lock().take() {
            self.broadcast.unregister(id);
        }
        if let Some(pump) = self.pump.lock().take() {
            pump.abort();
        }
        self.timer.set_enabled(false);
    }
}

impl Drop for ManagerInner {
    fn drop(&mut self) {
        self.detach();
    }
}

/// Owns the authentication state of the portal client.
///
/// Cloning yields another handle to the same session. Every way a session
/// can end (manual logout, inactivity, a 401 reported through the
/// [`LogoutBroadcast`]) goes through the same clearing routine, and the
/// timer and broadcast paths are funneled through one internal queue.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<ManagerInner>,
}

impl SessionManager {
    /// Creates a manager in the initializing state. Call
    /// [`initialize`](Self::initialize) to load any stored session.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn new(
        store: SharedCredentialStore,
        endpoint: impl AuthEndpoint,
        broadcast: LogoutBroadcast,
        config: SessionConfig,
    ) -> Self {
        let (logout_tx, logout_rx) = mpsc::unbounded_channel();

        let timer_tx = logout_tx.clone();
        let timer = InactivityTimer::new(config.inactivity.clone(), move || {
            let _ = timer_tx.send(ExpiryReason::Inactivity);
        });
        let subscription = broadcast.register(move |reason| {
            let _ = logout_tx.send(reason);
        });

        let (state_tx, _) = watch::channel(AuthState::initializing());
        let inner = Arc::new(ManagerInner {
            store,
            endpoint: Box::new(endpoint),
            broadcast,
            config,
            state_tx,
            timer,
            transition: Mutex::new(()),
            generation: AtomicU64::new(0),
            subscription: parking_lot::Mutex::new(Some(subscription)),
            pump: parking_lot::Mutex::new(None),
        });

        let pump = tokio::spawn(pump_logout_requests(Arc::downgrade(&inner), logout_rx));
        *inner.pump.lock() = Some(pump);

        Self { inner }
    }

    /// Startup reconciliation against the credential store.
    pub async fn initialize(&self) -> AuthState {
        self.refresh_user().await
    }

    /// Re-derives the in-memory state from the credential store.
    ///
    /// Storage is the source of truth: a record cleared by someone else ends
    /// the session here too. Any failure fails closed.
    pub async fn refresh_user(&self) -> AuthState {
        let _guard = self.inner.transition.lock().await;

        let state = match self.reconcile().await {
            Ok(state) => state,
            Err(e) => {
                tracing::error!("Failed to restore session, starting signed out: {}", e);
                self.clear_storage().await;
                AuthState::unauthenticated(None)
            }
        };
        self.publish(state.clone());
        state
    }

    /// Exchanges credentials for a new session.
    ///
    /// Any existing session is cleared first. Returns false when the
    /// credentials were rejected, the endpoint failed, or a logout arrived
    /// while the endpoint call was in flight.
    pub async fn login(&self, email: &str, password: &str) -> bool {
        let generation = self.begin_login().await;
        let result = self.inner.endpoint.authenticate(email, password).await;

        match self.finish_login(generation, result).await {
            Ok(()) => {
                // Observers see the new session before the gate opens
                tokio::task::yield_now().await;
                self.mark_ready_if_current(generation).await;
                true
            }
            Err(SessionError::Superseded) => {
                tracing::info!("Login discarded: a logout happened while it was in flight");
                false
            }
            Err(e) => {
                tracing::warn!("Login failed: {}", e);
                false
            }
        }
    }

    /// Ends the session without notifying the user.
    pub async fn logout(&self) {
        self.end_session(None, Trigger::Direct).await;
    }

    /// Ends the session and records why. [`ExpiryReason::Manual`] is the
    /// same as [`logout`](Self::logout).
    pub async fn logout_with_reason(&self, reason: ExpiryReason) {
        self.end_session(Some(reason), Trigger::Direct).await;
    }

    /// Makes `role` the active role. Roles the user does not hold are
    /// ignored and false is returned.
    pub async fn switch_role(&self, role: &str) -> bool {
        let _guard = self.inner.transition.lock().await;

        let allowed = {
            let state = self.inner.state_tx.borrow();
            state.is_authenticated && state.roles.contains(role)
        };
        if !allowed {
            tracing::debug!("Ignoring switch to role '{}'", role);
            return false;
        }

        if let Err(e) = save_active_role(&self.inner.store, role).await {
            tracing::error!("Failed to persist active role: {}", e);
        }
        self.inner
            .state_tx
            .send_modify(|state| state.roles.active_role = role.to_string());
        tracing::info!("Active role switched to '{}'", role);
        true
    }

    /// Waits until authentication state is settled.
    ///
    /// Returns true as soon as either the in-memory state is ready or the
    /// credential store holds a valid session, and false once the configured
    /// bound elapses.
    pub async fn wait_for_auth_ready(&self) -> bool {
        let mut state_rx = self.inner.state_tx.subscribe();
        if state_rx.borrow_and_update().auth_ready {
            return true;
        }

        let store = &self.inner.store;
        let poll_interval = self.inner.config.auth_ready_poll_interval;
        let session_duration = self.inner.config.session_duration;
        let wait = async {
            let mut poll = tokio::time::interval(poll_interval);
            poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    ready = state_rx.wait_for(|state| state.auth_ready) => {
                        return ready.is_ok();
                    }
                    _ = poll.tick() => {
                        let view = inspect_storage(store, Utc::now(), session_duration).await;
                        if let Ok(StorageView::Valid(_)) = view {
                            tracing::debug!("Session confirmed by the credential store");
                            return true;
                        }
                    }
                }
            }
        };

        match tokio::time::timeout(self.inner.config.auth_ready_timeout, wait).await {
            Ok(ready) => ready,
            Err(_) => {
                tracing::warn!(
                    "Authentication state not ready after {:?}, continuing",
                    self.inner.config.auth_ready_timeout
                );
                false
            }
        }
    }

    pub fn state(&self) -> AuthState {
        self.inner.state_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.inner.state_tx.subscribe()
    }

    pub fn inactivity(&self) -> watch::Receiver<InactivityStatus> {
        self.inner.timer.subscribe()
    }

    pub fn record_activity(&self, event: ActivityEvent) {
        self.inner.timer.record_activity(event);
    }

    /// The user chose to stay signed in from the inactivity warning.
    pub fn continue_session(&self) {
        self.inner.timer.reset_timer();
    }

    /// Clears the expiry notice once it has been shown.
    pub fn acknowledge_expiry(&self) {
        self.inner.state_tx.send_if_modified(|state| {
            if !state.session_expired && state.session_expired_reason.is_none() {
                return false;
            }
            state.session_expired = false;
            state.session_expired_reason = None;
            true
        });
    }

    /// Stops listening for logout requests and stops the inactivity timer.
    /// The stored session is left untouched.
    pub fn shutdown(&self) {
        tracing::debug!("Shutting down session manager");
        self.inner.detach();
    }

    fn publish(&self, state: AuthState) {
        let authenticated = state.is_authenticated;
        self.inner.state_tx.send_replace(state);
        self.inner.timer.set_enabled(authenticated);
    }

    async fn reconcile(&self) -> Result<AuthState, StorageError> {
        let store = &self.inner.store;
        migrate_legacy_session(store).await?;

        let now = Utc::now();
        match inspect_storage(store, now, self.inner.config.session_duration).await? {
            StorageView::Empty => {
                clear_session_keys(store).await?;
                Ok(AuthState::unauthenticated(None))
            }
            StorageView::Expired => {
                tracing::info!("Stored session has expired");
                clear_session_keys(store).await?;
                Ok(AuthState::unauthenticated(Some(ExpiryReason::TokenExpired)))
            }
            StorageView::Valid(record) => {
                let roles = self.resolve_roles(&record.user).await;
                tracing::debug!("Restored session of user {}", record.user.id);
                Ok(AuthState::authenticated(&record, roles))
            }
            StorageView::Legacy(stored) => {
                let record = stored.upgrade_legacy(now, self.inner.config.session_duration);
                tracing::info!(
                    "Assigned expiry {} to session record without one",
                    record.expires_at
                );
                save_session_record(store, &record).await?;
                let roles = self.resolve_roles(&record.user).await;
                Ok(AuthState::authenticated(&record, roles))
            }
        }
    }

    /// Resolves and persists the active role of `user`.
    async fn resolve_roles(&self, user: &SessionUser) -> RoleSelection {
        let store = &self.inner.store;
        let preferred = load_active_role(store).await.unwrap_or_else(|e| {
            tracing::warn!("Failed to read active role: {}", e);
            None
        });

        let roles = RoleSelection::for_user(user, preferred.as_deref());
        if !roles.active_role.is_empty() && preferred.as_deref() != Some(roles.active_role.as_str())
        {
            if let Err(e) = save_active_role(store, &roles.active_role).await {
                tracing::error!("Failed to persist active role: {}", e);
            }
        }
        roles
    }

    async fn begin_login(&self) -> u64 {
        let _guard = self.inner.transition.lock().await;

        self.clear_storage().await;
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.publish(AuthState::initializing());
        generation
    }

    async fn finish_login(
        &self,
        generation: u64,
        result: Result<LoginResponse, EndpointError>,
    ) -> Result<(), SessionError> {
        let _guard = self.inner.transition.lock().await;

        if self.inner.generation.load(Ordering::SeqCst) != generation {
            return Err(SessionError::Superseded);
        }

        let login = match result {
            Ok(login) => login,
            Err(e) => {
                self.publish(AuthState::unauthenticated(None));
                return Err(e.into());
            }
        };

        let record = SessionRecord::new(
            login.user,
            login.token,
            Utc::now(),
            self.inner.config.session_duration,
        );
        if let Err(e) = save_session_record(&self.inner.store, &record).await {
            self.clear_storage().await;
            self.publish(AuthState::unauthenticated(None));
            return Err(e.into());
        }

        let roles = self.resolve_roles(&record.user).await;
        tracing::info!(
            "User {} signed in, session expires at {}",
            record.user.id,
            record.expires_at
        );
        self.publish(AuthState {
            auth_ready: false,
            ..AuthState::authenticated(&record, roles)
        });
        Ok(())
    }

    async fn mark_ready_if_current(&self, generation: u64) {
        let _guard = self.inner.transition.lock().await;

        if self.inner.generation.load(Ordering::SeqCst) != generation {
            return;
        }
        self.inner.state_tx.send_if_modified(|state| {
            let changed = !state.auth_ready;
            state.auth_ready = true;
            changed
        });
    }

    async fn end_session(&self, reason: Option<ExpiryReason>, trigger: Trigger) {
        let _guard = self.inner.transition.lock().await;

        if trigger == Trigger::Request {
            let idle = {
                let state = self.inner.state_tx.borrow();
                !state.is_authenticated && state.auth_ready
            };
            if idle {
                tracing::debug!("No active session, ignoring logout request ({:?})", reason);
                return;
            }
        }

        let reason = reason.filter(ExpiryReason::notifies_user);
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.clear_storage().await;
        match reason {
            Some(reason) => tracing::info!("Session ended: {}", reason),
            None => tracing::info!("User signed out"),
        }
        self.publish(AuthState::unauthenticated(reason));
    }

    async fn clear_storage(&self) {
        if let Err(e) = clear_session_keys(&self.inner.store).await {
            tracing::error!("Failed to clear stored session: {}", e);
        }
    }
}

/// Applies logout requests from the inactivity timer and the broadcast
/// registry one at a time.
async fn pump_logout_requests(
    inner: Weak<ManagerInner>,
    mut requests: mpsc::UnboundedReceiver<ExpiryReason>,
) {
    while let Some(reason) = requests.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        SessionManager { inner }
            .end_session(Some(reason), Trigger::Request)
            .await;
    }
}
