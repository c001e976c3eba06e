use portal_session::{
    ApiClient, ApiError, ExpiryReason, HttpAuthEndpoint, InMemoryCredentialStore, LogoutBroadcast,
    SESSION_RECORD_KEY, SessionConfig, SessionManager, SharedCredentialStore, shared,
};
use serde_json::Value;
use std::sync::atomic::Ordering;
use std::time::Duration;

use crate::common::{MockAuthServer, PASSWORD, USER_EMAIL};

struct Portal {
    server: MockAuthServer,
    store: SharedCredentialStore,
    manager: SessionManager,
    api: ApiClient,
}

/// Backend, manager and API client wired the way an application would.
async fn signed_in_portal() -> Portal {
    let server = MockAuthServer::start().await;
    let store = shared(InMemoryCredentialStore::new());
    let broadcast = LogoutBroadcast::new();
    let manager = SessionManager::new(
        store.clone(),
        HttpAuthEndpoint::new(&server.login_url()).unwrap(),
        broadcast.clone(),
        SessionConfig::default(),
    );
    let api = ApiClient::new(&server.api_url(), store.clone(), broadcast).unwrap();

    manager.initialize().await;
    assert!(manager.login(USER_EMAIL, PASSWORD).await);

    Portal {
        server,
        store,
        manager,
        api,
    }
}

async fn wait_for_logout(manager: &SessionManager) {
    let mut rx = manager.subscribe();
    tokio::time::timeout(
        Duration::from_secs(5),
        rx.wait_for(|state| !state.is_authenticated),
    )
    .await
    .expect("manager did not log out")
    .unwrap();
}

#[tokio::test]
async fn test_authorized_request() {
    let portal = signed_in_portal().await;

    let me: Value = portal.api.get_json("members/me").await.unwrap();

    assert_eq!(me["id"], 17);
    assert!(portal.manager.state().is_authenticated);
}

#[tokio::test]
async fn test_revoked_token_logs_out() {
    // Given a signed-in user whose token the backend no longer accepts
    let portal = signed_in_portal().await;
    portal.server.state.token_revoked.store(true, Ordering::SeqCst);

    // When an API call is made
    let result = portal.api.get_json::<Value>("members/me").await;

    // Then the call fails and the session ends as invalid
    assert!(matches!(
        result,
        Err(ApiError::Unauthorized(ExpiryReason::TokenInvalid))
    ));
    wait_for_logout(&portal.manager).await;
    let state = portal.manager.state();
    assert!(state.session_expired);
    assert_eq!(state.session_expired_reason, Some(ExpiryReason::TokenInvalid));
    assert!(
        portal
            .store
            .lock()
            .await
            .get(&SESSION_RECORD_KEY)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_expired_token_logs_out() {
    let portal = signed_in_portal().await;
    portal.server.state.token_expired.store(true, Ordering::SeqCst);

    let result = portal.api.get_json::<Value>("members/me").await;

    assert!(matches!(
        result,
        Err(ApiError::Unauthorized(ExpiryReason::TokenExpired))
    ));
    wait_for_logout(&portal.manager).await;
    assert_eq!(
        portal.manager.state().session_expired_reason,
        Some(ExpiryReason::TokenExpired)
    );
}

#[tokio::test]
async fn test_anonymous_401_does_not_broadcast() {
    // Given a signed-out user
    let portal = signed_in_portal().await;
    portal.manager.logout().await;

    // When an API call is rejected
    let result = portal.api.get_json::<Value>("members/me").await;

    // Then no expiry notice is produced
    assert!(matches!(result, Err(ApiError::Unauthorized(_))));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!portal.manager.state().session_expired);
}

#[tokio::test]
async fn test_unknown_route() {
    let portal = signed_in_portal().await;

    let result = portal.api.get_json::<Value>("members/unknown").await;

    assert!(matches!(result, Err(ApiError::Status { status: 404, .. })));
    assert!(portal.manager.state().is_authenticated);
}
