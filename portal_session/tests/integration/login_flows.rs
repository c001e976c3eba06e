use portal_session::{
    AuthEndpoint, EndpointError, HttpAuthEndpoint, InMemoryCredentialStore, LogoutBroadcast,
    SESSION_RECORD_KEY, SessionConfig, SessionManager, SharedCredentialStore, shared,
};
use std::sync::atomic::Ordering;

use crate::common::{BROKEN_EMAIL, MockAuthServer, PASSWORD, USER_EMAIL};

fn manager(server: &MockAuthServer, store: &SharedCredentialStore) -> SessionManager {
    let endpoint = HttpAuthEndpoint::new(&server.login_url()).unwrap();
    SessionManager::new(
        store.clone(),
        endpoint,
        LogoutBroadcast::new(),
        SessionConfig::default(),
    )
}

#[tokio::test]
async fn test_login_then_restore_in_new_manager() {
    // Given a running backend and an empty store
    let server = MockAuthServer::start().await;
    let store = shared(InMemoryCredentialStore::new());
    let first = manager(&server, &store);
    first.initialize().await;

    // When logging in over HTTP
    assert!(first.login(USER_EMAIL, PASSWORD).await);

    // Then the session is active with the family role selected
    let state = first.state();
    assert!(state.is_authenticated);
    assert_eq!(state.token.as_deref(), Some("server-token"));
    assert_eq!(state.active_role(), Some("family"));
    let user = state.user.unwrap();
    assert_eq!(user.id, "17");
    assert_eq!(user.extra.get("email").and_then(|v| v.as_str()), Some(USER_EMAIL));

    // And a manager started later on the same store restores it
    first.shutdown();
    let second = manager(&server, &store);
    let restored = second.initialize().await;
    assert!(restored.is_authenticated);
    assert_eq!(restored.token.as_deref(), Some("server-token"));
    assert_eq!(restored.active_role(), Some("family"));
    assert_eq!(server.state.login_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_login_with_wrong_password() {
    let server = MockAuthServer::start().await;
    let store = shared(InMemoryCredentialStore::new());
    let manager = manager(&server, &store);
    manager.initialize().await;

    assert!(!manager.login(USER_EMAIL, "nope").await);

    let state = manager.state();
    assert!(!state.is_authenticated);
    assert!(state.auth_ready);
    assert!(store.lock().await.get(&SESSION_RECORD_KEY).await.unwrap().is_none());
}

#[tokio::test]
async fn test_login_when_backend_fails() {
    let server = MockAuthServer::start().await;
    let store = shared(InMemoryCredentialStore::new());
    let manager = manager(&server, &store);
    manager.initialize().await;

    assert!(!manager.login(BROKEN_EMAIL, PASSWORD).await);
    assert!(manager.wait_for_auth_ready().await);
    assert!(!manager.state().is_authenticated);
}

#[tokio::test]
async fn test_endpoint_error_mapping() {
    // Given the HTTP endpoint client
    let server = MockAuthServer::start().await;
    let endpoint = HttpAuthEndpoint::new(&server.login_url()).unwrap();

    // When the backend rejects or fails
    let rejected = endpoint.authenticate(USER_EMAIL, "nope").await;
    let failed = endpoint.authenticate(BROKEN_EMAIL, PASSWORD).await;

    // Then each failure has its own error
    assert!(matches!(rejected, Err(EndpointError::InvalidCredentials)));
    match failed {
        Err(EndpointError::UnexpectedStatus { status, body }) => {
            assert_eq!(status, 500);
            assert_eq!(body, "database unavailable");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn test_endpoint_unreachable() {
    // Given a port nobody listens on
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let endpoint = HttpAuthEndpoint::new(&format!("http://{addr}/api/auth/login")).unwrap();

    // When logging in, the transport error is reported
    let result = endpoint.authenticate(USER_EMAIL, PASSWORD).await;

    assert!(matches!(result, Err(EndpointError::Http(_))), "{result:?}");
}
