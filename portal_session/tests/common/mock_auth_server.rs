//! Axum-based mock of the portal backend
//!
//! Each test starts its own server on an ephemeral port so tests never share
//! state.

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub const USER_EMAIL: &str = "ana@example.org";
pub const PASSWORD: &str = "s3cret";
/// Account whose login makes the backend fail with a 500.
pub const BROKEN_EMAIL: &str = "broken@example.org";

const ISSUED_TOKEN: &str = "server-token";

#[derive(Clone, Default)]
pub struct MockServerState {
    /// When set, the issued token is answered with an "expired" challenge.
    pub token_expired: Arc<AtomicBool>,
    /// When set, every bearer token is rejected as invalid.
    pub token_revoked: Arc<AtomicBool>,
    pub login_calls: Arc<AtomicUsize>,
}

pub struct MockAuthServer {
    pub base_url: String,
    pub state: MockServerState,
    handle: JoinHandle<()>,
}

impl MockAuthServer {
    pub async fn start() -> Self {
        let state = MockServerState::default();
        let app = Router::new()
            .route("/api/auth/login", post(login))
            .route("/api/members/me", get(me))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock auth server");
        let addr = listener.local_addr().expect("No local address");
        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .await
                .expect("Mock auth server failed");
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
            handle,
        }
    }

    pub fn login_url(&self) -> String {
        format!("{}/api/auth/login", self.base_url)
    }

    pub fn api_url(&self) -> String {
        format!("{}/api/", self.base_url)
    }
}

impl Drop for MockAuthServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[derive(Deserialize)]
struct LoginForm {
    email: String,
    password: String,
}

async fn login(State(state): State<MockServerState>, Json(form): Json<LoginForm>) -> Response {
    state.login_calls.fetch_add(1, Ordering::SeqCst);

    if form.email == BROKEN_EMAIL {
        return (StatusCode::INTERNAL_SERVER_ERROR, "database unavailable").into_response();
    }
    if form.email != USER_EMAIL || form.password != PASSWORD {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"message": "Invalid credentials"})),
        )
            .into_response();
    }

    Json(json!({
        "token": ISSUED_TOKEN,
        "user": {
            "id": 17,
            "name": "Ana Lima",
            "role": "member",
            "roles": ["member", "family"],
            "section": {"id": 3, "name": "North"},
            "email": USER_EMAIL
        }
    }))
    .into_response()
}

async fn me(State(state): State<MockServerState>, headers: HeaderMap) -> Response {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    let accepted = bearer == Some(ISSUED_TOKEN) && !state.token_revoked.load(Ordering::SeqCst);
    if accepted && !state.token_expired.load(Ordering::SeqCst) {
        return Json(json!({"id": 17, "name": "Ana Lima"})).into_response();
    }

    let challenge = if accepted {
        r#"Bearer error="invalid_token", error_description="The access token expired""#
    } else {
        r#"Bearer error="invalid_token""#
    };
    let mut response = StatusCode::UNAUTHORIZED.into_response();
    response.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static(challenge),
    );
    response
}
