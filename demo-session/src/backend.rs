use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio::net::TcpListener;

pub(crate) const DEMO_EMAIL: &str = "demo@example.org";
pub(crate) const DEMO_PASSWORD: &str = "demo";
const DEMO_TOKEN: &str = "demo-token";

/// Lets the demo revoke the issued token to trigger a 401.
#[derive(Clone, Default)]
pub(crate) struct Backend {
    revoked: Arc<AtomicBool>,
}

impl Backend {
    pub(crate) fn revoke_tokens(&self) {
        self.revoked.store(true, Ordering::SeqCst);
    }
}

#[derive(Deserialize)]
struct Credentials {
    email: String,
    password: String,
}

/// Serves a tiny portal backend on an ephemeral port and returns its base URL.
pub(crate) async fn spawn_backend(backend: Backend) -> Result<String, std::io::Error> {
    let app = Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/members/me", get(me))
        .with_state(backend);

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Demo backend stopped: {}", e);
        }
    });
    tracing::info!("Demo backend listening on http://{}", addr);
    Ok(format!("http://{addr}"))
}

async fn login(Json(credentials): Json<Credentials>) -> Response {
    if credentials.email != DEMO_EMAIL || credentials.password != DEMO_PASSWORD {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!({
        "token": DEMO_TOKEN,
        "user": {
            "id": 1,
            "name": "Demo Member",
            "role": "member",
            "roles": ["member", "family"]
        }
    }))
    .into_response()
}

async fn me(State(backend): State<Backend>, headers: HeaderMap) -> Response {
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        == Some(DEMO_TOKEN);

    if authorized && !backend.revoked.load(Ordering::SeqCst) {
        Json(json!({"id": 1, "name": "Demo Member"})).into_response()
    } else {
        (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, r#"Bearer error="invalid_token""#)],
        )
            .into_response()
    }
}
