use dotenvy::dotenv;
use serde_json::Value;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use portal_session::{
    ActivityEvent, ApiClient, HttpAuthEndpoint, InactivityConfig, LogoutBroadcast, SessionConfig,
    SessionManager, credential_store_from_env,
};

mod backend;

use crate::backend::{Backend, DEMO_EMAIL, DEMO_PASSWORD, spawn_backend};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("{}=debug,portal_session=debug", env!("CARGO_CRATE_NAME")).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let backend = Backend::default();
    let base_url = spawn_backend(backend.clone()).await?;

    let store = credential_store_from_env().await?;
    let broadcast = LogoutBroadcast::new();
    let config = SessionConfig {
        inactivity: InactivityConfig {
            timeout: Duration::from_secs(6),
            warning: Duration::from_secs(3),
            tick: Duration::from_secs(1),
        },
        ..SessionConfig::default()
    };
    let manager = SessionManager::new(
        store.clone(),
        HttpAuthEndpoint::new(&format!("{base_url}/api/auth/login"))?,
        broadcast.clone(),
        config,
    );
    let api = ApiClient::new(&format!("{base_url}/api/"), store, broadcast)?;

    spawn_observers(&manager);

    let state = manager.initialize().await;
    tracing::info!("Started, authenticated: {}", state.is_authenticated);

    if !manager.login(DEMO_EMAIL, DEMO_PASSWORD).await {
        return Err("demo login failed".into());
    }
    manager.wait_for_auth_ready().await;
    let me: Value = api.get_json("members/me").await?;
    tracing::info!("Backend knows us as {}", me["name"]);

    manager.switch_role("member").await;

    // Some activity keeps the session alive
    for event in ActivityEvent::ALL {
        tokio::time::sleep(Duration::from_secs(2)).await;
        manager.record_activity(event);
    }

    tracing::info!("Going idle");
    let mut auth = manager.subscribe();
    auth.wait_for(|state| !state.is_authenticated).await?;
    manager.acknowledge_expiry();

    // A revoked token ends the session through the broadcast path
    if !manager.login(DEMO_EMAIL, DEMO_PASSWORD).await {
        return Err("demo login failed".into());
    }
    backend.revoke_tokens();
    if let Err(e) = api.get_json::<Value>("members/me").await {
        tracing::info!("API call rejected: {}", e);
    }
    auth.wait_for(|state| !state.is_authenticated).await?;

    manager.shutdown();
    Ok(())
}

/// Logs every state change the way a UI would render it.
fn spawn_observers(manager: &SessionManager) {
    let mut auth = manager.subscribe();
    tokio::spawn(async move {
        while auth.changed().await.is_ok() {
            let state = auth.borrow_and_update().clone();
            tracing::info!(
                "Auth state: authenticated={} ready={} role={:?} expired={:?}",
                state.is_authenticated,
                state.auth_ready,
                state.active_role(),
                state.session_expired_reason
            );
        }
    });

    let mut inactivity = manager.inactivity();
    tokio::spawn(async move {
        while inactivity.changed().await.is_ok() {
            let status = *inactivity.borrow_and_update();
            if status.show_warning {
                tracing::warn!("You will be signed out in {} seconds", status.seconds_remaining);
            }
        }
    });
}
