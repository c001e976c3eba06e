use std::{env, sync::LazyLock};

use super::errors::StorageError;
use super::types::{InMemoryCredentialStore, RedisCredentialStore, SharedCredentialStore};

/// Backend of the credential store: `memory` or `redis`. Default: memory
pub static CREDENTIAL_STORE_TYPE: LazyLock<String> = LazyLock::new(|| {
    env::var("CREDENTIAL_STORE_TYPE").unwrap_or_else(|_| "memory".to_string())
});

/// Connection URL for the `redis` backend
pub static CREDENTIAL_STORE_URL: LazyLock<String> = LazyLock::new(|| {
    env::var("CREDENTIAL_STORE_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string())
});

/// Builds the credential store selected by `CREDENTIAL_STORE_TYPE`.
pub async fn credential_store_from_env() -> Result<SharedCredentialStore, StorageError> {
    build_store(CREDENTIAL_STORE_TYPE.as_str(), CREDENTIAL_STORE_URL.as_str()).await
}

async fn build_store(store_type: &str, store_url: &str) -> Result<SharedCredentialStore, StorageError> {
    tracing::info!("Initializing credential store with type: {}", store_type);

    match store_type {
        "memory" => Ok(super::shared(InMemoryCredentialStore::new())),
        "redis" => {
            let store = RedisCredentialStore::open(store_url).map_err(|e| {
                tracing::error!("Failed to create Redis client: {}", e);
                e
            })?;
            // Verify the Redis server is reachable before handing the store out
            super::CredentialStore::init(&store).await.map_err(|e| {
                tracing::error!("Failed to connect to Redis: {}", e);
                e
            })?;
            tracing::info!("Connected to credential store: type=redis, url={}", store_url);
            Ok(super::shared(store))
        }
        t => Err(StorageError::UnsupportedBackend(t.to_string())),
    }
}
