mod config;
mod errors;
mod memory;
mod redis;
mod types;

pub use config::{CREDENTIAL_STORE_TYPE, CREDENTIAL_STORE_URL, credential_store_from_env};
pub use errors::StorageError;
pub use types::{CredentialStore, InMemoryCredentialStore, RedisCredentialStore, SharedCredentialStore};

/// Wraps a backend into the handle shared by the manager and network wrappers.
pub fn shared(store: impl CredentialStore) -> SharedCredentialStore {
    let store: Box<dyn CredentialStore> = Box::new(store);
    std::sync::Arc::new(tokio::sync::Mutex::new(store))
}
