use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::storage::errors::StorageError;

/// Handle to the process-wide credential store.
pub type SharedCredentialStore = Arc<Mutex<Box<dyn CredentialStore>>>;

/// Durable string key/value storage provided by the host environment.
pub struct InMemoryCredentialStore {
    pub(super) entry: HashMap<String, String>,
}

pub struct RedisCredentialStore {
    pub(super) client: redis::Client,
}

// Trait
#[async_trait]
pub trait CredentialStore: Send + Sync + 'static {
    /// Initialize the store. This is called when the store is created.
    async fn init(&self) -> Result<(), StorageError>;

    /// Read the raw value stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Overwrite the value stored under `key`.
    async fn set(&mut self, key: &str, value: String) -> Result<(), StorageError>;

    /// Remove `key`. Removing a missing key succeeds.
    async fn remove(&mut self, key: &str) -> Result<(), StorageError>;
}
