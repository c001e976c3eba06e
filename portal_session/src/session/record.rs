//! Session record access in the credential store.
//!
//! Reads fail soft: anything that does not parse as a session record is
//! reported as "no session". Backend failures are still returned so the
//! manager can log them before failing closed.

use crate::config::{ACTIVE_ROLE_KEY, LEGACY_SESSION_KEY, SESSION_RECORD_KEY};
use crate::session::types::{SessionRecord, StoredSessionRecord};
use crate::storage::{SharedCredentialStore, StorageError};

/// Values older releases wrote when serializing a missing session.
const ABSENT_MARKERS: [&str; 3] = ["", "null", "undefined"];

async fn read_value(store: &SharedCredentialStore, key: &str) -> Result<Option<String>, StorageError> {
    let value = store.lock().await.get(key).await?;
    Ok(value.filter(|v| !ABSENT_MARKERS.contains(&v.trim())))
}

/// Moves a record found under the legacy key to the canonical key.
///
/// The legacy key is removed in every case so the migration runs once.
pub(crate) async fn migrate_legacy_session(store: &SharedCredentialStore) -> Result<(), StorageError> {
    let Some(legacy) = read_value(store, &LEGACY_SESSION_KEY).await? else {
        return Ok(());
    };

    let mut guard = store.lock().await;
    if guard.get(&SESSION_RECORD_KEY).await?.is_none() {
        tracing::info!("Migrating session record from legacy key '{}'", *LEGACY_SESSION_KEY);
        guard.set(&SESSION_RECORD_KEY, legacy).await?;
    }
    guard.remove(&LEGACY_SESSION_KEY).await?;
    Ok(())
}

/// Reads the canonical session record.
pub(crate) async fn load_session_record(
    store: &SharedCredentialStore,
) -> Result<Option<StoredSessionRecord>, StorageError> {
    let Some(raw) = read_value(store, &SESSION_RECORD_KEY).await? else {
        return Ok(None);
    };

    match serde_json::from_str::<StoredSessionRecord>(&raw) {
        Ok(record) if record.token.trim().is_empty() => {
            tracing::warn!("Stored session record has an empty token, ignoring it");
            Ok(None)
        }
        Ok(record) => Ok(Some(record)),
        Err(e) => {
            tracing::warn!("Stored session record is malformed, ignoring it: {}", e);
            Ok(None)
        }
    }
}

pub(crate) async fn save_session_record(
    store: &SharedCredentialStore,
    record: &SessionRecord,
) -> Result<(), StorageError> {
    let value = serde_json::to_string(record)?;
    store.lock().await.set(&SESSION_RECORD_KEY, value).await
}

/// Removes every key this crate writes. Safe to call on an empty store.
pub(crate) async fn clear_session_keys(store: &SharedCredentialStore) -> Result<(), StorageError> {
    let mut guard = store.lock().await;
    for key in [&*SESSION_RECORD_KEY, &*LEGACY_SESSION_KEY, &*ACTIVE_ROLE_KEY] {
        guard.remove(key).await?;
    }
    Ok(())
}

pub(crate) async fn load_active_role(store: &SharedCredentialStore) -> Result<Option<String>, StorageError> {
    read_value(store, &ACTIVE_ROLE_KEY).await
}

pub(crate) async fn save_active_role(store: &SharedCredentialStore, role: &str) -> Result<(), StorageError> {
    store.lock().await.set(&ACTIVE_ROLE_KEY, role.to_string()).await
}

/// Bearer token of the stored session, without validating its expiry.
pub(crate) async fn stored_token(store: &SharedCredentialStore) -> Option<String> {
    match load_session_record(store).await {
        Ok(record) => record.map(|r| r.token),
        Err(e) => {
            tracing::error!("Failed to read session token: {}", e);
            None
        }
    }
}
