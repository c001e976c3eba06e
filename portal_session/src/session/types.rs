use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

use crate::clock::{compute_expiry, is_expired};
use crate::session::roles::RoleSelection;

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryReason {
    TokenExpired,
    TokenInvalid,
    Inactivity,
    Manual,
}

impl ExpiryReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpiryReason::TokenExpired => "token_expired",
            ExpiryReason::TokenInvalid => "token_invalid",
            ExpiryReason::Inactivity => "inactivity",
            ExpiryReason::Manual => "manual",
        }
    }

    /// Whether the user should be told the session ended.
    pub fn notifies_user(&self) -> bool {
        !matches!(self, ExpiryReason::Manual)
    }
}

impl fmt::Display for ExpiryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity returned by the portal backend.
///
/// Only the role fields are interpreted here; everything else the backend
/// sends is kept in `extra` so the stored record round-trips unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<Value>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "user id must be a string or a number, got {other}"
        ))),
    }
}

/// The persisted session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub user: SessionUser,
    pub token: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub issued_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn new(user: SessionUser, token: String, now: DateTime<Utc>, duration: Duration) -> Self {
        Self {
            user,
            token,
            issued_at: now,
            expires_at: compute_expiry(now, duration),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        is_expired(self.expires_at, now)
    }
}

/// Lenient view of whatever is in storage; records written by older
/// releases carry no timestamps.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StoredSessionRecord {
    pub(crate) user: SessionUser,
    pub(crate) token: String,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub(crate) issued_at: Option<DateTime<Utc>>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub(crate) expires_at: Option<DateTime<Utc>>,
}

/// How a stored record reads once its timestamps are checked.
#[derive(Debug)]
pub(crate) enum StoredState {
    Current(SessionRecord),
    /// Written by an older release, without `expiresAt`.
    Legacy(StoredSessionRecord),
    /// Timestamps outside the representable range.
    Malformed,
}

impl StoredSessionRecord {
    /// Splits current records from legacy ones lacking `expiresAt`.
    ///
    /// A missing `issuedAt` is derived from `expiresAt` and `duration`.
    pub(crate) fn classify(self, duration: Duration) -> StoredState {
        let Some(expires_at) = self.expires_at else {
            return StoredState::Legacy(self);
        };
        let issued_at = match self.issued_at {
            Some(issued_at) => Some(issued_at),
            None => expires_at.checked_sub_signed(duration),
        };

        match issued_at {
            Some(issued_at) => StoredState::Current(SessionRecord {
                user: self.user,
                token: self.token,
                issued_at,
                expires_at,
            }),
            None => StoredState::Malformed,
        }
    }

    /// Assigns an expiry to a legacy record.
    ///
    /// The record keeps its natural lifetime when `issuedAt` is known, not in
    /// the future, and still inside that lifetime; otherwise it is treated as
    /// issued `now`.
    pub(crate) fn upgrade_legacy(self, now: DateTime<Utc>, duration: Duration) -> SessionRecord {
        let issued_at = self
            .issued_at
            .filter(|issued_at| *issued_at <= now)
            .filter(|issued_at| {
                issued_at
                    .checked_add_signed(duration)
                    .is_some_and(|expires_at| !is_expired(expires_at, now))
            })
            .unwrap_or(now);
        SessionRecord::new(self.user, self.token, issued_at, duration)
    }
}

/// Authentication state published to the rest of the application.
///
/// Snapshots are replaced as a whole, so a reader never sees the user of
/// one session next to the token of another.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthState {
    pub user: Option<SessionUser>,
    pub token: Option<String>,
    pub is_authenticated: bool,
    pub is_loading: bool,
    /// False only while startup reconciliation or a login is in flight.
    pub auth_ready: bool,
    pub session_expired: bool,
    pub session_expired_reason: Option<ExpiryReason>,
    pub roles: RoleSelection,
}

impl AuthState {
    pub(crate) fn initializing() -> Self {
        Self {
            is_loading: true,
            auth_ready: false,
            ..Self::unauthenticated(None)
        }
    }

    pub(crate) fn authenticated(record: &SessionRecord, roles: RoleSelection) -> Self {
        Self {
            user: Some(record.user.clone()),
            token: Some(record.token.clone()),
            is_authenticated: true,
            is_loading: false,
            auth_ready: true,
            session_expired: false,
            session_expired_reason: None,
            roles,
        }
    }

    pub(crate) fn unauthenticated(expired: Option<ExpiryReason>) -> Self {
        Self {
            user: None,
            token: None,
            is_authenticated: false,
            is_loading: false,
            auth_ready: true,
            session_expired: expired.is_some(),
            session_expired_reason: expired,
            roles: RoleSelection::default(),
        }
    }

    pub fn active_role(&self) -> Option<&str> {
        if self.roles.active_role.is_empty() {
            None
        } else {
            Some(self.roles.active_role.as_str())
        }
    }
}
