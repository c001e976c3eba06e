//! Authenticated client for the portal's REST API.
//!
//! Attaches the stored bearer token to every request. When the backend
//! rejects that token the client publishes a logout request on the
//! [`LogoutBroadcast`]; it never talks to the session manager directly.

use http::StatusCode;
use http::header::WWW_AUTHENTICATE;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

use crate::broadcast::LogoutBroadcast;
use crate::endpoint::build_client;
use crate::session::ExpiryReason;
use crate::session::stored_token;
use crate::storage::SharedCredentialStore;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend rejected the session token; a logout has been requested.
    #[error("Unauthorized ({0})")]
    Unauthorized(ExpiryReason),

    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },
}

#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: Url,
    store: SharedCredentialStore,
    broadcast: LogoutBroadcast,
}

impl ApiClient {
    pub fn new(
        base_url: &str,
        store: SharedCredentialStore,
        broadcast: LogoutBroadcast,
    ) -> Result<Self, ApiError> {
        let base_url =
            Url::parse(base_url).map_err(|e| ApiError::InvalidUrl(format!("{base_url}: {e}")))?;
        Ok(Self {
            client: build_client()?,
            base_url,
            store,
            broadcast,
        })
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.url(path)?;
        let response = self.send(self.client.get(url)).await?;
        Ok(response.json().await?)
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path)?;
        let response = self.send(self.client.post(url).json(body)).await?;
        Ok(response.json().await?)
    }

    fn url(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path)
            .map_err(|e| ApiError::InvalidUrl(format!("{path}: {e}")))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, ApiError> {
        let token = stored_token(&self.store).await;
        let request = match &token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            let reason = rejection_reason(&response);
            if token.is_some() {
                tracing::warn!("Backend rejected the session token ({})", reason);
                self.broadcast.publish(reason);
            }
            return Err(ApiError::Unauthorized(reason));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

/// Bearer challenges carrying `expired` (RFC 6750 error_description or a
/// plain marker) mean the token timed out; anything else is a bad token.
fn rejection_reason(response: &reqwest::Response) -> ExpiryReason {
    let expired = response
        .headers()
        .get_all(WWW_AUTHENTICATE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .any(|value| value.to_ascii_lowercase().contains("expired"));

    if expired {
        ExpiryReason::TokenExpired
    } else {
        ExpiryReason::TokenInvalid
    }
}
