//! Client for the portal's login endpoint.

use async_trait::async_trait;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::config::AUTH_LOGIN_URL;
use crate::session::SessionUser;

/// Successful login payload.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: SessionUser,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Error, Clone)]
pub enum EndpointError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Malformed login response: {0}")]
    MalformedResponse(String),

    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(String),
}

impl From<reqwest::Error> for EndpointError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.to_string())
    }
}

/// Exchanges credentials for a token and user record.
#[async_trait]
pub trait AuthEndpoint: Send + Sync + 'static {
    async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<LoginResponse, EndpointError>;
}

pub struct HttpAuthEndpoint {
    client: reqwest::Client,
    login_url: Url,
}

/// HTTP client settings for the login call.
///
/// - `timeout`: a login that takes longer than 30 seconds is reported as a
///   failure instead of leaving the readiness gate closed.
/// - `pool_idle_timeout`: default (90 seconds).
pub(crate) fn build_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .pool_idle_timeout(Duration::from_secs(90))
        .build()
}

impl HttpAuthEndpoint {
    pub fn new(login_url: &str) -> Result<Self, EndpointError> {
        let login_url =
            Url::parse(login_url).map_err(|e| EndpointError::InvalidUrl(format!("{login_url}: {e}")))?;
        Ok(Self {
            client: build_client()?,
            login_url,
        })
    }

    /// Endpoint configured by `AUTH_LOGIN_URL`.
    pub fn from_env() -> Result<Self, EndpointError> {
        Self::new(AUTH_LOGIN_URL.as_str())
    }

    pub fn login_url(&self) -> &Url {
        &self.login_url
    }
}

#[async_trait]
impl AuthEndpoint for HttpAuthEndpoint {
    async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<LoginResponse, EndpointError> {
        tracing::debug!("Posting credentials to {}", self.login_url);

        let response = self
            .client
            .post(self.login_url.clone())
            .json(&LoginRequest { email, password })
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            tracing::debug!("Login rejected with status {}", status);
            return Err(EndpointError::InvalidCredentials);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Login endpoint returned {}: {}", status, body);
            return Err(EndpointError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let login: LoginResponse = serde_json::from_str(&body)
            .map_err(|e| EndpointError::MalformedResponse(e.to_string()))?;
        if login.token.trim().is_empty() {
            return Err(EndpointError::MalformedResponse(
                "empty token".to_string(),
            ));
        }
        Ok(login)
    }
}
