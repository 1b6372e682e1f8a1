//! Bearer-token session for the stream manager API.
//!
//! [`AuthSession`] caches one access token and hands it to every request.
//! A token is treated as stale once it is within the refresh margin of its
//! lifetime. Refreshes are single-flight: callers that find the token stale
//! queue on one async mutex, the first one logs in, and the rest pick up
//! the new token when they get the lock.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::time::Instant;

use super::CatalogError;
use super::dto::{LoginRequest, LoginResponse};
use crate::config::{Credentials, UpstreamConfig};

/// Something that can mint a fresh access token.
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    async fn issue(&self) -> Result<String, CatalogError>;
}

/// Logs in against the token endpoint with username and password.
pub struct LoginClient {
    http_client: reqwest::Client,
    login_url: String,
    username: String,
    password: String,
}

impl LoginClient {
    pub fn new(
        http_client: reqwest::Client,
        upstream: &UpstreamConfig,
        credentials: &Credentials,
    ) -> Result<Self, CatalogError> {
        let (Some(username), Some(password)) = (
            credentials.api_username.clone().filter(|u| !u.is_empty()),
            credentials.api_password.clone(),
        ) else {
            return Err(CatalogError::MissingCredentials);
        };
        Ok(Self {
            http_client,
            login_url: join_url(&upstream.api_base, &upstream.token_url),
            username,
            password,
        })
    }
}

#[async_trait]
impl TokenIssuer for LoginClient {
    async fn issue(&self) -> Result<String, CatalogError> {
        let response = self
            .http_client
            .post(&self.login_url)
            .json(&LoginRequest {
                username: &self.username,
                password: &self.password,
            })
            .send()
            .await
            .map_err(CatalogError::from_reqwest)?;

        let status = response.status();
        if status.as_u16() == 400 || status.as_u16() == 401 {
            return Err(CatalogError::Login(format!(
                "credentials rejected ({})",
                status.as_u16()
            )));
        }
        if !status.is_success() {
            return Err(CatalogError::Http {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        let tokens: LoginResponse = response.json().await.map_err(CatalogError::from_reqwest)?;
        if tokens.access.is_empty() {
            return Err(CatalogError::Login("empty access token".to_string()));
        }
        Ok(tokens.access)
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    access: String,
    issued_at: Instant,
}

/// Shared authentication state, one per process.
pub struct AuthSession {
    issuer: Arc<dyn TokenIssuer>,
    ttl: Duration,
    margin: Duration,
    current: RwLock<Option<CachedToken>>,
    refresh_lock: tokio::sync::Mutex<()>,
}

impl AuthSession {
    /// `margin` is clamped to half the TTL so a token is always usable for
    /// some time after it is issued.
    pub fn new(issuer: Arc<dyn TokenIssuer>, ttl: Duration, margin: Duration) -> Self {
        Self {
            issuer,
            ttl,
            margin: margin.min(ttl / 2),
            current: RwLock::new(None),
            refresh_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// A usable access token, refreshing first if the cached one is stale.
    pub async fn bearer(&self) -> Result<String, CatalogError> {
        if let Some(token) = self.fresh_token() {
            return Ok(token);
        }

        let _guard = self.refresh_lock.lock().await;
        // Someone else may have refreshed while we queued.
        if let Some(token) = self.fresh_token() {
            return Ok(token);
        }
        self.refresh_locked().await
    }

    /// The server rejected `rejected`; get a different token.
    ///
    /// If another task already replaced the rejected token, that token is
    /// returned without logging in again.
    pub async fn refresh_after_rejection(&self, rejected: &str) -> Result<String, CatalogError> {
        let _guard = self.refresh_lock.lock().await;
        if let Some(token) = self.fresh_token().filter(|t| t != rejected) {
            return Ok(token);
        }
        tracing::info!(target: "catalog", "Access token rejected, refreshing");
        self.refresh_locked().await
    }

    fn fresh_token(&self) -> Option<String> {
        let current = self.current.read();
        current
            .as_ref()
            .filter(|t| t.issued_at.elapsed() + self.margin < self.ttl)
            .map(|t| t.access.clone())
    }

    /// Must be called with `refresh_lock` held.
    async fn refresh_locked(&self) -> Result<String, CatalogError> {
        match self.issuer.issue().await {
            Ok(access) => {
                tracing::debug!(target: "catalog", "Obtained new access token");
                *self.current.write() = Some(CachedToken {
                    access: access.clone(),
                    issued_at: Instant::now(),
                });
                Ok(access)
            }
            Err(e) => {
                tracing::error!(target: "catalog", "Login failed: {}", e);
                *self.current.write() = None;
                Err(e)
            }
        }
    }
}

/// Join a base URL and a path without doubling or dropping the slash.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
