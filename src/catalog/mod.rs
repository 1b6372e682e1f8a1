//! Upstream stream catalog.
//!
//! Talks to the stream manager's REST API: authentication, channel groups,
//! paginated stream listings and liveness probes.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ CatalogApi   │────▶│ CatalogClient│────▶│ AuthSession  │
//! │ (trait seam) │     │ (HTTP + DTO) │     │ (bearer)     │
//! └──────────────┘     └──────┬───────┘     └──────────────┘
//!                             │
//!                             ▼
//!                      ┌──────────────┐
//!                      │ pager        │
//!                      │ (401 retry)  │
//!                      └──────────────┘
//! ```
//!
//! - [`auth`]: token cache with single-flight refresh
//! - [`pager`]: walks `next` links, re-authenticating once on a rejected page
//! - [`client`]: the HTTP implementation
//! - [`traits`]: the seam the pipeline depends on

pub mod auth;
pub mod client;
pub mod dto;
pub mod pager;
pub mod traits;

pub use auth::{AuthSession, LoginClient, TokenIssuer};
pub use client::CatalogClient;
pub use traits::CatalogApi;

/// Errors from the upstream catalog.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CatalogError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The bearer token was rejected
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Login failed: {0}")]
    Login(String),

    #[error("Upstream credentials are not configured")]
    MissingCredentials,

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Not found")]
    NotFound,
}

impl CatalogError {
    pub(crate) fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout(e.to_string())
        } else if e.is_decode() {
            Self::Parse(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}
