//! HTTP client for the stream manager API.
//!
//! Endpoints used:
//! - `GET /api/channels/streams/groups/` - group names
//! - `GET /api/channels/streams/?page=&page_size=&ordering=name&channel_group=`
//! - `GET /api/channels/streams/{id}/`
//!
//! Every request carries the session's bearer token. A `401` triggers one
//! refresh through [`AuthSession::refresh_after_rejection`] and one retry.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use super::CatalogError;
use super::auth::{AuthSession, LoginClient, join_url};
use super::dto::{RawStream, StreamPage};
use super::pager::{self, PAGE_SIZE, PageSource};
use crate::config::Config;
use crate::model::{ClassifiedItem, MediaCategory, NameParser, StreamItem};

const GROUPS_PATH: &str = "/api/channels/streams/groups/";
const STREAMS_PATH: &str = "/api/channels/streams/";

/// Stream manager API client.
pub struct CatalogClient {
    http_client: reqwest::Client,
    api_base: String,
    auth: Arc<AuthSession>,
    parser: NameParser,
    skip_stream_check: bool,
    probe_timeout: Duration,
}

impl CatalogClient {
    /// Build the client, its login client and session from configuration.
    pub fn new(config: &Config) -> crate::error::Result<Self> {
        let upstream = &config.upstream;
        let http_client = reqwest::Client::builder()
            .timeout(upstream.request_timeout())
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()
            .map_err(|e| CatalogError::Network(format!("failed to build HTTP client: {e}")))?;

        let issuer = LoginClient::new(http_client.clone(), upstream, &config.credentials)?;
        let auth = Arc::new(AuthSession::new(
            Arc::new(issuer),
            upstream.token_ttl(),
            upstream.refresh_margin(),
        ));
        let parser = NameParser::new(&config.library)?;

        Ok(Self::with_session(
            http_client,
            &upstream.api_base,
            auth,
            parser,
            upstream.skip_stream_check,
        ))
    }

    pub fn with_session(
        http_client: reqwest::Client,
        api_base: &str,
        auth: Arc<AuthSession>,
        parser: NameParser,
        skip_stream_check: bool,
    ) -> Self {
        Self {
            http_client,
            api_base: api_base.trim_end_matches('/').to_string(),
            auth,
            parser,
            skip_stream_check,
            probe_timeout: Duration::from_secs(5),
        }
    }

    /// All channel group names.
    pub async fn fetch_groups(&self) -> Result<Vec<String>, CatalogError> {
        let url = join_url(&self.api_base, GROUPS_PATH);
        self.get_authed(&url, &[]).await
    }

    /// Every stream in `group`, classified for `category`. Streams whose
    /// names don't parse for the category are dropped.
    pub async fn fetch_group_items(
        &self,
        group: &str,
        category: MediaCategory,
    ) -> Result<Vec<ClassifiedItem>, CatalogError> {
        let raw = pager::collect_group(self, &self.auth, group).await?;
        Ok(classify_all(&self.parser, raw, group, category))
    }

    /// A single stream by upstream id.
    pub async fn get_stream(&self, id: i64) -> Result<StreamItem, CatalogError> {
        let url = join_url(&self.api_base, &format!("{STREAMS_PATH}{id}/"));
        let raw: RawStream = self.get_authed(&url, &[]).await?;
        raw.into_item("").ok_or(CatalogError::NotFound)
    }

    /// Lightweight reachability check on a playback URL.
    pub async fn probe(&self, url: &str) -> bool {
        if self.skip_stream_check {
            return true;
        }
        if url.is_empty() {
            return false;
        }
        match self
            .http_client
            .head(url)
            .timeout(self.probe_timeout)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!(target: "catalog", "Probe failed for {}: {}", url, e);
                false
            }
        }
    }

    /// GET with bearer auth and a single refresh-and-retry on `401`.
    async fn get_authed<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, CatalogError> {
        let token = self.auth.bearer().await?;
        match self.get_with_token(url, query, &token).await {
            Err(CatalogError::Unauthorized) => {
                let fresh = self.auth.refresh_after_rejection(&token).await?;
                self.get_with_token(url, query, &fresh).await
            }
            other => other,
        }
    }

    async fn get_with_token<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        token: &str,
    ) -> Result<T, CatalogError> {
        let response = self
            .http_client
            .get(url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await
            .map_err(CatalogError::from_reqwest)?;
        let response = check_status(response)?;
        response
            .json::<T>()
            .await
            .map_err(|e| CatalogError::Parse(format!("{url}: {e}")))
    }
}

#[async_trait]
impl PageSource for CatalogClient {
    async fn fetch_page(
        &self,
        group: &str,
        page: u32,
        token: &str,
    ) -> Result<StreamPage, CatalogError> {
        let url = join_url(&self.api_base, STREAMS_PATH);
        let query = [
            ("page", page.to_string()),
            ("page_size", PAGE_SIZE.to_string()),
            ("ordering", "name".to_string()),
            ("channel_group", group.to_string()),
        ];
        self.get_with_token(&url, &query, token).await
    }
}

/// Convert and classify raw streams. Duplicate ids within a listing keep
/// the first occurrence.
pub(crate) fn classify_all(
    parser: &NameParser,
    raw: Vec<RawStream>,
    group: &str,
    category: MediaCategory,
) -> Vec<ClassifiedItem> {
    let mut seen = std::collections::HashSet::new();
    let mut dropped = 0usize;
    let items: Vec<ClassifiedItem> = raw
        .into_iter()
        .filter(|r| seen.insert(r.id))
        .filter_map(|r| r.into_item(group))
        .filter_map(|item| {
            let classified = parser.classify(item, category);
            if classified.is_none() {
                dropped += 1;
            }
            classified
        })
        .collect();

    if dropped > 0 {
        tracing::debug!(
            target: "catalog",
            "Group '{}': {} streams don't parse as {}",
            group,
            dropped,
            category
        );
    }
    items
}

fn check_status(response: reqwest::Response) -> Result<reqwest::Response, CatalogError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    Err(match status {
        StatusCode::UNAUTHORIZED => CatalogError::Unauthorized,
        StatusCode::NOT_FOUND => CatalogError::NotFound,
        _ => CatalogError::Http {
            status: status.as_u16(),
            message: status.canonical_reason().unwrap_or("Unknown").to_string(),
        },
    })
}
