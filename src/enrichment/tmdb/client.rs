//! TMDB HTTP client
//!
//! Handles communication with the TMDB v3 API.
//! See: https://developer.themoviedb.org/docs
//!
//! ## Rate limiting
//! TMDB publishes a per-window request budget. Every request waits on a
//! shared token bucket ([`governor`]) before it is sent, regardless of
//! which worker issued it, and is then wrapped in an exponential
//! [`RetryPolicy`] that backs off on `429` and transient failures.
//!
//! ## Images
//! Artwork lives on a separate CDN (`image.tmdb.org`) that is not subject
//! to the API budget. Downloads skip the limiter and use a linear retry on
//! connection-level failures only.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use super::{adapter, dto};
use crate::config::TmdbConfig;
use crate::enrichment::domain::{EnrichmentError, MetadataRecord, SearchHit};
use crate::enrichment::retry::RetryPolicy;

const API_BASE: &str = "https://api.themoviedb.org/3";
const IMAGE_BASE: &str = "https://image.tmdb.org/t/p";

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// TMDB API client
pub struct TmdbClient {
    api_key: String,
    language: String,
    image_size: String,
    http_client: reqwest::Client,
    base_url: String,
    image_base_url: String,
    limiter: DirectLimiter,
    retry: RetryPolicy,
    image_retry: RetryPolicy,
}

impl TmdbClient {
    /// Create a new client with the given API key and settings.
    pub fn new(api_key: impl Into<String>, config: &TmdbConfig) -> Result<Self, EnrichmentError> {
        let http_client = reqwest::Client::builder()
            .gzip(true)
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()
            .map_err(|e| EnrichmentError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self::with_http_client(
            api_key,
            config,
            http_client,
            API_BASE,
            IMAGE_BASE,
        ))
    }

    /// Create a client for testing with custom base URLs
    #[cfg(test)]
    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        image_base_url: impl Into<String>,
    ) -> Self {
        Self::with_http_client(
            api_key,
            &TmdbConfig::default(),
            reqwest::Client::new(),
            base_url,
            image_base_url,
        )
    }

    fn with_http_client(
        api_key: impl Into<String>,
        config: &TmdbConfig,
        http_client: reqwest::Client,
        base_url: impl Into<String>,
        image_base_url: impl Into<String>,
    ) -> Self {
        let base_delay = Duration::from_millis(config.base_delay_ms);
        Self {
            api_key: api_key.into(),
            language: config.language.clone(),
            image_size: config.image_size.clone(),
            http_client,
            base_url: base_url.into(),
            image_base_url: image_base_url.into(),
            limiter: RateLimiter::direct(quota(config.rate_limit, config.rate_window_secs)),
            retry: RetryPolicy::exponential(config.max_retries, base_delay),
            image_retry: RetryPolicy::linear(config.max_retries, base_delay),
        }
    }

    /// Full CDN URL for an artwork path such as `/abc.jpg`.
    pub fn image_url(&self, remote_ref: &str) -> String {
        if remote_ref.starts_with("http://") || remote_ref.starts_with("https://") {
            return remote_ref.to_string();
        }
        format!(
            "{}/{}/{}",
            self.image_base_url.trim_end_matches('/'),
            self.image_size,
            remote_ref.trim_start_matches('/')
        )
    }

    pub async fn search_movie(
        &self,
        title: &str,
        year: Option<i32>,
    ) -> Result<Vec<SearchHit>, EnrichmentError> {
        let mut query = vec![("query", title.to_string())];
        if let Some(year) = year {
            query.push(("year", year.to_string()));
        }
        let (response, _): (dto::SearchResponse<dto::MovieResult>, _) =
            self.get_json("/search/movie", &query).await?;
        Ok(response.results.into_iter().map(adapter::movie_hit).collect())
    }

    pub async fn search_multi(&self, query: &str) -> Result<Vec<SearchHit>, EnrichmentError> {
        let (response, _): (dto::SearchResponse<dto::MultiResult>, _) = self
            .get_json("/search/multi", &[("query", query.to_string())])
            .await?;
        Ok(response.results.into_iter().map(adapter::multi_hit).collect())
    }

    pub async fn movie_details(&self, id: i64) -> Result<MetadataRecord, EnrichmentError> {
        let (details, raw) = self
            .get_json::<dto::MovieDetails>(
                &format!("/movie/{id}"),
                &[("append_to_response", "credits,images,release_dates".to_string())],
            )
            .await?;
        Ok(adapter::movie_record(details, raw))
    }

    pub async fn tv_details(&self, id: i64) -> Result<MetadataRecord, EnrichmentError> {
        let (details, raw) = self
            .get_json::<dto::TvDetails>(
                &format!("/tv/{id}"),
                &[("append_to_response", "credits".to_string())],
            )
            .await?;
        Ok(adapter::show_record(details, raw))
    }

    pub async fn season_details(
        &self,
        show_id: i64,
        season: u32,
    ) -> Result<MetadataRecord, EnrichmentError> {
        let (details, raw) = self
            .get_json::<dto::SeasonDetails>(&format!("/tv/{show_id}/season/{season}"), &[])
            .await?;
        Ok(adapter::season_record(details, raw))
    }

    pub async fn episode_details(
        &self,
        show_id: i64,
        season: u32,
        episode: u32,
    ) -> Result<MetadataRecord, EnrichmentError> {
        let (details, raw) = self
            .get_json::<dto::EpisodeDetails>(
                &format!("/tv/{show_id}/season/{season}/episode/{episode}"),
                &[],
            )
            .await?;
        Ok(adapter::episode_record(details, raw))
    }

    /// Download artwork bytes from the image CDN.
    pub async fn download_image(&self, remote_ref: &str) -> Result<Vec<u8>, EnrichmentError> {
        let url = self.image_url(remote_ref);
        let url = url.as_str();
        self.image_retry
            .run(&format!("image {remote_ref}"), || async move {
                let response = self
                    .http_client
                    .get(url)
                    .send()
                    .await
                    .map_err(EnrichmentError::from_reqwest)?;
                let response = check_status(response).await?;
                let bytes = response
                    .bytes()
                    .await
                    .map_err(EnrichmentError::from_reqwest)?;
                Ok(bytes.to_vec())
            })
            .await
    }

    /// Rate-limited, retried GET returning both the typed DTO and the raw
    /// payload.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<(T, serde_json::Value), EnrichmentError> {
        if self.api_key.is_empty() {
            return Err(EnrichmentError::MissingApiKey);
        }
        let url = format!("{}{}", self.base_url, path);
        let url = url.as_str();

        let raw = self
            .retry
            .run(path, || async move {
                self.limiter.until_ready().await;
                let response = self
                    .http_client
                    .get(url)
                    .query(&[
                        ("api_key", self.api_key.as_str()),
                        ("language", self.language.as_str()),
                    ])
                    .query(params)
                    .send()
                    .await
                    .map_err(EnrichmentError::from_reqwest)?;
                let response = check_status(response).await?;
                response
                    .json::<serde_json::Value>()
                    .await
                    .map_err(EnrichmentError::from_reqwest)
            })
            .await?;

        let typed = serde_json::from_value(raw.clone())
            .map_err(|e| EnrichmentError::Parse(format!("{path}: {e}")))?;
        Ok((typed, raw))
    }
}

/// Map a non-success response onto the error taxonomy.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, EnrichmentError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::NOT_FOUND {
        return Err(EnrichmentError::NotFound);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        return Err(EnrichmentError::RateLimited { retry_after });
    }

    let message = match response.json::<dto::ApiError>().await {
        Ok(err) => err
            .status_message
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown").to_string()),
        Err(_) => status.canonical_reason().unwrap_or("Unknown").to_string(),
    };
    Err(EnrichmentError::Http {
        status: status.as_u16(),
        message,
    })
}

/// `requests` per `window_secs`, allowing the whole window as a burst.
fn quota(requests: u32, window_secs: u64) -> Quota {
    let requests = NonZeroU32::new(requests).unwrap_or(NonZeroU32::MIN);
    let window = Duration::from_secs(window_secs.max(1));
    let period = window / requests.get();
    Quota::with_period(period)
        .map(|q| q.allow_burst(requests))
        .unwrap_or_else(|| Quota::per_second(requests))
}
