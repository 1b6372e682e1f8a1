//! Internal domain models for metadata resolution.
//!
//! These types are OUR types - they don't change when the TMDB API changes.
//! All provider responses get converted into these types via the adapter.

use std::time::Duration;

/// What a [`MetadataRecord`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordKind {
    #[default]
    Movie,
    Show,
    Season,
    Episode,
}

/// Canonical third-party metadata for a movie, show, season or episode.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataRecord {
    pub kind: RecordKind,
    /// TMDB id
    pub id: i64,
    /// Display title (movie title, show name, episode name)
    pub title: String,
    pub original_title: Option<String>,
    pub overview: String,
    /// Remote artwork references (provider paths, not URLs)
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub still_path: Option<String>,
    pub vote_average: f64,
    pub vote_count: u64,
    pub popularity: f64,
    /// Release or first-air date, `YYYY-MM-DD`
    pub release_date: Option<String>,
    pub original_language: Option<String>,
    pub genres: Vec<String>,
    pub studios: Vec<String>,
    pub countries: Vec<String>,
    pub status: Option<String>,
    /// Minutes
    pub runtime: Option<u32>,
    pub season_number: Option<u32>,
    pub episode_number: Option<u32>,
    /// Seasons only: the episodes listed with the season
    pub episodes: Vec<MetadataRecord>,
    /// Provider payload, kept for template rendering
    pub raw: serde_json::Value,
}

impl MetadataRecord {
    /// Year from the release/air date.
    pub fn year(&self) -> Option<i32> {
        self.release_date
            .as_deref()
            .and_then(|d| d.get(..4))
            .and_then(|y| y.parse().ok())
    }

    /// Find an episode listed with this season.
    pub fn episode(&self, number: u32) -> Option<&MetadataRecord> {
        self.episodes
            .iter()
            .find(|e| e.episode_number == Some(number))
    }
}

/// A single search hit before details are fetched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchHit {
    pub id: i64,
    pub title: String,
    /// `movie`, `tv` or `person` for multi-search hits
    pub media_type: Option<String>,
    pub release_date: Option<String>,
    pub popularity: f64,
}

/// Outcome of a metadata lookup.
///
/// Keeps "nothing matched" apart from "the provider failed", so a network
/// problem is never mistaken for a filtered item.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
    Failed(String),
}

impl<T> Lookup<T> {
    pub fn found(self) -> Option<T> {
        match self {
            Self::Found(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    /// `NotFound` for a provider miss, `Failed` for anything else.
    pub fn from_error(error: EnrichmentError) -> Self {
        match error {
            EnrichmentError::NotFound => Self::NotFound,
            e => Self::Failed(e.to_string()),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Lookup<U> {
        match self {
            Self::Found(v) => Lookup::Found(f(v)),
            Self::NotFound => Lookup::NotFound,
            Self::Failed(reason) => Lookup::Failed(reason),
        }
    }
}

impl<T> From<Result<T, EnrichmentError>> for Lookup<T> {
    fn from(result: Result<T, EnrichmentError>) -> Self {
        match result {
            Ok(v) => Self::Found(v),
            Err(e) => Self::from_error(e),
        }
    }
}

/// Errors that can occur talking to the metadata provider
#[derive(Debug, Clone, thiserror::Error)]
pub enum EnrichmentError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Rate limited - try again later")]
    RateLimited { retry_after: Option<Duration> },

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Not found")]
    NotFound,

    #[error("Metadata unavailable after retries: {0}")]
    Unavailable(String),

    #[error("No TMDB API key configured")]
    MissingApiKey,

    #[error("Failed to write image: {0}")]
    Io(String),
}

impl EnrichmentError {
    /// Worth another attempt: rate limiting, transient transport failures
    /// and server-side errors.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) | Self::RateLimited { .. } => true,
            Self::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Connection-level failures only (no status from the server).
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout(_))
    }

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
