//! Core data models for the stream catalog.
//!
//! Defines the entities that flow through a run: [`StreamItem`] as fetched
//! from upstream, and [`ClassifiedItem`] once its name has been parsed for a
//! [`MediaCategory`].
//!
//! Both are re-fetched each run; nothing here is persisted.

mod parse;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};

pub use parse::{DEFAULT_EPISODE_PATTERN, DEFAULT_MOVIE_YEAR_PATTERN, NameParser, clean_always_on_title};

/// Media category a group (and its items) is processed as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaCategory {
    Movie,
    Episode,
    AlwaysOn,
}

impl MediaCategory {
    /// Value stored in the ledger's `stream_type` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Episode => "tv",
            Self::AlwaysOn => "24-7",
        }
    }

    /// Top-level folder under the output root.
    pub fn folder_name(&self) -> &'static str {
        match self {
            Self::Movie => "Movies",
            Self::Episode => "TV Shows",
            Self::AlwaysOn => "24-7",
        }
    }
}

impl fmt::Display for MediaCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "movie" | "movies" => Ok(Self::Movie),
            "tv" | "episode" | "series" => Ok(Self::Episode),
            "24-7" | "24/7" | "always_on" => Ok(Self::AlwaysOn),
            other => Err(format!("unknown media category: {other}")),
        }
    }
}

/// One entry from the upstream catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamItem {
    /// Upstream stream id
    pub id: i64,
    /// Raw display name, unparsed
    pub name: String,
    /// Direct playback URL (may be empty)
    pub url: String,
    /// Content hash used to build the proxied playback URL
    pub stream_hash: String,
    pub updated_at: Option<DateTime<Utc>>,
    /// Owning group name
    pub group: String,
}

impl StreamItem {
    /// Playback URL written to pointer files.
    ///
    /// Uses the upstream proxy when a content hash is known, otherwise the
    /// raw URL.
    pub fn playback_url(&self, api_base: &str, stream_base_url: &str) -> String {
        if self.stream_hash.is_empty() {
            return self.url.clone();
        }
        let raw = format!(
            "{}/{}/{}",
            api_base.trim_end_matches('/'),
            stream_base_url,
            self.stream_hash
        );
        normalize_url_path(&raw)
    }

    /// Whether the stream changed within the last `days` days, or today
    /// when no window is configured.
    pub fn updated_within(&self, days: Option<u32>, now: DateTime<Utc>) -> bool {
        let Some(updated_at) = self.updated_at else {
            return false;
        };
        match days {
            Some(days) if days > 0 => now - updated_at <= ChronoDuration::days(i64::from(days)),
            _ => updated_at.date_naive() == now.date_naive(),
        }
    }
}

/// A [`StreamItem`] with fields derived from its name.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedItem {
    pub item: StreamItem,
    pub category: MediaCategory,
    /// Movie title, show name, or channel name
    pub title: String,
    /// Movies only
    pub year: Option<i32>,
    /// Episodes only
    pub season: Option<u32>,
    pub episode: Option<u32>,
}

impl ClassifiedItem {
    pub fn id(&self) -> i64 {
        self.item.id
    }

    pub fn group(&self) -> &str {
        &self.item.group
    }
}

/// Collapse runs of `/` in the path part of a URL and percent-encode
/// unsafe path characters.
fn normalize_url_path(raw: &str) -> String {
    let (prefix, rest) = match raw.find("://") {
        Some(idx) => {
            let after_scheme = idx + 3;
            match raw[after_scheme..].find('/') {
                Some(slash) => raw.split_at(after_scheme + slash),
                None => return raw.to_string(),
            }
        }
        None => ("", raw),
    };

    let (path, query) = match rest.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (rest, None),
    };

    let mut encoded = String::with_capacity(path.len());
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        encoded.push('/');
        encoded.push_str(&urlencoding::encode(segment));
    }
    if path.ends_with('/') || encoded.is_empty() {
        encoded.push('/');
    }

    match query {
        Some(q) => format!("{prefix}{encoded}?{q}"),
        None => format!("{prefix}{encoded}"),
    }
}
