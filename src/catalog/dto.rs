//! Data Transfer Objects for the stream manager API.
//!
//! These types mirror the JSON wire format exactly. They are used only for
//! deserialization and converted into [`StreamItem`] at the client
//! boundary.
//!
//! [`StreamItem`]: crate::model::StreamItem

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::StreamItem;

/// Body of the token endpoint request.
#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Token endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}

/// One page of `/api/channels/streams/`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamPage {
    #[serde(default)]
    pub count: Option<u64>,
    /// Absent or null on the last page
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub results: Vec<RawStream>,
}

/// A stream as the API returns it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawStream {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub stream_hash: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub channel_group: Option<i64>,
}

impl RawStream {
    /// Convert into the domain type, attaching the group it was listed
    /// under. Returns `None` for nameless entries.
    pub fn into_item(self, group: &str) -> Option<StreamItem> {
        let name = self.name.filter(|n| !n.trim().is_empty())?;
        let updated_at = self
            .updated_at
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));
        Some(StreamItem {
            id: self.id,
            name,
            url: self.url.unwrap_or_default(),
            stream_hash: self.stream_hash.unwrap_or_default(),
            updated_at,
            group: group.to_string(),
        })
    }
}
