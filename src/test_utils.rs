//! Test utilities and fixtures for strmgen tests.
//!
//! Common helpers, mock factories and database utilities shared by the
//! unit tests of every module.
//!
//! # Example
//!
//! ```ignore
//! use crate::test_utils::{temp_ledger, mock_movie_record, mock_stream};
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let (ledger, _dir) = temp_ledger().await;
//!     let record = mock_movie_record(550, "Fight Club", 1999);
//!     // ... test logic
//! }
//! ```

use sqlx::sqlite::SqlitePool;
use tempfile::TempDir;

use crate::config::Config;
use crate::db::SqliteLedger;
use crate::enrichment::{MetadataRecord, RecordKind};
use crate::model::StreamItem;

/// Creates a temporary database for testing.
///
/// The database lives in a temporary directory that is cleaned up when the
/// returned `TempDir` is dropped. Migrations are run automatically.
/// Keep the TempDir alive for the duration of your test.
pub async fn temp_db() -> (SqlitePool, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp directory");
    let db_path = dir.path().join("test.db");
    let db_url = format!("sqlite:{}", db_path.display());

    let pool = crate::db::init_db(&db_url)
        .await
        .expect("Failed to initialize test database");

    (pool, dir)
}

/// A ledger over a fresh temporary database.
pub async fn temp_ledger() -> (SqliteLedger, TempDir) {
    let (pool, dir) = temp_db().await;
    (SqliteLedger::new(pool), dir)
}

/// Config with output rooted in `root` and every network knob turned down.
///
/// Artwork and threshold checks are on and untitled items get no pointer,
/// so tests opt out of those explicitly.
pub fn test_config(root: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.library.output_root = root.to_path_buf();
    config.library.download_images = true;
    config.filters.enabled = true;
    config.tmdb.create_not_found = false;
    config.upstream.api_base = "http://dispatch.test".to_string();
    config.upstream.stream_base_url = "proxy/ts/stream/".to_string();
    config.pipeline.batch_delay_seconds = 0.0;
    config
}

/// Creates a StreamItem with the given id, raw name and group.
///
/// The stream hash is derived from the id, so playback URLs are stable and
/// distinct per item.
pub fn mock_stream(id: i64, name: &str, group: &str) -> StreamItem {
    StreamItem {
        id,
        name: name.to_string(),
        url: format!("http://provider.test/live/{id}.ts"),
        stream_hash: format!("hash{id}"),
        updated_at: None,
        group: group.to_string(),
    }
}

/// Creates a movie record that passes the default quality filters.
///
/// Customize with struct update syntax:
///
/// ```ignore
/// let obscure = MetadataRecord {
///     vote_count: 0,
///     ..mock_movie_record(1, "Obscure", 2020)
/// };
/// ```
pub fn mock_movie_record(id: i64, title: &str, year: i32) -> MetadataRecord {
    MetadataRecord {
        kind: RecordKind::Movie,
        id,
        title: title.to_string(),
        original_title: Some(title.to_string()),
        overview: format!("{title} overview"),
        poster_path: Some(format!("/poster{id}.jpg")),
        backdrop_path: Some(format!("/backdrop{id}.jpg")),
        vote_average: 7.5,
        vote_count: 1200,
        popularity: 35.0,
        release_date: Some(format!("{year}-01-01")),
        original_language: Some("en".to_string()),
        genres: vec!["Drama".to_string()],
        runtime: Some(120),
        ..Default::default()
    }
}

/// Creates a show record that passes the default quality filters.
pub fn mock_show_record(id: i64, title: &str) -> MetadataRecord {
    MetadataRecord {
        kind: RecordKind::Show,
        id,
        title: title.to_string(),
        original_title: Some(title.to_string()),
        overview: format!("{title} overview"),
        poster_path: Some(format!("/show{id}.jpg")),
        backdrop_path: Some(format!("/showbg{id}.jpg")),
        vote_average: 8.0,
        vote_count: 900,
        popularity: 50.0,
        release_date: Some("2015-09-01".to_string()),
        original_language: Some("en".to_string()),
        genres: vec!["Drama".to_string()],
        status: Some("Ended".to_string()),
        ..Default::default()
    }
}

/// Creates an episode record numbered `season`x`episode`.
pub fn mock_episode_record(season: u32, episode: u32, title: &str) -> MetadataRecord {
    MetadataRecord {
        kind: RecordKind::Episode,
        id: i64::from(season * 1000 + episode),
        title: title.to_string(),
        overview: format!("{title} overview"),
        still_path: Some(format!("/still{season}x{episode}.jpg")),
        vote_average: 7.0,
        vote_count: 10,
        release_date: Some("2016-01-01".to_string()),
        season_number: Some(season),
        episode_number: Some(episode),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SkipLedger;

    #[tokio::test]
    async fn test_temp_ledger_starts_empty() {
        let (ledger, _dir) = temp_ledger().await;
        assert!(ledger.list(None).await.unwrap().is_empty());
    }

    #[test]
    fn test_mock_records() {
        let movie = mock_movie_record(42, "Some Film", 2019);
        assert_eq!(movie.year(), Some(2019));
        assert_eq!(movie.kind, RecordKind::Movie);

        let ep = mock_episode_record(2, 5, "Five");
        assert_eq!(ep.season_number, Some(2));
        assert_eq!(ep.episode_number, Some(5));
    }

    #[test]
    fn test_mock_stream_has_hash() {
        let stream = mock_stream(3, "Film (2001)", "Movies");
        assert_eq!(stream.stream_hash, "hash3");
        assert_eq!(stream.group, "Movies");
    }
}
