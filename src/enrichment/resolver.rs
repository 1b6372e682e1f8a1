//! Metadata resolver - turns parsed names into TMDB records.
//!
//! One instance per process, injected wherever resolution is needed. It
//! holds the process-lifetime caches and the artwork download budget:
//!
//! - Movies are cached by `(normalized title, year)`, shows by normalized
//!   name, seasons and episodes by id. Misses (`NotFound`) are cached too;
//!   provider failures are not, so the next item retries.
//! - Concurrent misses on the same key may both fetch; the last write wins
//!   and either value is correct.
//! - Artwork downloads take a permit from their own semaphore so they can't
//!   crowd out the enrichment workers.

use std::collections::HashMap;
use std::hash::Hash;
use std::path::Path;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use parking_lot::RwLock;
use tokio::sync::Semaphore;

use super::domain::{EnrichmentError, Lookup, MetadataRecord, SearchHit};
use super::scoring::{movie_score, name_similarity, normalize_title, pick_best};
use super::traits::MetadataApi;

/// Resolver tuning.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Candidate detail fetches in flight per movie search
    pub search_fanout: usize,
    /// Simultaneous artwork downloads
    pub image_concurrency: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            search_fanout: 5,
            image_concurrency: 4,
        }
    }
}

type MovieKey = (String, Option<i32>);

/// Cached, rate-limit-aware access to the metadata provider.
pub struct MetadataResolver {
    api: Arc<dyn MetadataApi>,
    config: ResolverConfig,
    movies: RwLock<HashMap<MovieKey, Option<MetadataRecord>>>,
    shows: RwLock<HashMap<String, Option<MetadataRecord>>>,
    seasons: RwLock<HashMap<(i64, u32), MetadataRecord>>,
    episodes: RwLock<HashMap<(i64, u32, u32), MetadataRecord>>,
    image_permits: Arc<Semaphore>,
}

impl MetadataResolver {
    pub fn new(api: Arc<dyn MetadataApi>, config: ResolverConfig) -> Self {
        let permits = config.image_concurrency.max(1);
        Self {
            api,
            config,
            movies: RwLock::new(HashMap::new()),
            shows: RwLock::new(HashMap::new()),
            seasons: RwLock::new(HashMap::new()),
            episodes: RwLock::new(HashMap::new()),
            image_permits: Arc::new(Semaphore::new(permits)),
        }
    }

    /// Drop every cached entry.
    pub fn reset(&self) {
        self.movies.write().clear();
        self.shows.write().clear();
        self.seasons.write().clear();
        self.episodes.write().clear();
    }

    /// Best movie match for `title`, optionally pinned to `year`.
    ///
    /// Every search hit is expanded to full details. With a year, only
    /// candidates released that year survive; the rest are scored by
    /// [`movie_score`] and the highest wins.
    pub async fn search_movie(&self, title: &str, year: Option<i32>) -> Lookup<MetadataRecord> {
        let key = (normalize_title(title), year);
        if let Some(cached) = cache_get(&self.movies, &key) {
            return cached.map_or(Lookup::NotFound, Lookup::Found);
        }

        let hits = match self.api.search_movie(title, year).await {
            Ok(hits) => hits,
            Err(EnrichmentError::NotFound) => Vec::new(),
            Err(e) => return Lookup::Failed(e.to_string()),
        };
        if hits.is_empty() {
            tracing::debug!(target: "tmdb", "No movie results for '{}' ({:?})", title, year);
            self.movies.write().insert(key, None);
            return Lookup::NotFound;
        }

        let details: Vec<Result<MetadataRecord, EnrichmentError>> = stream::iter(hits)
            .map(|hit| async move { self.api.movie_details(hit.id).await })
            .buffered(self.config.search_fanout.max(1))
            .collect()
            .await;

        let mut failure = None;
        let mut candidates = Vec::with_capacity(details.len());
        for result in details {
            match result {
                Ok(record) => candidates.push(record),
                Err(EnrichmentError::NotFound) => {}
                Err(e) => {
                    tracing::debug!(target: "tmdb", "Candidate detail fetch failed: {}", e);
                    failure = Some(e);
                }
            }
        }

        if candidates.is_empty() {
            if let Some(e) = failure {
                return Lookup::Failed(e.to_string());
            }
        }

        if let Some(wanted) = year {
            candidates.retain(|c| c.year() == Some(wanted));
        }

        match pick_best(candidates, |c| movie_score(title, year, c)) {
            Some((best, score)) => {
                tracing::debug!(
                    target: "tmdb",
                    "Matched '{}' ({:?}) -> {} [{}] score {:.3}",
                    title,
                    year,
                    best.title,
                    best.id,
                    score
                );
                self.movies.write().insert(key, Some(best.clone()));
                Lookup::Found(best)
            }
            None => {
                self.movies.write().insert(key, None);
                Lookup::NotFound
            }
        }
    }

    /// Best show match for `name`. Hits flagged as TV are preferred.
    pub async fn search_show(&self, name: &str) -> Lookup<MetadataRecord> {
        let key = normalize_title(name);
        if let Some(cached) = cache_get(&self.shows, &key) {
            return cached.map_or(Lookup::NotFound, Lookup::Found);
        }

        let hits = match self.api.search_multi(name).await {
            Ok(hits) => hits,
            Err(EnrichmentError::NotFound) => Vec::new(),
            Err(e) => return Lookup::Failed(e.to_string()),
        };

        let Some(best) = best_by_name(name, prefer_tv(hits)) else {
            self.shows.write().insert(key, None);
            return Lookup::NotFound;
        };

        match self.api.tv_details(best.id).await {
            Ok(show) => {
                self.shows.write().insert(key, Some(show.clone()));
                Lookup::Found(show)
            }
            Err(EnrichmentError::NotFound) => {
                self.shows.write().insert(key, None);
                Lookup::NotFound
            }
            Err(e) => Lookup::Failed(e.to_string()),
        }
    }

    /// Best match of any kind, for always-on channels.
    pub async fn search_any(&self, name: &str) -> Lookup<MetadataRecord> {
        let hits = match self.api.search_multi(name).await {
            Ok(hits) => hits,
            Err(EnrichmentError::NotFound) => return Lookup::NotFound,
            Err(e) => return Lookup::Failed(e.to_string()),
        };
        let hits: Vec<SearchHit> = hits
            .into_iter()
            .filter(|h| matches!(h.media_type.as_deref(), Some("movie") | Some("tv")))
            .collect();

        let wanted = normalize_title(name);
        let exact = hits
            .iter()
            .find(|h| normalize_title(&h.title) == wanted)
            .cloned();
        let Some(hit) = exact.or_else(|| best_by_name(name, hits)) else {
            return Lookup::NotFound;
        };

        let details = if hit.media_type.as_deref() == Some("tv") {
            self.api.tv_details(hit.id).await
        } else {
            self.api.movie_details(hit.id).await
        };
        details.into()
    }

    pub async fn get_season(&self, show_id: i64, season: u32) -> Lookup<MetadataRecord> {
        if let Some(record) = cache_get(&self.seasons, &(show_id, season)) {
            return Lookup::Found(record);
        }
        match self.api.season_details(show_id, season).await {
            Ok(record) => {
                {
                    let mut episodes = self.episodes.write();
                    for ep in &record.episodes {
                        if let Some(number) = ep.episode_number {
                            episodes.insert((show_id, season, number), ep.clone());
                        }
                    }
                }
                self.seasons.write().insert((show_id, season), record.clone());
                Lookup::Found(record)
            }
            Err(e) => Lookup::from_error(e),
        }
    }

    /// Episode details; served from an already-fetched season when possible.
    pub async fn get_episode(
        &self,
        show_id: i64,
        season: u32,
        episode: u32,
    ) -> Lookup<MetadataRecord> {
        let key = (show_id, season, episode);
        if let Some(record) = cache_get(&self.episodes, &key) {
            return Lookup::Found(record);
        }
        match self.api.episode_details(show_id, season, episode).await {
            Ok(record) => {
                self.episodes.write().insert(key, record.clone());
                Lookup::Found(record)
            }
            Err(e) => Lookup::from_error(e),
        }
    }

    /// Download artwork to `dest` unless it already exists.
    ///
    /// Returns whether a file was written.
    pub async fn fetch_image(&self, remote_ref: &str, dest: &Path) -> Result<bool, EnrichmentError> {
        if tokio::fs::try_exists(dest).await.unwrap_or(false) {
            return Ok(false);
        }

        let _permit = self
            .image_permits
            .acquire()
            .await
            .map_err(|e| EnrichmentError::Io(e.to_string()))?;

        // Another task may have finished the same file while we waited.
        if tokio::fs::try_exists(dest).await.unwrap_or(false) {
            return Ok(false);
        }

        let bytes = self.api.download_image(remote_ref).await?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| EnrichmentError::Io(format!("{}: {e}", parent.display())))?;
        }
        let temp = dest.with_extension("part");
        tokio::fs::write(&temp, &bytes)
            .await
            .map_err(|e| EnrichmentError::Io(format!("{}: {e}", temp.display())))?;
        tokio::fs::rename(&temp, dest)
            .await
            .map_err(|e| EnrichmentError::Io(format!("{}: {e}", dest.display())))?;

        tracing::debug!(target: "tmdb", "Saved artwork {}", dest.display());
        Ok(true)
    }
}

fn cache_get<K: Eq + Hash, V: Clone>(map: &RwLock<HashMap<K, V>>, key: &K) -> Option<V> {
    map.read().get(key).cloned()
}

/// TV-flagged hits when there are any, otherwise everything but people.
fn prefer_tv(hits: Vec<SearchHit>) -> Vec<SearchHit> {
    let (tv, other): (Vec<_>, Vec<_>) = hits
        .into_iter()
        .filter(|h| h.media_type.as_deref() != Some("person"))
        .partition(|h| h.media_type.as_deref() == Some("tv"));
    if tv.is_empty() { other } else { tv }
}

fn best_by_name(name: &str, hits: Vec<SearchHit>) -> Option<SearchHit> {
    pick_best(hits, |h| name_similarity(name, &h.title)).map(|(hit, _)| hit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::domain::RecordKind;
    use crate::enrichment::traits::mocks::{CallCounts, MockMetadataApi};
    use crate::test_utils::{mock_episode_record, mock_movie_record, mock_show_record};

    fn resolver(api: Arc<MockMetadataApi>) -> MetadataResolver {
        MetadataResolver::new(api, ResolverConfig::default())
    }

    #[tokio::test]
    async fn test_year_filter_picks_matching_release() {
        // The 2021 remake has the closer name; the year pins the 2019 film
        let api = Arc::new(
            MockMetadataApi::no_matches()
                .with_movie("Some Film", mock_movie_record(1, "Some Films", 2019))
                .with_movie("Some Film", mock_movie_record(2, "Some Film", 2021)),
        );
        let resolver = resolver(api.clone());

        let found = resolver.search_movie("Some Film", Some(2019)).await.found().unwrap();
        assert_eq!(found.id, 1);
        assert_eq!(CallCounts::get(&api.calls.movie_details), 2);
    }

    #[tokio::test]
    async fn test_without_year_best_name_wins() {
        let api = Arc::new(
            MockMetadataApi::no_matches()
                .with_movie("Some Film", mock_movie_record(1, "Another Thing", 2019))
                .with_movie("Some Film", mock_movie_record(2, "Some Film", 2021)),
        );
        let found = resolver(api).search_movie("Some Film", None).await.found().unwrap();
        assert_eq!(found.id, 2);
    }

    #[tokio::test]
    async fn test_no_year_match_is_not_found() {
        let api = Arc::new(
            MockMetadataApi::no_matches()
                .with_movie("Some Film", mock_movie_record(2, "Some Film", 2021)),
        );
        let result = resolver(api).search_movie("Some Film", Some(1985)).await;
        assert_eq!(result, Lookup::NotFound);
    }

    #[tokio::test]
    async fn test_movie_results_are_cached() {
        let api = Arc::new(
            MockMetadataApi::no_matches()
                .with_movie("Some Film", mock_movie_record(1, "Some Film", 2019)),
        );
        let resolver = resolver(api.clone());

        assert!(resolver.search_movie("Some Film", Some(2019)).await.is_found());
        assert!(resolver.search_movie("some film", Some(2019)).await.is_found());
        assert_eq!(CallCounts::get(&api.calls.search_movie), 1);

        // Misses are cached as well
        resolver.search_movie("Nothing", None).await;
        resolver.search_movie("Nothing", None).await;
        assert_eq!(CallCounts::get(&api.calls.search_movie), 2);

        resolver.reset();
        resolver.search_movie("Some Film", Some(2019)).await;
        assert_eq!(CallCounts::get(&api.calls.search_movie), 3);
    }

    #[tokio::test]
    async fn test_provider_failure_is_failed_and_not_cached() {
        let api = Arc::new(MockMetadataApi::with_error(EnrichmentError::Unavailable(
            "search: rate limited".into(),
        )));
        let resolver = resolver(api.clone());

        let result = resolver.search_movie("Some Film", None).await;
        assert!(matches!(result, Lookup::Failed(_)));
        resolver.search_movie("Some Film", None).await;
        assert_eq!(CallCounts::get(&api.calls.search_movie), 2);
    }

    #[tokio::test]
    async fn test_show_search_prefers_tv_hits() {
        let api = Arc::new(
            MockMetadataApi::no_matches()
                .with_multi_hit(
                    "Dark",
                    SearchHit {
                        id: 99,
                        title: "Dark".into(),
                        media_type: Some("movie".into()),
                        ..Default::default()
                    },
                )
                .with_show("Dark", mock_show_record(70523, "Dark Matter")),
        );
        let resolver = resolver(api.clone());
        let show = resolver.search_show("Dark").await.found().unwrap();
        assert_eq!(show.id, 70523);
        assert_eq!(show.kind, RecordKind::Show);

        resolver.search_show("Dark").await;
        assert_eq!(CallCounts::get(&api.calls.search_multi), 1);
    }

    #[tokio::test]
    async fn test_season_fetch_fills_episode_cache() {
        let mut season = MetadataRecord {
            kind: RecordKind::Season,
            season_number: Some(1),
            ..Default::default()
        };
        season.episodes = vec![mock_episode_record(1, 1, "Pilot"), mock_episode_record(1, 2, "Two")];
        let api = Arc::new(MockMetadataApi::no_matches().with_season(10, season));
        let resolver = resolver(api.clone());

        assert!(resolver.get_season(10, 1).await.is_found());
        let ep = resolver.get_episode(10, 1, 2).await.found().unwrap();
        assert_eq!(ep.title, "Two");
        assert_eq!(CallCounts::get(&api.calls.episode_details), 0);

        // Not listed with the season: direct fetch, which misses here
        assert_eq!(resolver.get_episode(10, 1, 3).await, Lookup::NotFound);
        assert_eq!(CallCounts::get(&api.calls.episode_details), 1);
    }

    #[tokio::test]
    async fn test_search_any_exact_match() {
        let api = Arc::new(
            MockMetadataApi::no_matches()
                .with_multi_hit(
                    "Nature",
                    SearchHit {
                        id: 5,
                        title: "Nature".into(),
                        media_type: Some("tv".into()),
                        ..Default::default()
                    },
                )
                .with_show("Other", mock_show_record(5, "Nature")),
        );
        let found = resolver(api).search_any("Nature").await.found().unwrap();
        assert_eq!(found.id, 5);
    }

    #[tokio::test]
    async fn test_fetch_image_skips_existing() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(MockMetadataApi::no_matches());
        let resolver = resolver(api.clone());
        let dest = dir.path().join("Movies").join("poster.jpg");

        assert!(resolver.fetch_image("/p.jpg", &dest).await.unwrap());
        assert_eq!(std::fs::read(&dest).unwrap(), b"image:/p.jpg");
        assert!(!dest.with_extension("part").exists());

        assert!(!resolver.fetch_image("/p.jpg", &dest).await.unwrap());
        assert_eq!(CallCounts::get(&api.calls.download_image), 1);
    }
}
