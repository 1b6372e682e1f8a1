//! TV groups: items grouped into show -> season -> episode.
//!
//! Show-level work (lookup, ledger checks, filtering, the show sidecar and
//! artwork) happens once per show. Episodes of a season then run through
//! the usual batches.

use std::collections::BTreeMap;

use super::PipelineEvent;
use super::runner::{LedgerCheck, Runner};
use super::stats::ItemOutcome;
use crate::enrichment::{Lookup, MetadataRecord};
use crate::model::{ClassifiedItem, MediaCategory};
use crate::organizer::MediaKey;

/// Episodes of one show, by season number.
pub(crate) type Seasons = BTreeMap<u32, Vec<ClassifiedItem>>;

/// Group episodes by show name, then season; episodes sorted by number.
pub(crate) fn group_by_show(items: Vec<ClassifiedItem>) -> BTreeMap<String, Seasons> {
    let mut shows: BTreeMap<String, Seasons> = BTreeMap::new();
    for item in items {
        let Some(season) = item.season else { continue };
        shows
            .entry(item.title.clone())
            .or_default()
            .entry(season)
            .or_default()
            .push(item);
    }
    for seasons in shows.values_mut() {
        for episodes in seasons.values_mut() {
            episodes.sort_by_key(|e| e.episode);
        }
    }
    shows
}

impl Runner {
    pub(super) async fn process_tv_group(&self, group: &str) {
        let Some(items) = self.fetch_group(MediaCategory::Episode, group).await else {
            return;
        };

        for (show, seasons) in group_by_show(items) {
            if self.is_cancelled() {
                tracing::info!(target: "pipeline", "Stopped '{}' before show '{}'", group, show);
                return;
            }
            self.process_show(group, &show, seasons).await;
        }
    }

    pub(crate) async fn process_show(&self, group: &str, name: &str, seasons: Seasons) {
        let episode_count: usize = seasons.values().map(Vec::len).sum();
        // Stands in for the whole show when it is written to the ledger.
        let Some(sample) = seasons.values().flatten().next() else {
            return;
        };
        let ctx = &self.ctx;

        // The recorded sample may no longer sort first once upstream adds
        // episodes, so every stream of the show is checked.
        let stream_ids: Vec<i64> = seasons.values().flatten().map(ClassifiedItem::id).collect();
        if self
            .ledger_says_skip(MediaCategory::Episode, LedgerCheck::Streams(&stream_ids))
            .await
        {
            tracing::debug!(target: "pipeline", "Skipping show '{}': in the ledger", name);
            self.counters.record_n(ItemOutcome::Skipped, episode_count);
            return;
        }

        let show = match ctx.resolver.search_show(name).await {
            Lookup::Found(show) => show,
            Lookup::NotFound => {
                tracing::info!(target: "pipeline", "No TMDB match for show '{}'", name);
                for episode in seasons.values().flatten() {
                    self.write_unmatched(episode).await;
                }
                self.counters.record_n(ItemOutcome::NotFound, episode_count);
                return;
            }
            Lookup::Failed(reason) => {
                tracing::warn!(target: "pipeline", "Lookup failed for show '{}': {}", name, reason);
                self.counters.record_n(ItemOutcome::Unavailable, episode_count);
                return;
            }
        };

        if self
            .ledger_says_skip(MediaCategory::Episode, LedgerCheck::Tmdb(show.id))
            .await
        {
            tracing::debug!(target: "pipeline", "Skipping show '{}': tmdb {} is in the ledger", name, show.id);
            self.counters.record_n(ItemOutcome::Skipped, episode_count);
            return;
        }

        let show_paths = ctx.materializer.show_paths(group, name);

        let failures = ctx.thresholds.failures(&show);
        if !failures.is_empty() {
            self.reject(
                MediaCategory::Episode,
                sample,
                &show,
                &failures,
                Some(&show_paths.folder),
            )
            .await;
            self.counters.record_n(ItemOutcome::Filtered, episode_count);
            return;
        }

        ctx.materializer.write_sidecar(&show_paths.sidecar, &show).await;
        tokio::join!(
            ctx.materializer
                .write_artwork_if_missing(show.poster_path.as_deref(), Some(&show_paths.poster)),
            ctx.materializer
                .write_artwork_if_missing(show.backdrop_path.as_deref(), Some(&show_paths.backdrop)),
        );

        if ctx.config.library.update_tv_series_nfo {
            tracing::debug!(target: "pipeline", "Series metadata only for '{}'", name);
            self.counters.record_n(ItemOutcome::Unchanged, episode_count);
            return;
        }

        for (number, episodes) in seasons {
            if self.is_cancelled() {
                return;
            }
            let season = match ctx.resolver.get_season(show.id, number).await {
                Lookup::Found(season) => season,
                Lookup::NotFound => {
                    tracing::warn!(target: "pipeline", "'{}' has no season {} on TMDB", name, number);
                    self.counters.record_n(ItemOutcome::NotFound, episodes.len());
                    continue;
                }
                Lookup::Failed(reason) => {
                    tracing::warn!(target: "pipeline", "Season {} of '{}' failed: {}", number, name, reason);
                    self.counters.record_n(ItemOutcome::Unavailable, episodes.len());
                    continue;
                }
            };

            if let Some(first) = episodes.first() {
                let paths = ctx.materializer.paths(&MediaKey::for_item(first, None));
                ctx.materializer
                    .write_artwork_if_missing(season.poster_path.as_deref(), paths.backdrop.as_deref())
                    .await;
            }

            let show = &show;
            let finished = self
                .run_batches(MediaCategory::Episode, group, episodes, |episode| async move {
                    self.process_episode(show, episode).await
                })
                .await;
            if !finished {
                return;
            }
        }

        self.emit(PipelineEvent::ShowComplete {
            group: group.to_string(),
            show: name.to_string(),
        })
        .await;
    }

    async fn process_episode(&self, show: &MetadataRecord, item: ClassifiedItem) -> ItemOutcome {
        let ctx = &self.ctx;
        let (Some(season), Some(number)) = (item.season, item.episode) else {
            return ItemOutcome::NotFound;
        };

        let episode = match ctx.resolver.get_episode(show.id, season, number).await {
            Lookup::Found(episode) => episode,
            Lookup::NotFound => {
                tracing::info!(target: "pipeline", "No TMDB data for '{}' S{:02}E{:02}", show.title, season, number);
                return ItemOutcome::NotFound;
            }
            Lookup::Failed(reason) => {
                tracing::warn!(target: "pipeline", "'{}' S{:02}E{:02} failed: {}", show.title, season, number, reason);
                return ItemOutcome::Unavailable;
            }
        };

        let paths = ctx.materializer.paths(&MediaKey::for_item(&item, None));
        let outcome = ctx
            .materializer
            .write_pointer(&paths.pointer, &ctx.playback_url(&item.item))
            .await;
        if !outcome.is_ok() {
            return outcome.into();
        }

        ctx.materializer.write_sidecar(&paths.sidecar, &episode).await;
        ctx.materializer
            .write_artwork_if_missing(episode.still_path.as_deref(), paths.poster.as_deref())
            .await;
        ctx.run_post_steps(&item, &episode, &paths).await;

        outcome.into()
    }
}
