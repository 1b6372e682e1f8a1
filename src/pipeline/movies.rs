//! Movie items: resolve, filter, materialize.

use super::runner::{LedgerCheck, Runner};
use super::stats::ItemOutcome;
use crate::enrichment::Lookup;
use crate::model::{ClassifiedItem, MediaCategory};
use crate::organizer::MediaKey;

impl Runner {
    pub(super) async fn process_movie(&self, item: ClassifiedItem) -> ItemOutcome {
        let ctx = &self.ctx;

        if self
            .ledger_says_skip(MediaCategory::Movie, LedgerCheck::Streams(&[item.id()]))
            .await
        {
            tracing::debug!(target: "pipeline", "Skipping '{}': stream {} is in the ledger", item.title, item.id());
            return ItemOutcome::Skipped;
        }

        let movie = match ctx.resolver.search_movie(&item.title, item.year).await {
            Lookup::Found(movie) => movie,
            Lookup::NotFound => {
                tracing::info!(
                    target: "pipeline",
                    "No TMDB match for '{}' ({})",
                    item.title,
                    item.year.map_or_else(|| "no year".to_string(), |y| y.to_string())
                );
                self.write_unmatched(&item).await;
                return ItemOutcome::NotFound;
            }
            Lookup::Failed(reason) => {
                tracing::warn!(target: "pipeline", "Lookup failed for '{}': {}", item.title, reason);
                return ItemOutcome::Unavailable;
            }
        };

        if self
            .ledger_says_skip(MediaCategory::Movie, LedgerCheck::Tmdb(movie.id))
            .await
        {
            tracing::debug!(target: "pipeline", "Skipping '{}': tmdb {} is in the ledger", movie.title, movie.id);
            return ItemOutcome::Skipped;
        }

        // Metadata may know the year the stream name left out.
        let key = MediaKey::for_item(&item, item.year.or(movie.year()));
        let paths = ctx.materializer.paths(&key);

        let failures = ctx.thresholds.failures(&movie);
        if !failures.is_empty() {
            let folder = key.owns_folder().then_some(paths.base_folder.as_path());
            self.reject(MediaCategory::Movie, &item, &movie, &failures, folder)
                .await;
            return ItemOutcome::Filtered;
        }

        let outcome = ctx
            .materializer
            .write_pointer(&paths.pointer, &ctx.playback_url(&item.item))
            .await;
        if !outcome.is_ok() {
            return outcome.into();
        }

        ctx.materializer.write_sidecar(&paths.sidecar, &movie).await;
        tokio::join!(
            ctx.materializer
                .write_artwork_if_missing(movie.poster_path.as_deref(), paths.poster.as_deref()),
            ctx.materializer
                .write_artwork_if_missing(movie.backdrop_path.as_deref(), paths.backdrop.as_deref()),
        );
        ctx.run_post_steps(&item, &movie, &paths).await;

        outcome.into()
    }
}
