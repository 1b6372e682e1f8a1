//! Forced second attempt for a ledger entry.
//!
//! The entry's reprocess flag is switched on first, so the ledger checks
//! let the item through. If it fails the filter again it is re-marked and
//! the flag drops back to off; if it passes, the flag stays on and later
//! runs keep processing it.

use super::runner::Runner;
use super::tv::group_by_show;
use crate::db::SkipRecord;
use crate::error::Result;
use crate::model::MediaCategory;

impl Runner {
    /// Reprocess the item behind `tmdb_id`. Returns false when the ledger
    /// has no such entry.
    pub(crate) async fn reprocess(&self, tmdb_id: i64) -> Result<bool> {
        let ctx = &self.ctx;
        let Some(record) = ctx.ledger.get(tmdb_id).await? else {
            tracing::warn!(target: "pipeline", "No ledger entry for tmdb {}", tmdb_id);
            return Ok(false);
        };
        ctx.ledger.set_reprocess(tmdb_id, true).await?;
        tracing::info!(
            target: "pipeline",
            "Reprocessing {} '{}' (tmdb {})",
            record.category,
            record.name,
            record.tmdb_id
        );

        match record.category {
            MediaCategory::Movie => self.reprocess_movie(&record).await?,
            MediaCategory::Episode => self.reprocess_show(&record).await?,
            MediaCategory::AlwaysOn => {
                tracing::debug!(target: "pipeline", "Always-on entries have nothing to reprocess");
            }
        }
        Ok(true)
    }

    async fn reprocess_movie(&self, record: &SkipRecord) -> Result<()> {
        let ctx = &self.ctx;
        let mut stream = ctx.catalog.get_stream(record.dispatcharr_id).await?;
        stream.group = record.group_name.clone();

        match ctx.parser.classify(stream, MediaCategory::Movie) {
            Some(item) => {
                let outcome = self.process_movie(item).await;
                self.counters.record(outcome);
                tracing::info!(target: "pipeline", "Reprocessed movie '{}': {:?}", record.name, outcome);
            }
            None => {
                tracing::warn!(target: "pipeline", "Stream {} no longer parses as a movie", record.dispatcharr_id);
            }
        }
        Ok(())
    }

    /// The ledger keeps one sample stream per show; its name identifies
    /// which of the group's shows to run again.
    async fn reprocess_show(&self, record: &SkipRecord) -> Result<()> {
        let ctx = &self.ctx;
        let mut stream = ctx.catalog.get_stream(record.dispatcharr_id).await?;
        stream.group = record.group_name.clone();
        let Some(sample) = ctx.parser.classify(stream, MediaCategory::Episode) else {
            tracing::warn!(target: "pipeline", "Stream {} no longer parses as an episode", record.dispatcharr_id);
            return Ok(());
        };

        let items = ctx
            .catalog
            .fetch_group_items(&record.group_name, MediaCategory::Episode)
            .await?;
        let mut shows = group_by_show(items);
        match shows.remove(&sample.title) {
            Some(seasons) => {
                self.process_show(&record.group_name, &sample.title, seasons).await;
                tracing::info!(target: "pipeline", "Reprocessed show '{}': {}", record.name, self.stats());
            }
            None => {
                tracing::warn!(
                    target: "pipeline",
                    "No streams left for '{}' in '{}'",
                    sample.title,
                    record.group_name
                );
            }
        }
        Ok(())
    }
}
