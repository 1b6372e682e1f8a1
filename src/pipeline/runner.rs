//! One pipeline pass over the upstream catalog.
//!
//! Order of work: groups are listed and partitioned, then always-on
//! groups, movie groups and finally TV groups are processed, each in
//! discovery order. Within a group, items run in fixed-size batches;
//! batch N+1 starts only after batch N has drained and the configured
//! delay has passed. Cancellation is observed before every batch and
//! before every item, never in the middle of one.

use std::collections::HashSet;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use futures::StreamExt;
use futures::stream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::PipelineEvent;
use super::context::PipelineContext;
use super::stats::{ItemOutcome, RunCounters, RunStats};
use crate::enrichment::MetadataRecord;
use crate::model::{ClassifiedItem, MediaCategory};
use crate::organizer::MediaKey;

pub(crate) struct Runner {
    pub(super) ctx: Arc<PipelineContext>,
    cancel: CancellationToken,
    events: Option<mpsc::Sender<PipelineEvent>>,
    pub(super) counters: RunCounters,
}

impl Runner {
    pub fn new(
        ctx: Arc<PipelineContext>,
        cancel: CancellationToken,
        events: Option<mpsc::Sender<PipelineEvent>>,
    ) -> Self {
        Self {
            ctx,
            cancel,
            events,
            counters: RunCounters::default(),
        }
    }

    pub fn stats(&self) -> RunStats {
        self.counters.snapshot()
    }

    pub(super) fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub(super) async fn emit(&self, event: PipelineEvent) {
        if let Some(ref tx) = self.events {
            let _ = tx.send(event).await;
        }
    }

    /// Full pass. Never fails: problems are logged and counted, and only
    /// a failure to list groups ends the pass early.
    pub async fn run(&self) -> RunStats {
        tracing::info!(target: "pipeline", "Pipeline run started");
        self.emit(PipelineEvent::RunStarted).await;

        match self.ctx.catalog.fetch_groups().await {
            Ok(groups) => self.run_groups(groups).await,
            Err(e) => {
                tracing::error!(target: "pipeline", "Could not list stream groups, aborting run: {}", e);
            }
        }

        let stats = self.stats();
        let cancelled = self.is_cancelled();
        if cancelled {
            tracing::info!(target: "pipeline", "Pipeline run stopped: {}", stats);
        } else {
            tracing::info!(target: "pipeline", "Pipeline run finished: {}", stats);
        }
        self.emit(PipelineEvent::RunFinished { stats, cancelled }).await;
        stats
    }

    async fn run_groups(&self, groups: Vec<String>) {
        let discovered = groups.len();
        let plan = self.ctx.groups.partition(groups);
        tracing::info!(
            target: "pipeline",
            "{} of {} groups selected ({} always-on, {} movie, {} TV)",
            plan.len(),
            discovered,
            plan.always_on.len(),
            plan.movies.len(),
            plan.tv.len()
        );
        self.emit(PipelineEvent::GroupsPlanned {
            always_on: plan.always_on.len(),
            movies: plan.movies.len(),
            tv: plan.tv.len(),
        })
        .await;

        for group in &plan.always_on {
            if self.is_cancelled() {
                return;
            }
            self.process_batched_group(MediaCategory::AlwaysOn, group).await;
        }
        for group in &plan.movies {
            if self.is_cancelled() {
                return;
            }
            self.process_batched_group(MediaCategory::Movie, group).await;
        }
        for group in &plan.tv {
            if self.is_cancelled() {
                return;
            }
            self.process_tv_group(group).await;
        }
    }

    /// Movies and always-on channels: one flat list of items per group.
    async fn process_batched_group(&self, category: MediaCategory, group: &str) {
        let Some(items) = self.fetch_group(category, group).await else {
            return;
        };

        self.run_batches(category, group, items, |item| async move {
            match category {
                MediaCategory::Movie => self.process_movie(item).await,
                MediaCategory::AlwaysOn => self.process_always_on(item).await,
                MediaCategory::Episode => ItemOutcome::Skipped,
            }
        })
        .await;
    }

    /// Fetch, update-window filter and dedupe one group's items. `None`
    /// when the group couldn't be listed; the failure is already logged.
    pub(super) async fn fetch_group(
        &self,
        category: MediaCategory,
        group: &str,
    ) -> Option<Vec<ClassifiedItem>> {
        let items = match self.ctx.catalog.fetch_group_items(group, category).await {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(target: "pipeline", "Skipping group '{}': {}", group, e);
                return None;
            }
        };

        let items = dedupe(self.retain_updated(items));
        tracing::info!(
            target: "pipeline",
            "Processing {} group '{}' ({} items)",
            category,
            group,
            items.len()
        );
        self.emit(PipelineEvent::GroupStarted {
            category,
            group: group.to_string(),
            items: items.len(),
        })
        .await;
        Some(items)
    }

    /// Drop items outside the update window when only updated streams
    /// are wanted; they count as skipped.
    fn retain_updated(&self, items: Vec<ClassifiedItem>) -> Vec<ClassifiedItem> {
        let config = &self.ctx.config.pipeline;
        if !config.only_updated_streams {
            return items;
        }
        let now = Utc::now();
        let (fresh, stale): (Vec<_>, Vec<_>) = items
            .into_iter()
            .partition(|i| i.item.updated_within(config.last_modified_days, now));
        if !stale.is_empty() {
            tracing::debug!(target: "pipeline", "{} items outside the update window", stale.len());
            self.counters.record_n(ItemOutcome::Skipped, stale.len());
        }
        fresh
    }

    /// Run `work` over `items` in batches of `batch_size`, at most
    /// `concurrent_requests` at a time, pausing `batch_delay` between
    /// batches. Returns false if cancelled before every batch ran.
    pub(super) async fn run_batches<T, F, Fut>(
        &self,
        category: MediaCategory,
        group: &str,
        items: Vec<T>,
        work: F,
    ) -> bool
    where
        F: Fn(T) -> Fut,
        Fut: Future<Output = ItemOutcome>,
    {
        let config = &self.ctx.config.pipeline;
        let batch_size = config.batch_size.max(1);
        let workers = config.concurrent_requests.max(1);
        let delay = config.batch_delay();
        let batches = items.len().div_ceil(batch_size);

        let mut items = items.into_iter();
        for index in 0..batches {
            if self.is_cancelled() {
                tracing::info!(
                    target: "pipeline",
                    "Stopped '{}' before batch {}/{}",
                    group,
                    index + 1,
                    batches
                );
                return false;
            }

            let batch: Vec<T> = items.by_ref().take(batch_size).collect();
            stream::iter(batch)
                .for_each_concurrent(workers, |item| {
                    let work = &work;
                    async move {
                        if self.is_cancelled() {
                            return;
                        }
                        let outcome = work(item).await;
                        self.counters.record(outcome);
                    }
                })
                .await;

            tracing::debug!(
                target: "pipeline",
                "{} '{}': batch {}/{} done",
                category,
                group,
                index + 1,
                batches
            );
            self.emit(PipelineEvent::BatchComplete {
                category,
                group: group.to_string(),
                batch: index + 1,
                batches,
            })
            .await;

            if index + 1 < batches && !delay.is_zero() {
                tokio::select! {
                    _ = self.cancel.cancelled() => {}
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
        !self.is_cancelled()
    }

    /// Record a quality-filter rejection and clear out what was written
    /// for the item before.
    pub(super) async fn reject(
        &self,
        category: MediaCategory,
        item: &ClassifiedItem,
        metadata: &MetadataRecord,
        reasons: &[String],
        folder: Option<&Path>,
    ) {
        tracing::info!(
            target: "pipeline",
            "Filtered '{}' (tmdb {}): {}",
            metadata.title,
            metadata.id,
            reasons.join(", ")
        );
        if let Err(e) = self
            .ctx
            .ledger
            .mark_skipped(category, item.group(), metadata, &item.item)
            .await
        {
            tracing::warn!(target: "pipeline", "Could not record skip for '{}': {}", metadata.title, e);
        }
        if let Some(folder) = folder {
            self.ctx.materializer.remove_folder(folder).await;
        }
    }

    /// Pointer without a sidecar for an item TMDB has no match for, when
    /// `tmdb.create_not_found` is set.
    pub(super) async fn write_unmatched(&self, item: &ClassifiedItem) {
        let ctx = &self.ctx;
        if !ctx.config.tmdb.create_not_found {
            return;
        }
        let paths = ctx.materializer.paths(&MediaKey::for_item(item, None));
        ctx.materializer
            .write_pointer(&paths.pointer, &ctx.playback_url(&item.item))
            .await;
    }

    /// Ledger lookup that treats a storage failure as "not skipped".
    pub(super) async fn ledger_says_skip(
        &self,
        category: MediaCategory,
        check: LedgerCheck<'_>,
    ) -> bool {
        let ledger = &self.ctx.ledger;
        let result = match check {
            LedgerCheck::Streams(ids) => ledger.is_any_stream_skipped(category, ids).await,
            LedgerCheck::Tmdb(id) => ledger.is_skipped(category, id).await,
        };
        result.unwrap_or_else(|e| {
            tracing::warn!(target: "pipeline", "Ledger lookup failed ({:?}): {}", check, e);
            false
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub(super) enum LedgerCheck<'a> {
    /// Upstream stream ids; any one of them being skipped counts
    Streams(&'a [i64]),
    /// TMDB id
    Tmdb(i64),
}

/// Keep the first item for each distinct destination; duplicates would
/// race on the same files within a batch.
fn dedupe(items: Vec<ClassifiedItem>) -> Vec<ClassifiedItem> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|i| {
            let fresh = seen.insert((i.title.to_lowercase(), i.year, i.season, i.episode));
            if !fresh {
                tracing::debug!(target: "pipeline", "Duplicate stream '{}' ({})", i.item.name, i.id());
            }
            fresh
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::catalog::traits::mocks::MockCatalog;
    use crate::enrichment::traits::mocks::MockMetadataApi;
    use crate::pipeline::context::mocks::TestHarness;

    fn runner_for(harness: &TestHarness) -> Runner {
        Runner::new(harness.context.clone(), CancellationToken::new(), None)
    }

    #[tokio::test]
    async fn test_batches_respect_concurrency_limit() {
        let harness = TestHarness::new(MockCatalog::new(), MockMetadataApi::no_matches(), |c| {
            c.pipeline.batch_size = 10;
            c.pipeline.concurrent_requests = 3;
        })
        .await;
        let runner = runner_for(&harness);

        let (active, peak) = (&AtomicUsize::new(0), &AtomicUsize::new(0));
        let done = runner
            .run_batches(MediaCategory::Movie, "g", (0..25).collect(), move |_: i32| async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                ItemOutcome::Written
            })
            .await;

        assert!(done);
        assert_eq!(peak.load(Ordering::SeqCst), 3);
        assert_eq!(runner.stats().written, 25);
    }

    #[tokio::test]
    async fn test_batches_stop_when_cancelled() {
        let harness = TestHarness::new(MockCatalog::new(), MockMetadataApi::no_matches(), |c| {
            c.pipeline.batch_size = 2;
            c.pipeline.concurrent_requests = 1;
        })
        .await;
        let runner = runner_for(&harness);

        let seen = &AtomicUsize::new(0);
        let cancel = runner.cancel.clone();
        let done = runner
            .run_batches(MediaCategory::Movie, "g", (0..10).collect(), move |_: i32| {
                let cancel = cancel.clone();
                async move {
                    if seen.fetch_add(1, Ordering::SeqCst) + 1 == 3 {
                        cancel.cancel();
                    }
                    ItemOutcome::Written
                }
            })
            .await;

        assert!(!done);
        // The third item cancels; the fourth, in the same batch, never starts.
        assert_eq!(seen.load(Ordering::SeqCst), 3);
        assert_eq!(runner.stats().written, 3);
    }

    #[tokio::test]
    async fn test_delay_between_batches_only() {
        let harness = TestHarness::new(MockCatalog::new(), MockMetadataApi::no_matches(), |c| {
            c.pipeline.batch_size = 2;
            c.pipeline.batch_delay_seconds = 10.0;
        })
        .await;
        let runner = runner_for(&harness);
        // Paused only after the database is up.
        tokio::time::pause();

        let started = tokio::time::Instant::now();
        runner
            .run_batches(MediaCategory::Movie, "g", vec![1, 2, 3, 4, 5], |_: i32| async {
                ItemOutcome::Unchanged
            })
            .await;

        // Three batches, two pauses.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(20) && elapsed < Duration::from_secs(21));
    }

    #[test]
    fn test_dedupe_keeps_first() {
        let parser =
            crate::model::NameParser::new(&crate::config::LibraryConfig::default()).unwrap();
        let items = vec![
            crate::test_utils::mock_stream(1, "Film (2019)", "g"),
            crate::test_utils::mock_stream(2, "FILM (2019)", "g"),
            crate::test_utils::mock_stream(3, "Film (2020)", "g"),
        ]
        .into_iter()
        .filter_map(|s| parser.classify(s, MediaCategory::Movie))
        .collect();

        let ids: Vec<i64> = dedupe(items).iter().map(|i| i.id()).collect();
        assert_eq!(ids, vec![1, 3]);
    }
}
