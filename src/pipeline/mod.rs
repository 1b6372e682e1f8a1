//! Pipeline orchestration.
//!
//! Owns the single in-flight run. A run lists the upstream groups, sorts
//! them into always-on, movie and TV sets by the configured glob lists,
//! and pushes every item through resolve -> filter -> materialize in
//! bounded, rate-friendly batches.
//!
//! # Architecture
//!
//! - **Context** (`context.rs`) - collaborators shared by every run
//! - **Groups** (`groups.rs`) - glob allow-lists and partitioning
//! - **Filter** (`filter.rs`) - quality thresholds
//! - **Runner** (`runner.rs`) - one pass: batching, cancellation, events
//! - **Items** (`movies.rs`, `tv.rs`, `always_on.rs`) - per-category flows
//! - **Reprocess** (`reprocess.rs`) - forced retry of a ledger entry
//!
//! # Usage
//!
//! ```ignore
//! let context = PipelineContext::from_config(config).await?;
//! let mut pipeline = Pipeline::new(context);
//!
//! let (tx, mut rx) = tokio::sync::mpsc::channel(64);
//! pipeline.set_event_sender(tx);
//! pipeline.start_run()?;
//!
//! while let Some(event) = rx.recv().await {
//!     if let PipelineEvent::RunFinished { stats, .. } = event {
//!         println!("{stats}");
//!         break;
//!     }
//! }
//! ```

mod always_on;
pub mod context;
pub mod filter;
pub mod groups;
mod movies;
mod reprocess;
mod runner;
pub mod stats;
mod tv;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::model::MediaCategory;

pub use context::{PipelineContext, PostStep};
pub use filter::QualityThresholds;
pub use groups::{GroupMatcher, GroupPlan};
pub use stats::{ItemOutcome, RunStats};

use runner::Runner;

/// Progress published while a run is in flight.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    RunStarted,
    /// Groups selected for this run, per category
    GroupsPlanned {
        always_on: usize,
        movies: usize,
        tv: usize,
    },
    /// A group's items were fetched
    GroupStarted {
        category: MediaCategory,
        group: String,
        items: usize,
    },
    /// A batch drained; `batch` counts from 1
    BatchComplete {
        category: MediaCategory,
        group: String,
        batch: usize,
        batches: usize,
    },
    /// Every season of a show went through
    ShowComplete { group: String, show: String },
    /// The run ended, on its own or because it was stopped
    RunFinished { stats: RunStats, cancelled: bool },
}

struct ActiveRun {
    cancel: CancellationToken,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<RunStats>>,
}

/// Clears the running flag however the run task ends.
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Start/stop control over pipeline runs.
pub struct Pipeline {
    ctx: Arc<PipelineContext>,
    active: Mutex<Option<ActiveRun>>,
    event_tx: Option<mpsc::Sender<PipelineEvent>>,
}

impl Pipeline {
    pub fn new(context: PipelineContext) -> Self {
        Self {
            ctx: Arc::new(context),
            active: Mutex::new(None),
            event_tx: None,
        }
    }

    /// Set the event sender for receiving progress updates.
    pub fn set_event_sender(&mut self, tx: mpsc::Sender<PipelineEvent>) {
        self.event_tx = Some(tx);
    }

    pub fn context(&self) -> &PipelineContext {
        &self.ctx
    }

    /// Launch a run in the background.
    ///
    /// Returns immediately; fails with [`Error::AlreadyRunning`] while a
    /// previous run is still going.
    pub fn start_run(&self) -> Result<()> {
        let mut active = self.active.lock();
        if active
            .as_ref()
            .is_some_and(|run| run.running.load(Ordering::SeqCst))
        {
            return Err(Error::AlreadyRunning);
        }

        let cancel = CancellationToken::new();
        let running = Arc::new(AtomicBool::new(true));
        let runner = Runner::new(self.ctx.clone(), cancel.clone(), self.event_tx.clone());
        let guard = RunningGuard(running.clone());

        let handle = tokio::spawn(async move {
            let _guard = guard;
            runner.run().await
        });

        *active = Some(ActiveRun {
            cancel,
            running,
            handle: Some(handle),
        });
        Ok(())
    }

    /// Ask the active run to stop at its next batch or item boundary.
    ///
    /// Returns immediately; fails with [`Error::NotRunning`] when there is
    /// nothing to stop.
    pub fn stop_run(&self) -> Result<()> {
        let active = self.active.lock();
        match active.as_ref() {
            Some(run) if run.running.load(Ordering::SeqCst) => {
                tracing::info!(target: "pipeline", "Stop requested");
                run.cancel.cancel();
                Ok(())
            }
            _ => Err(Error::NotRunning),
        }
    }

    pub fn is_running(&self) -> bool {
        self.active
            .lock()
            .as_ref()
            .is_some_and(|run| run.running.load(Ordering::SeqCst))
    }

    /// Wait for the current run to end and return its totals. `None` if
    /// no run was started or it was already waited on.
    pub async fn wait(&self) -> Option<RunStats> {
        let handle = self.active.lock().as_mut().and_then(|run| run.handle.take())?;
        match handle.await {
            Ok(stats) => Some(stats),
            Err(e) => {
                tracing::error!(target: "pipeline", "Pipeline task failed: {}", e);
                None
            }
        }
    }

    /// Force one more attempt for a ledger entry, outside of any run.
    ///
    /// Returns the totals for the reprocessed item, or `None` when the
    /// ledger has no entry for `tmdb_id`.
    pub async fn reprocess(&self, tmdb_id: i64) -> Result<Option<RunStats>> {
        let runner = Runner::new(self.ctx.clone(), CancellationToken::new(), None);
        let found = runner.reprocess(tmdb_id).await?;
        Ok(found.then(|| runner.stats()))
    }
}
