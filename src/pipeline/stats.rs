//! Per-run counters.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::organizer::WriteOutcome;

/// What happened to an item, counted once per item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Pointer newly written or rewritten
    Written,
    /// Pointer already in place
    Unchanged,
    /// Rejected by the quality filter this run
    Filtered,
    /// Already in the ledger, or outside the update window
    Skipped,
    /// No metadata match
    NotFound,
    /// TMDB still failing after retries
    Unavailable,
    /// Write failed or the stream was refused
    Failed,
}

impl From<WriteOutcome> for ItemOutcome {
    fn from(outcome: WriteOutcome) -> Self {
        match outcome {
            WriteOutcome::Written => Self::Written,
            WriteOutcome::Unchanged | WriteOutcome::Skipped => Self::Unchanged,
            WriteOutcome::Refused | WriteOutcome::Failed => Self::Failed,
        }
    }
}

/// Shared counters, updated by concurrent workers.
#[derive(Debug, Default)]
pub struct RunCounters {
    written: AtomicUsize,
    unchanged: AtomicUsize,
    filtered: AtomicUsize,
    skipped: AtomicUsize,
    not_found: AtomicUsize,
    unavailable: AtomicUsize,
    failed: AtomicUsize,
}

impl RunCounters {
    pub fn record(&self, outcome: ItemOutcome) {
        self.record_n(outcome, 1);
    }

    /// Count `n` items with the same outcome, e.g. every episode of a
    /// show rejected as a whole.
    pub fn record_n(&self, outcome: ItemOutcome, n: usize) {
        let counter = match outcome {
            ItemOutcome::Written => &self.written,
            ItemOutcome::Unchanged => &self.unchanged,
            ItemOutcome::Filtered => &self.filtered,
            ItemOutcome::Skipped => &self.skipped,
            ItemOutcome::NotFound => &self.not_found,
            ItemOutcome::Unavailable => &self.unavailable,
            ItemOutcome::Failed => &self.failed,
        };
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RunStats {
        RunStats {
            written: self.written.load(Ordering::Relaxed),
            unchanged: self.unchanged.load(Ordering::Relaxed),
            filtered: self.filtered.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            not_found: self.not_found.load(Ordering::Relaxed),
            unavailable: self.unavailable.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Totals for a finished (or stopped) run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub written: usize,
    pub unchanged: usize,
    pub filtered: usize,
    pub skipped: usize,
    pub not_found: usize,
    pub unavailable: usize,
    pub failed: usize,
}

impl RunStats {
    pub fn total(&self) -> usize {
        self.written
            + self.unchanged
            + self.filtered
            + self.skipped
            + self.not_found
            + self.unavailable
            + self.failed
    }
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} written, {} unchanged, {} filtered, {} skipped, {} not found, {} unavailable, {} failed",
            self.written,
            self.unchanged,
            self.filtered,
            self.skipped,
            self.not_found,
            self.unavailable,
            self.failed
        )
    }
}
