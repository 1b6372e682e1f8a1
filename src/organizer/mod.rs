//! Library materialization.
//!
//! Turns enriched items into files a media server can scan: `.strm`
//! pointers holding a playback URL, `.nfo` sidecars and artwork.
//!
//! # Features
//! - Deterministic layout computed from the item alone ([`paths`])
//! - Content-compared writes, so re-runs are no-ops ([`writer`])
//! - Per-kind NFO schemas ([`nfo`])
//! - Folder removal confined to the library root

pub mod nfo;
pub mod paths;
pub mod writer;

pub use paths::{MaterializedPaths, MediaKey, ShowPaths, compute_paths, show_paths};
pub use writer::{Materializer, MaterializerOptions, WriteOutcome};
