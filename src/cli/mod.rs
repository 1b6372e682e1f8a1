//! Command-line interface for strmgen.
//!
//! Runs the pipeline once in the foreground and offers a few maintenance
//! commands over the skip ledger and configuration.

mod commands;

pub use commands::{Cli, Commands, SkippedAction, run_command};
