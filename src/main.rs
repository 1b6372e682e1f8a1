//! strmgen - turns an upstream live-stream catalog into a media-server library.
//!
//! Streams are grouped, classified as movies, TV episodes or 24/7 channels,
//! matched against TMDB and written out as `.strm` pointers with NFO
//! sidecars and artwork. Items that fail the quality filters are remembered
//! in a SQLite ledger so later runs skip them cheaply.

pub mod catalog;
pub mod cli;
pub mod config;
pub mod db;
pub mod enrichment;
pub mod error;
pub mod model;
pub mod organizer;
pub mod pipeline;
#[cfg(test)]
pub mod test_utils;

use clap::{CommandFactory, Parser};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Used when `RUST_LOG` is unset; the component targets are listed since
/// they don't live under the crate path.
const DEFAULT_LOG_FILTER: &str =
    "strmgen=info,pipeline=info,catalog=info,tmdb=info,ledger=info,materializer=info";

fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)))
        .init();

    if !cli::run_command(&args)? {
        cli::Cli::command().print_help()?;
        println!();
    }
    Ok(())
}
