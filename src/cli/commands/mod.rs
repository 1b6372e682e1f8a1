//! CLI command definitions and dispatch.
//!
//! Each subcommand lives in its own submodule:
//! - `run`: a full pipeline pass with live progress
//! - `groups`: upstream groups and how they classify
//! - `ledger`: skip list browsing, allow/deny and reprocess
//! - `settings`: effective configuration

mod groups;
mod ledger;
mod run;
mod settings;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio::runtime::Runtime;

use crate::config::{self, Config};
use crate::model::MediaCategory;

pub use groups::cmd_groups;
pub use ledger::{cmd_reprocess, cmd_skipped_list, cmd_skipped_set};
pub use run::cmd_run;
pub use settings::cmd_config;

/// strmgen CLI
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (default: OS config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Ledger database path
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Upstream API user
    #[arg(long, global = true, env = "STRMGEN_API_USER", hide_env_values = true)]
    pub api_user: Option<String>,

    /// Upstream API password
    #[arg(long, global = true, env = "STRMGEN_API_PASSWORD", hide_env_values = true)]
    pub api_password: Option<String>,

    /// TMDB API key
    #[arg(long, global = true, env = "TMDB_API_KEY", hide_env_values = true)]
    pub tmdb_api_key: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Run the pipeline once; Ctrl-C stops it after the current batch
    Run {
        /// Library root (overrides the config file)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List upstream groups and the category each one falls into
    Groups,
    /// Inspect or edit the skip ledger
    Skipped {
        #[command(subcommand)]
        action: SkippedAction,
    },
    /// Run one skipped item (or its whole show) through the pipeline again
    Reprocess {
        /// TMDB id of the ledger entry
        tmdb_id: i64,
    },
    /// Print the effective configuration
    Config {
        /// Also write it to the config file
        #[arg(long)]
        write: bool,
    },
}

#[derive(Subcommand)]
pub enum SkippedAction {
    /// List ledger entries
    List {
        /// movie, tv or 24-7
        #[arg(long)]
        category: Option<MediaCategory>,
    },
    /// Let the next run try this entry again
    Allow { tmdb_id: i64 },
    /// Skip this entry again
    Deny { tmdb_id: i64 },
}

impl Cli {
    /// Config file contents with command-line overrides applied.
    pub fn load_config(&self) -> Config {
        let mut config = match &self.config {
            Some(path) => config::load_from(path),
            None => config::load(),
        };
        if let Some(path) = &self.db {
            config.database.path = path.clone();
        }
        let credentials = &mut config.credentials;
        if self.api_user.is_some() {
            credentials.api_username = self.api_user.clone();
        }
        if self.api_password.is_some() {
            credentials.api_password = self.api_password.clone();
        }
        if self.tmdb_api_key.is_some() {
            credentials.tmdb_api_key = self.tmdb_api_key.clone();
        }
        config
    }
}

/// Run the specified CLI command.
///
/// Returns `Ok(true)` if a command was run, `Ok(false)` if no command was
/// specified.
pub fn run_command(cli: &Cli) -> anyhow::Result<bool> {
    let Some(command) = &cli.command else {
        return Ok(false);
    };
    let rt = Runtime::new()?;
    let mut config = cli.load_config();

    match command {
        Commands::Run { output } => {
            if let Some(output) = output {
                config.library.output_root = output.clone();
            }
            cmd_run(&rt, config)?;
        }
        Commands::Groups => cmd_groups(&rt, &config)?,
        Commands::Skipped { action } => match action {
            SkippedAction::List { category } => cmd_skipped_list(&rt, &config, *category)?,
            SkippedAction::Allow { tmdb_id } => cmd_skipped_set(&rt, &config, *tmdb_id, true)?,
            SkippedAction::Deny { tmdb_id } => cmd_skipped_set(&rt, &config, *tmdb_id, false)?,
        },
        Commands::Reprocess { tmdb_id } => cmd_reprocess(&rt, config, *tmdb_id)?,
        Commands::Config { write } => cmd_config(&config, cli.config.as_deref(), *write)?,
    }
    Ok(true)
}
