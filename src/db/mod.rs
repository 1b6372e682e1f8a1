//! Database module for the dedup ledger.
//!
//! Uses SQLx with SQLite for lightweight, embedded storage. The only table
//! is `skipped_streams`; see [`ledger`] for the operations over it.
//!
//! # Example
//!
//! ```ignore
//! use strmgen::db::{init_db, SqliteLedger};
//!
//! let pool = init_db("sqlite:strmgen.db").await?;
//! let ledger = SqliteLedger::new(pool);
//! let skipped = ledger.list(None).await?;
//! ```

pub mod ledger;

use sqlx::migrate::MigrateDatabase;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

pub use ledger::{SkipLedger, SkipRecord, SqliteLedger};

use crate::error::ResultExt;

/// Default database filename.
pub const DEFAULT_DB_NAME: &str = "strmgen.db";

/// Build a SQLite database URL from an optional path.
///
/// If no path is provided, uses [`DEFAULT_DB_NAME`] in the current directory.
pub fn db_url(path: Option<&std::path::Path>) -> String {
    match path {
        Some(p) => format!("sqlite:{}", p.display()),
        None => format!("sqlite:{}", DEFAULT_DB_NAME),
    }
}

/// Initialize the database connection pool and run migrations.
///
/// Creates the database file if it doesn't exist, establishes a connection
/// pool with up to 5 connections, and runs all pending migrations.
pub async fn init_db(db_url: &str) -> crate::error::Result<SqlitePool> {
    if !sqlx::Sqlite::database_exists(db_url).await.unwrap_or(false) {
        sqlx::Sqlite::create_database(db_url)
            .await
            .with_context(format!("creating {db_url}"))?;
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await
        .with_context(format!("opening {db_url}"))?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}
