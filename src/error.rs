//! Application-wide error types.
//!
//! Library modules use specific error types via `thiserror`
//! ([`CatalogError`], [`EnrichmentError`]), while the CLI uses `anyhow`
//! for convenient propagation.
//!
//! # Design
//!
//! - [`Error`]: Top-level error enum, aggregates subsystem errors
//! - [`ResultExt`]: Attach a human-readable context to any failure
//!
//! Item-level failures never surface through [`Error`] during a run; the
//! pipeline logs them and moves on. [`Error`] is what control operations
//! and setup code return.
//!
//! [`CatalogError`]: crate::catalog::CatalogError
//! [`EnrichmentError`]: crate::enrichment::EnrichmentError

use std::path::PathBuf;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level application error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration error
    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// Upstream catalog error
    #[error("Catalog error: {0}")]
    Catalog(#[from] crate::catalog::CatalogError),

    /// Metadata provider error
    #[error("Enrichment error: {0}")]
    Enrichment(#[from] crate::enrichment::EnrichmentError),

    /// Materialization failed for a path
    #[error("Materialize error for {path}: {message}")]
    Materialize { path: PathBuf, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A run is already in flight
    #[error("A pipeline run is already in progress")]
    AlreadyRunning,

    /// No run is in flight
    #[error("No pipeline run is in progress")]
    NotRunning,

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create a materialization error.
    pub fn materialize(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Materialize {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Add context to an error.
    pub fn context(self, ctx: impl Into<String>) -> Self {
        Self::WithContext {
            context: ctx.into(),
            source: Box::new(self),
        }
    }
}

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn with_context(self, ctx: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for std::result::Result<T, sqlx::Error> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Database(e).context(ctx))
    }
}
