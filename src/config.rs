//! Configuration system using TOML files.
//!
//! Config is stored in the OS-standard config directory:
//! - Windows: %APPDATA%\strmgen\config.toml
//! - macOS: ~/Library/Application Support/strmgen/config.toml
//! - Linux: ~/.config/strmgen/config.toml
//!
//! A different file can be passed on the command line. Every section has
//! defaults, so a partial file (or no file at all) still yields a usable
//! configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Upstream and TMDB credentials
    pub credentials: Credentials,

    /// Upstream catalog connection settings
    pub upstream: UpstreamConfig,

    /// Output library settings
    pub library: LibraryConfig,

    /// Group allow-lists per category
    pub groups: GroupsConfig,

    /// Batching and concurrency
    pub pipeline: PipelineConfig,

    /// Metadata provider settings
    pub tmdb: TmdbConfig,

    /// Quality thresholds
    pub filters: FilterConfig,

    /// Dedup ledger storage
    pub database: DatabaseConfig,
}

/// API credentials
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    /// Upstream catalog login
    pub api_username: Option<String>,
    pub api_password: Option<String>,

    /// TMDB v3 API key
    pub tmdb_api_key: Option<String>,
}

/// Upstream catalog settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the channel-management service
    pub api_base: String,

    /// Login endpoint, relative to `api_base`
    pub token_url: String,

    /// Proxy path used to build playback URLs from stream hashes
    pub stream_base_url: String,

    /// Assumed lifetime of an access token
    pub token_ttl_secs: u64,

    /// Refresh this long before the token expires
    pub refresh_margin_secs: u64,

    /// Treat every stream as alive instead of probing it
    pub skip_stream_check: bool,

    /// Per-request timeout
    pub request_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:9191".to_string(),
            token_url: "/api/accounts/token/".to_string(),
            stream_base_url: "proxy/ts/stream/".to_string(),
            token_ttl_secs: 900,
            refresh_margin_secs: 60,
            skip_stream_check: true,
            request_timeout_secs: 30,
        }
    }
}

impl UpstreamConfig {
    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs)
    }

    pub fn refresh_margin(&self) -> Duration {
        Duration::from_secs(self.refresh_margin_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Output library settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Root of the materialized library
    pub output_root: PathBuf,

    /// Write `.nfo` sidecars next to pointer files
    pub write_nfo: bool,

    /// Never overwrite an existing sidecar
    pub write_nfo_only_if_not_exists: bool,

    /// Rewrite existing pointer files when the playback URL changes
    pub update_stream_link: bool,

    /// Only refresh show-level metadata for TV groups
    pub update_tv_series_nfo: bool,

    /// Substrings removed from stream names before parsing
    pub remove_strings: Vec<String>,

    /// Pattern with named groups `show`, `season`, `episode`
    pub tv_series_episode_regex: String,

    /// Pattern with named groups `title` and `year` for movie names
    pub movie_year_regex: String,

    /// Download posters, fanart and stills next to the pointers
    pub download_images: bool,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from("/output"),
            write_nfo: true,
            write_nfo_only_if_not_exists: false,
            update_stream_link: false,
            update_tv_series_nfo: false,
            remove_strings: Vec::new(),
            tv_series_episode_regex: crate::model::DEFAULT_EPISODE_PATTERN.to_string(),
            movie_year_regex: crate::model::DEFAULT_MOVIE_YEAR_PATTERN.to_string(),
            download_images: false,
        }
    }
}

/// Group allow-lists, matched as globs (`*`, `?`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupsConfig {
    pub process_movies_groups: bool,
    pub process_tv_series_groups: bool,
    pub process_24_7_groups: bool,
    pub movies_groups: Vec<String>,
    pub tv_series_groups: Vec<String>,
    pub groups_24_7: Vec<String>,
}

impl Default for GroupsConfig {
    fn default() -> Self {
        Self {
            process_movies_groups: true,
            process_tv_series_groups: true,
            process_24_7_groups: false,
            movies_groups: Vec::new(),
            tv_series_groups: Vec::new(),
            groups_24_7: Vec::new(),
        }
    }
}

/// Batching and concurrency settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Items per batch
    pub batch_size: usize,

    /// Pause between batches, in seconds
    pub batch_delay_seconds: f64,

    /// Simultaneous enrichment workers within a batch
    pub concurrent_requests: usize,

    /// Simultaneous artwork downloads
    pub image_concurrency: usize,

    /// Skip streams not modified recently
    pub only_updated_streams: bool,

    /// Window for `only_updated_streams`; unset means "today"
    pub last_modified_days: Option<u32>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 20,
            batch_delay_seconds: 2.0,
            concurrent_requests: 5,
            image_concurrency: 4,
            only_updated_streams: false,
            last_modified_days: None,
        }
    }
}

impl PipelineConfig {
    pub fn batch_delay(&self) -> Duration {
        Duration::from_secs_f64(self.batch_delay_seconds.max(0.0))
    }
}

/// TMDB settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TmdbConfig {
    pub language: String,

    /// Image size segment, e.g. `original` or `w500`
    pub image_size: String,

    /// Requests allowed per `rate_window_secs`
    pub rate_limit: u32,
    pub rate_window_secs: u64,

    /// Attempts per request on rate limiting or transient failures
    pub max_retries: u32,

    /// Base delay for exponential backoff
    pub base_delay_ms: u64,

    /// Candidate detail fetches in flight per search
    pub search_fanout: usize,

    /// Look up always-on channels too
    pub lookup_always_on: bool,

    /// Still write a pointer (without a sidecar) for titles TMDB doesn't know
    pub create_not_found: bool,
}

impl Default for TmdbConfig {
    fn default() -> Self {
        Self {
            language: "en-US".to_string(),
            image_size: "original".to_string(),
            rate_limit: 40,
            rate_window_secs: 10,
            max_retries: 3,
            base_delay_ms: 500,
            search_fanout: 5,
            lookup_always_on: false,
            create_not_found: true,
        }
    }
}

/// Quality thresholds; unset fields don't filter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Master switch; the minimums below only apply when set
    pub enabled: bool,

    pub min_year: Option<i32>,
    pub min_rating: Option<f64>,
    pub min_votes: Option<u64>,
    pub min_popularity: Option<f64>,

    /// Allowed original languages (ISO 639-1); empty allows all
    pub languages: Vec<String>,
}

/// Dedup ledger storage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(crate::db::DEFAULT_DB_NAME),
        }
    }
}

// ============================================================================
// Config File Operations
// ============================================================================

/// Get the config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("strmgen"))
}

/// Get the full path to the config file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Load configuration from the default location.
///
/// Returns default config if the file doesn't exist or can't be parsed.
pub fn load() -> Config {
    match config_path() {
        Some(path) => load_from(&path),
        None => {
            tracing::warn!("Could not determine config directory, using defaults");
            Config::default()
        }
    }
}

/// Load configuration from an explicit path.
///
/// Logs warnings but doesn't fail - we always return a usable config.
pub fn load_from(path: &Path) -> Config {
    if !path.exists() {
        tracing::info!("No config file found at {:?}, using defaults", path);
        return Config::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => {
                tracing::info!("Loaded config from {:?}", path);
                config
            }
            Err(e) => {
                tracing::error!("Failed to parse config file {:?}: {}", path, e);
                tracing::warn!("Using default configuration");
                Config::default()
            }
        },
        Err(e) => {
            tracing::error!("Failed to read config file {:?}: {}", path, e);
            Config::default()
        }
    }
}

/// Save configuration to the default location.
pub fn save(config: &Config) -> Result<(), ConfigError> {
    let path = config_path().ok_or(ConfigError::NoConfigDir)?;
    save_to(config, &path)
}

/// Save configuration to an explicit path.
///
/// Creates the parent directory if it doesn't exist.
pub fn save_to(config: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| ConfigError::CreateDir(dir.to_path_buf(), e))?;
    }

    let contents = toml::to_string_pretty(config).map_err(ConfigError::Serialize)?;

    // Write atomically (write to temp, then rename)
    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, &contents).map_err(|e| ConfigError::Write(temp_path.clone(), e))?;
    std::fs::rename(&temp_path, path)
        .map_err(|e| ConfigError::Rename(temp_path, path.to_path_buf(), e))?;

    tracing::info!("Saved config to {:?}", path);
    Ok(())
}

// ============================================================================
// Error Types
// ============================================================================

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to create config directory {0}: {1}")]
    CreateDir(PathBuf, std::io::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),

    #[error("Failed to write config to {0}: {1}")]
    Write(PathBuf, std::io::Error),

    #[error("Failed to rename temp file {0} to {1}: {2}")]
    Rename(PathBuf, PathBuf, std::io::Error),
}

// ============================================================================
// Tests
// ============================================================================
