//! Metadata enrichment - resolves stream names against TMDB.
//!
//! # Architecture
//!
//! Same layering as every provider integration here:
//! - **Domain models** (`domain.rs`) - [`MetadataRecord`], [`Lookup`], errors
//! - **API DTOs** (`tmdb/dto.rs`) - exact API response shapes
//! - **Adapter** (`tmdb/adapter.rs`) - DTOs to domain models
//! - **Client** (`tmdb/client.rs`) - HTTP, rate limiting, retry
//! - **Traits** (`traits.rs`) - the [`MetadataApi`] seam, plus mocks
//! - **Resolver** (`resolver.rs`) - search, scoring, caching, artwork
//!
//! # Usage
//!
//! ```ignore
//! let client = TmdbClient::new(api_key, &config.tmdb)?;
//! let resolver = MetadataResolver::new(Arc::new(client), ResolverConfig::default());
//!
//! match resolver.search_movie("Some Film", Some(2019)).await {
//!     Lookup::Found(record) => println!("{} [{}]", record.title, record.id),
//!     Lookup::NotFound => println!("no match"),
//!     Lookup::Failed(reason) => eprintln!("lookup failed: {reason}"),
//! }
//! ```

pub mod domain;
pub mod resolver;
pub mod retry;
pub mod scoring;
pub mod tmdb;
pub mod traits;

pub use domain::{EnrichmentError, Lookup, MetadataRecord, RecordKind, SearchHit};
pub use resolver::{MetadataResolver, ResolverConfig};
pub use retry::RetryPolicy;
pub use tmdb::TmdbClient;
pub use traits::MetadataApi;
