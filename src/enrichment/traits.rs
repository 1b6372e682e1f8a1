//! Trait definitions for the metadata provider.
//!
//! [`MetadataApi`] is the seam between the resolver and the network.
//! Production code uses [`TmdbClient`]; tests substitute
//! [`mocks::MockMetadataApi`], which records how often each endpoint is hit.
//!
//! [`TmdbClient`]: super::tmdb::TmdbClient

use async_trait::async_trait;

use super::domain::{EnrichmentError, MetadataRecord, SearchHit};

/// Raw provider operations, one per endpoint.
#[async_trait]
pub trait MetadataApi: Send + Sync {
    /// Movie search; `year` narrows results server-side.
    async fn search_movie(
        &self,
        title: &str,
        year: Option<i32>,
    ) -> Result<Vec<SearchHit>, EnrichmentError>;

    /// Mixed search over movies, shows and people.
    async fn search_multi(&self, query: &str) -> Result<Vec<SearchHit>, EnrichmentError>;

    async fn movie_details(&self, id: i64) -> Result<MetadataRecord, EnrichmentError>;

    async fn tv_details(&self, id: i64) -> Result<MetadataRecord, EnrichmentError>;

    async fn season_details(
        &self,
        show_id: i64,
        season: u32,
    ) -> Result<MetadataRecord, EnrichmentError>;

    async fn episode_details(
        &self,
        show_id: i64,
        season: u32,
        episode: u32,
    ) -> Result<MetadataRecord, EnrichmentError>;

    async fn download_image(&self, remote_ref: &str) -> Result<Vec<u8>, EnrichmentError>;
}

#[async_trait]
impl MetadataApi for super::tmdb::TmdbClient {
    async fn search_movie(
        &self,
        title: &str,
        year: Option<i32>,
    ) -> Result<Vec<SearchHit>, EnrichmentError> {
        self.search_movie(title, year).await
    }

    async fn search_multi(&self, query: &str) -> Result<Vec<SearchHit>, EnrichmentError> {
        self.search_multi(query).await
    }

    async fn movie_details(&self, id: i64) -> Result<MetadataRecord, EnrichmentError> {
        self.movie_details(id).await
    }

    async fn tv_details(&self, id: i64) -> Result<MetadataRecord, EnrichmentError> {
        self.tv_details(id).await
    }

    async fn season_details(
        &self,
        show_id: i64,
        season: u32,
    ) -> Result<MetadataRecord, EnrichmentError> {
        self.season_details(show_id, season).await
    }

    async fn episode_details(
        &self,
        show_id: i64,
        season: u32,
        episode: u32,
    ) -> Result<MetadataRecord, EnrichmentError> {
        self.episode_details(show_id, season, episode).await
    }

    async fn download_image(&self, remote_ref: &str) -> Result<Vec<u8>, EnrichmentError> {
        self.download_image(remote_ref).await
    }
}
