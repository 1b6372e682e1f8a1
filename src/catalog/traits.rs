//! The seam between the pipeline and the upstream catalog.

use async_trait::async_trait;

use super::CatalogError;
use super::client::CatalogClient;
use crate::model::{ClassifiedItem, MediaCategory, StreamItem};

#[async_trait]
pub trait CatalogApi: Send + Sync {
    async fn fetch_groups(&self) -> Result<Vec<String>, CatalogError>;

    async fn fetch_group_items(
        &self,
        group: &str,
        category: MediaCategory,
    ) -> Result<Vec<ClassifiedItem>, CatalogError>;

    async fn get_stream(&self, id: i64) -> Result<StreamItem, CatalogError>;

    async fn probe(&self, url: &str) -> bool;
}

#[async_trait]
impl CatalogApi for CatalogClient {
    async fn fetch_groups(&self) -> Result<Vec<String>, CatalogError> {
        self.fetch_groups().await
    }

    async fn fetch_group_items(
        &self,
        group: &str,
        category: MediaCategory,
    ) -> Result<Vec<ClassifiedItem>, CatalogError> {
        self.fetch_group_items(group, category).await
    }

    async fn get_stream(&self, id: i64) -> Result<StreamItem, CatalogError> {
        self.get_stream(id).await
    }

    async fn probe(&self, url: &str) -> bool {
        self.probe(url).await
    }
}
