//! Collaborators a run works with, built once per process.

use std::sync::Arc;

use async_trait::async_trait;

use super::filter::QualityThresholds;
use super::groups::GroupMatcher;
use crate::catalog::{CatalogApi, CatalogClient};
use crate::config::Config;
use crate::db::{SkipLedger, SqliteLedger, db_url, init_db};
use crate::enrichment::{
    EnrichmentError, MetadataRecord, MetadataResolver, ResolverConfig, TmdbClient,
};
use crate::error::Result;
use crate::model::{ClassifiedItem, NameParser, StreamItem};
use crate::organizer::{MaterializedPaths, Materializer, MaterializerOptions};

/// Extra work run after a movie or episode has been materialized, such as
/// fetching subtitles next to the pointer file.
#[async_trait]
pub trait PostStep: Send + Sync {
    fn name(&self) -> &str;

    async fn run(
        &self,
        item: &ClassifiedItem,
        metadata: &MetadataRecord,
        paths: &MaterializedPaths,
    ) -> Result<()>;
}

/// Shared state for pipeline runs.
pub struct PipelineContext {
    pub config: Config,
    pub catalog: Arc<dyn CatalogApi>,
    pub resolver: Arc<MetadataResolver>,
    pub ledger: Arc<dyn SkipLedger>,
    pub materializer: Materializer,
    pub parser: NameParser,
    pub groups: GroupMatcher,
    pub thresholds: QualityThresholds,
    post_steps: Vec<Arc<dyn PostStep>>,
}

impl PipelineContext {
    pub fn new(
        config: Config,
        catalog: Arc<dyn CatalogApi>,
        resolver: Arc<MetadataResolver>,
        ledger: Arc<dyn SkipLedger>,
    ) -> Result<Self> {
        let materializer = Materializer::new(
            MaterializerOptions::from(&config.library),
            catalog.clone(),
            resolver.clone(),
        );
        let parser = NameParser::new(&config.library)?;
        let groups = GroupMatcher::new(&config.groups)?;
        let thresholds = QualityThresholds::from(&config.filters);

        Ok(Self {
            config,
            catalog,
            resolver,
            ledger,
            materializer,
            parser,
            groups,
            thresholds,
            post_steps: Vec::new(),
        })
    }

    /// Wire up the real upstream client, TMDB client and SQLite ledger.
    pub async fn from_config(config: Config) -> Result<Self> {
        let pool = init_db(&db_url(Some(&config.database.path))).await?;
        let ledger = Arc::new(SqliteLedger::new(pool));

        let catalog = Arc::new(CatalogClient::new(&config)?);

        let api_key = config
            .credentials
            .tmdb_api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or(EnrichmentError::MissingApiKey)?;
        let tmdb = TmdbClient::new(api_key, &config.tmdb)?;
        let resolver = Arc::new(MetadataResolver::new(
            Arc::new(tmdb),
            ResolverConfig {
                search_fanout: config.tmdb.search_fanout,
                image_concurrency: config.pipeline.image_concurrency,
            },
        ));

        Self::new(config, catalog, resolver, ledger)
    }

    pub fn with_post_step(mut self, step: Arc<dyn PostStep>) -> Self {
        self.post_steps.push(step);
        self
    }

    /// Target written into an item's pointer file.
    pub fn playback_url(&self, item: &StreamItem) -> String {
        let upstream = &self.config.upstream;
        item.playback_url(&upstream.api_base, &upstream.stream_base_url)
    }

    /// Run every registered post step; failures are logged and ignored.
    pub async fn run_post_steps(
        &self,
        item: &ClassifiedItem,
        metadata: &MetadataRecord,
        paths: &MaterializedPaths,
    ) {
        for step in &self.post_steps {
            if let Err(e) = step.run(item, metadata, paths).await {
                tracing::warn!(
                    target: "pipeline",
                    "Post step '{}' failed for '{}': {}",
                    step.name(),
                    item.title,
                    e
                );
            }
        }
    }
}

#[cfg(test)]
pub mod mocks {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;

    use super::*;
    use crate::catalog::traits::mocks::MockCatalog;
    use crate::db::SqliteLedger;
    use crate::enrichment::traits::mocks::MockMetadataApi;

    /// Records every item it sees.
    #[derive(Default)]
    pub struct RecordingStep {
        pub calls: AtomicUsize,
        pub titles: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PostStep for RecordingStep {
        fn name(&self) -> &str {
            "recording"
        }

        async fn run(
            &self,
            item: &ClassifiedItem,
            _metadata: &MetadataRecord,
            paths: &MaterializedPaths,
        ) -> Result<()> {
            assert!(paths.pointer.exists());
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.titles.lock().push(item.title.clone());
            Ok(())
        }
    }

    /// Context over mocks, plus handles to inspect them.
    pub struct TestHarness {
        pub catalog: Arc<MockCatalog>,
        pub api: Arc<MockMetadataApi>,
        pub ledger: Arc<SqliteLedger>,
        pub context: Arc<PipelineContext>,
        pub root: tempfile::TempDir,
        _db_dir: tempfile::TempDir,
    }

    impl TestHarness {
        pub async fn new(
            catalog: MockCatalog,
            api: MockMetadataApi,
            configure: impl FnOnce(&mut Config),
        ) -> Self {
            Self::with_post_steps(catalog, api, configure, Vec::new()).await
        }

        pub async fn with_post_steps(
            catalog: MockCatalog,
            api: MockMetadataApi,
            configure: impl FnOnce(&mut Config),
            steps: Vec<Arc<dyn PostStep>>,
        ) -> Self {
            let root = tempfile::tempdir().unwrap();
            let mut config = crate::test_utils::test_config(root.path());
            configure(&mut config);

            let (ledger, db_dir) = crate::test_utils::temp_ledger().await;
            let catalog = Arc::new(catalog);
            let api = Arc::new(api);
            let ledger = Arc::new(ledger);
            let resolver = Arc::new(MetadataResolver::new(
                api.clone(),
                ResolverConfig::default(),
            ));
            let mut context =
                PipelineContext::new(config, catalog.clone(), resolver, ledger.clone()).unwrap();
            for step in steps {
                context = context.with_post_step(step);
            }

            Self {
                catalog,
                api,
                ledger,
                context: Arc::new(context),
                root,
                _db_dir: db_dir,
            }
        }

        /// Path relative to the library root.
        pub fn path(&self, relative: &str) -> std::path::PathBuf {
            self.root.path().join(relative)
        }
    }
}
