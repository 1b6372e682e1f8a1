//! Idempotent writes into the library.
//!
//! Every write compares against what is already on disk first, so running
//! the pipeline twice over unchanged upstream data writes nothing the
//! second time. Failures are logged here and reported as
//! [`WriteOutcome::Failed`]; nothing in this module returns an error that
//! could stop a run.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::catalog::CatalogApi;
use crate::config::LibraryConfig;
use crate::enrichment::{MetadataRecord, MetadataResolver};
use crate::error::{Error, Result};

use super::nfo;
use super::paths::{self, MaterializedPaths, MediaKey, ShowPaths};

/// What a write did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// Content on disk already matched
    Unchanged,
    /// Turned off or kept by configuration
    Skipped,
    /// Not written: no playable URL or the probe failed
    Refused,
    /// I/O error, already logged
    Failed,
}

impl WriteOutcome {
    /// The file is in place (new or pre-existing).
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Written | Self::Unchanged | Self::Skipped)
    }
}

/// Write policy, taken from `[library]`.
#[derive(Debug, Clone)]
pub struct MaterializerOptions {
    pub root: PathBuf,
    pub write_nfo: bool,
    pub write_nfo_only_if_not_exists: bool,
    pub update_stream_link: bool,
    pub download_images: bool,
}

impl From<&LibraryConfig> for MaterializerOptions {
    fn from(config: &LibraryConfig) -> Self {
        Self {
            root: config.output_root.clone(),
            write_nfo: config.write_nfo,
            write_nfo_only_if_not_exists: config.write_nfo_only_if_not_exists,
            update_stream_link: config.update_stream_link,
            download_images: config.download_images,
        }
    }
}

pub struct Materializer {
    options: MaterializerOptions,
    catalog: Arc<dyn CatalogApi>,
    resolver: Arc<MetadataResolver>,
}

impl Materializer {
    pub fn new(
        options: MaterializerOptions,
        catalog: Arc<dyn CatalogApi>,
        resolver: Arc<MetadataResolver>,
    ) -> Self {
        Self {
            options,
            catalog,
            resolver,
        }
    }

    pub fn paths(&self, key: &MediaKey) -> MaterializedPaths {
        paths::compute_paths(&self.options.root, key)
    }

    pub fn show_paths(&self, group: &str, show: &str) -> ShowPaths {
        paths::show_paths(&self.options.root, group, show)
    }

    /// Write `target_url` to a pointer file.
    ///
    /// An existing pointer is left alone unless link updates are enabled,
    /// and is never rewritten with identical content. New content is only
    /// written after the target passes the liveness probe.
    pub async fn write_pointer(&self, path: &Path, target_url: &str) -> WriteOutcome {
        let target = target_url.trim();
        if target.is_empty() {
            tracing::warn!(target: "materializer", "No playable URL for {}", path.display());
            return WriteOutcome::Refused;
        }

        if let Ok(existing) = tokio::fs::read_to_string(path).await {
            if existing.trim() == target {
                return WriteOutcome::Unchanged;
            }
            if !self.options.update_stream_link {
                return WriteOutcome::Skipped;
            }
            tracing::info!(target: "materializer", "Stream link changed: {}", path.display());
        }

        if !self.catalog.probe(target).await {
            tracing::warn!(target: "materializer", "Stream unreachable, not writing {}", path.display());
            return WriteOutcome::Refused;
        }

        match write_file(path, target.as_bytes()).await {
            Ok(()) => {
                tracing::info!(target: "materializer", "Wrote pointer {}", path.display());
                WriteOutcome::Written
            }
            Err(e) => {
                tracing::warn!(target: "materializer", "{}", e);
                WriteOutcome::Failed
            }
        }
    }

    /// Render `record` into a sidecar at `path`.
    pub async fn write_sidecar(&self, path: &Path, record: &MetadataRecord) -> WriteOutcome {
        if !self.options.write_nfo {
            return WriteOutcome::Skipped;
        }

        let existing = tokio::fs::read_to_string(path).await.ok();
        if existing.is_some() && self.options.write_nfo_only_if_not_exists {
            return WriteOutcome::Skipped;
        }

        let rendered = nfo::render(record);
        if existing.as_deref() == Some(rendered.as_str()) {
            return WriteOutcome::Unchanged;
        }

        match write_file(path, rendered.as_bytes()).await {
            Ok(()) => {
                tracing::debug!(target: "materializer", "Wrote sidecar {}", path.display());
                WriteOutcome::Written
            }
            Err(e) => {
                tracing::warn!(target: "materializer", "{}", e);
                WriteOutcome::Failed
            }
        }
    }

    /// Download artwork unless it is already in place or image downloads
    /// are turned off.
    pub async fn write_artwork_if_missing(
        &self,
        remote_ref: Option<&str>,
        dest: Option<&Path>,
    ) -> WriteOutcome {
        if !self.options.download_images {
            return WriteOutcome::Skipped;
        }
        let (Some(remote_ref), Some(dest)) = (remote_ref.filter(|r| !r.is_empty()), dest) else {
            return WriteOutcome::Skipped;
        };
        match self.resolver.fetch_image(remote_ref, dest).await {
            Ok(true) => WriteOutcome::Written,
            Ok(false) => WriteOutcome::Unchanged,
            Err(e) => {
                tracing::warn!(
                    target: "materializer",
                    "Artwork {} -> {} failed: {}",
                    remote_ref,
                    dest.display(),
                    e
                );
                WriteOutcome::Failed
            }
        }
    }

    /// Delete an item's folder. Refuses anything that isn't strictly
    /// inside the library root. Returns whether something was removed.
    pub async fn remove_folder(&self, folder: &Path) -> bool {
        if !is_strictly_inside(&self.options.root, folder) {
            tracing::warn!(
                target: "materializer",
                "Refusing to remove {} outside the library root",
                folder.display()
            );
            return false;
        }
        match tokio::fs::remove_dir_all(folder).await {
            Ok(()) => {
                tracing::info!(target: "materializer", "Removed {}", folder.display());
                true
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => {
                tracing::warn!(target: "materializer", "Failed to remove {}: {}", folder.display(), e);
                false
            }
        }
    }
}

/// Write via a sibling temp file and rename, creating parents first.
async fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    let fail = |e: std::io::Error| Error::materialize(path, e.to_string());

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(fail)?;
    }
    let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
    temp_name.push(".tmp");
    let temp = path.with_file_name(temp_name);

    tokio::fs::write(&temp, contents).await.map_err(fail)?;
    if let Err(e) = tokio::fs::rename(&temp, path).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(fail(e));
    }
    Ok(())
}

/// Component-wise containment; `..` anywhere disqualifies.
fn is_strictly_inside(root: &Path, candidate: &Path) -> bool {
    let has_parent_ref = candidate
        .components()
        .any(|c| matches!(c, std::path::Component::ParentDir));
    !has_parent_ref && candidate != root && candidate.starts_with(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::traits::mocks::MockCatalog;
    use crate::enrichment::ResolverConfig;
    use crate::enrichment::traits::mocks::MockMetadataApi;
    use crate::test_utils::mock_movie_record;

    struct Fixture {
        _dir: tempfile::TempDir,
        root: PathBuf,
        catalog: Arc<MockCatalog>,
        materializer: Materializer,
    }

    fn fixture(update_stream_link: bool, only_if_missing: bool) -> Fixture {
        fixture_with(MaterializerOptions {
            root: PathBuf::new(),
            write_nfo: true,
            write_nfo_only_if_not_exists: only_if_missing,
            update_stream_link,
            download_images: true,
        })
    }

    fn fixture_with(options: MaterializerOptions) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let catalog = Arc::new(MockCatalog::new());
        let resolver = Arc::new(MetadataResolver::new(
            Arc::new(MockMetadataApi::no_matches()),
            ResolverConfig::default(),
        ));
        let materializer = Materializer::new(
            MaterializerOptions {
                root: root.clone(),
                ..options
            },
            catalog.clone(),
            resolver,
        );
        Fixture {
            _dir: dir,
            root,
            catalog,
            materializer,
        }
    }

    fn movie_paths(f: &Fixture) -> MaterializedPaths {
        f.materializer.paths(&MediaKey::Movie {
            group: "Movies".into(),
            title: "Some Film".into(),
            year: Some(2019),
        })
    }

    #[tokio::test]
    async fn test_pointer_written_once() {
        let f = fixture(true, false);
        let paths = movie_paths(&f);

        let first = f.materializer.write_pointer(&paths.pointer, "http://h/a").await;
        assert_eq!(first, WriteOutcome::Written);
        assert_eq!(std::fs::read_to_string(&paths.pointer).unwrap(), "http://h/a");

        let second = f.materializer.write_pointer(&paths.pointer, " http://h/a\n").await;
        assert_eq!(second, WriteOutcome::Unchanged);
        // Unchanged content never probes
        assert_eq!(f.catalog.probes(), 1);
    }

    #[tokio::test]
    async fn test_pointer_update_policy() {
        let f = fixture(false, false);
        let paths = movie_paths(&f);
        f.materializer.write_pointer(&paths.pointer, "http://h/a").await;

        let kept = f.materializer.write_pointer(&paths.pointer, "http://h/b").await;
        assert_eq!(kept, WriteOutcome::Skipped);
        assert_eq!(std::fs::read_to_string(&paths.pointer).unwrap(), "http://h/a");

        let f = fixture(true, false);
        let paths = movie_paths(&f);
        f.materializer.write_pointer(&paths.pointer, "http://h/a").await;
        let updated = f.materializer.write_pointer(&paths.pointer, "http://h/b").await;
        assert_eq!(updated, WriteOutcome::Written);
        assert_eq!(std::fs::read_to_string(&paths.pointer).unwrap(), "http://h/b");
    }

    #[tokio::test]
    async fn test_pointer_refused_without_url_or_probe() {
        let f = fixture(true, false);
        let paths = movie_paths(&f);

        assert_eq!(f.materializer.write_pointer(&paths.pointer, "  ").await, WriteOutcome::Refused);

        f.catalog.set_alive(false);
        assert_eq!(
            f.materializer.write_pointer(&paths.pointer, "http://h/a").await,
            WriteOutcome::Refused
        );
        assert!(!paths.pointer.exists());
        // Folders are only created for actual writes
        assert!(!paths.base_folder.exists());
    }

    #[tokio::test]
    async fn test_sidecar_idempotent() {
        let f = fixture(true, false);
        let paths = movie_paths(&f);
        let record = mock_movie_record(1, "Some Film", 2019);

        assert_eq!(f.materializer.write_sidecar(&paths.sidecar, &record).await, WriteOutcome::Written);
        assert_eq!(f.materializer.write_sidecar(&paths.sidecar, &record).await, WriteOutcome::Unchanged);

        let changed = MetadataRecord {
            overview: "New plot".into(),
            ..record
        };
        assert_eq!(f.materializer.write_sidecar(&paths.sidecar, &changed).await, WriteOutcome::Written);
    }

    #[tokio::test]
    async fn test_sidecar_only_if_missing() {
        let f = fixture(true, true);
        let paths = movie_paths(&f);
        std::fs::create_dir_all(&paths.base_folder).unwrap();
        std::fs::write(&paths.sidecar, "hand edited").unwrap();

        let record = mock_movie_record(1, "Some Film", 2019);
        assert_eq!(f.materializer.write_sidecar(&paths.sidecar, &record).await, WriteOutcome::Skipped);
        assert_eq!(std::fs::read_to_string(&paths.sidecar).unwrap(), "hand edited");
    }

    #[tokio::test]
    async fn test_artwork_delegates_to_resolver() {
        let f = fixture(true, false);
        let paths = movie_paths(&f);

        let outcome = f
            .materializer
            .write_artwork_if_missing(Some("/p.jpg"), paths.poster.as_deref())
            .await;
        assert_eq!(outcome, WriteOutcome::Written);
        let again = f
            .materializer
            .write_artwork_if_missing(Some("/p.jpg"), paths.poster.as_deref())
            .await;
        assert_eq!(again, WriteOutcome::Unchanged);
        assert_eq!(
            f.materializer.write_artwork_if_missing(None, paths.poster.as_deref()).await,
            WriteOutcome::Skipped
        );
    }

    #[tokio::test]
    async fn test_remove_folder_stays_inside_root() {
        let f = fixture(true, false);
        let paths = movie_paths(&f);
        f.materializer.write_pointer(&paths.pointer, "http://h/a").await;

        assert!(f.materializer.remove_folder(&paths.base_folder).await);
        assert!(!paths.base_folder.exists());
        assert!(!f.materializer.remove_folder(&paths.base_folder).await);

        assert!(!f.materializer.remove_folder(&f.root).await);
        assert!(!f.materializer.remove_folder(&f.root.join("..")).await);
        assert!(f.root.exists());
    }

    #[tokio::test]
    async fn test_artwork_off_downloads_nothing() {
        let f = fixture_with(MaterializerOptions {
            root: PathBuf::new(),
            write_nfo: true,
            write_nfo_only_if_not_exists: false,
            update_stream_link: false,
            download_images: false,
        });
        let paths = movie_paths(&f);

        let outcome = f
            .materializer
            .write_artwork_if_missing(Some("/p.jpg"), paths.poster.as_deref())
            .await;
        assert_eq!(outcome, WriteOutcome::Skipped);
        assert!(!paths.poster.as_deref().unwrap().exists());
    }
}
