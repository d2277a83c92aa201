//! Upstream file fetching
//!
//! A [`SourceFetcher`] turns a collection into a lazy, depth-first stream of
//! raw files. Two implementations are provided:
//!
//! - [`GitCheckout`]: clones or pulls a working tree, then walks it on disk
//! - [`GithubTree`]: walks the GitHub contents API without a local checkout
//!
//! Per-file failures are yielded as [`SourceError::File`] items and the stream
//! continues; any other error ends the stream.

mod error;
mod github;
mod local;

pub use error::{SourceError, SourceResult};
pub use github::GithubTree;
pub use local::{GitCheckout, LocalTree};

use crate::config::{SourceMode, SourcesConfig};
use crate::models::Collection;
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use std::path::Path;
use std::sync::Arc;

/// One raw upstream file
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    /// Path relative to the repository root, `/`-separated
    pub path: String,

    /// Raw bytes, expected to be JSON text
    pub contents: Vec<u8>,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
        }
    }

    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// File name without the `.json` suffix
    pub fn stem(&self) -> &str {
        let name = self.file_name();
        name.strip_suffix(".json").unwrap_or(name)
    }

    /// First path component (`clusters`, `galaxies`, ...)
    pub fn top_dir(&self) -> Option<&str> {
        let mut parts = self.path.split('/');
        let first = parts.next()?;
        parts.next().map(|_| first)
    }
}

pub type SourceStream = BoxStream<'static, SourceResult<SourceFile>>;

/// Yields the raw files of a collection
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Start a fresh walk over the collection's files.
    ///
    /// Errors returned here (or yielded as non per-file items) mean the
    /// collection cannot be fetched at all.
    async fn list_files(&self, collection: Collection) -> SourceResult<SourceStream>;
}

/// Files fetched for one collection, with the per-file failures kept aside
#[derive(Debug, Default)]
pub struct FetchedCollection {
    pub files: Vec<SourceFile>,
    pub failures: Vec<(String, String)>,
}

/// Drain a collection's stream, absorbing per-file failures.
pub async fn fetch_collection(
    fetcher: &dyn SourceFetcher,
    collection: Collection,
) -> SourceResult<FetchedCollection> {
    let mut stream = fetcher.list_files(collection).await?;
    let mut fetched = FetchedCollection::default();

    while let Some(item) = stream.next().await {
        match item {
            Ok(file) => fetched.files.push(file),
            Err(SourceError::File { path, reason }) => {
                tracing::warn!(
                    collection = %collection,
                    path = %path,
                    reason = %reason,
                    "Skipping file that could not be fetched"
                );
                fetched.failures.push((path, reason));
            }
            Err(e) => return Err(e),
        }
    }

    tracing::debug!(
        collection = %collection,
        files = fetched.files.len(),
        failures = fetched.failures.len(),
        "Collection fetched"
    );

    Ok(fetched)
}

/// Build the fetcher selected by configuration
pub fn create_fetcher(config: &SourcesConfig) -> SourceResult<Arc<dyn SourceFetcher>> {
    match config.mode {
        SourceMode::Local => {
            tracing::info!(data_dir = ?config.data_dir, "Using local git checkouts");
            Ok(Arc::new(GitCheckout::new(config.clone())))
        }
        SourceMode::Remote => {
            tracing::info!(api = %config.github_api_url, "Using GitHub contents API");
            Ok(Arc::new(GithubTree::new(config.clone())?))
        }
    }
}

/// `/`-separated path of `path` relative to `root`
pub(crate) fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_file_name_parts() {
        let file = SourceFile::new("clusters/threat-actor.json", b"{}".to_vec());
        assert_eq!(file.file_name(), "threat-actor.json");
        assert_eq!(file.stem(), "threat-actor");
        assert_eq!(file.top_dir(), Some("clusters"));

        let root = SourceFile::new("machinetag.json", b"{}".to_vec());
        assert_eq!(root.top_dir(), None);
    }

    #[test]
    fn test_relative_path() {
        let root = Path::new("/data/misp-objects");
        let path = Path::new("/data/misp-objects/objects/file/definition.json");
        assert_eq!(relative_path(root, path), "objects/file/definition.json");
    }
}
