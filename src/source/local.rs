//! Working-tree based fetching

use super::{relative_path, SourceError, SourceFetcher, SourceFile, SourceResult, SourceStream};
use crate::config::{RepositoryConfig, SourcesConfig};
use crate::models::Collection;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

/// Walks an existing directory tree laid out like an upstream repository
#[derive(Debug, Clone)]
pub struct LocalTree {
    root: PathBuf,
}

impl LocalTree {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Lazily walk a collection's source roots depth-first.
    pub fn walk(&self, collection: Collection) -> SourceResult<SourceStream> {
        let mut walkers = Vec::new();

        for dir in collection.source_roots() {
            let base = if dir.is_empty() {
                self.root.clone()
            } else {
                self.root.join(dir)
            };

            if !base.is_dir() {
                return Err(SourceError::MissingRoot(base.display().to_string()));
            }

            let mut walker = WalkDir::new(&base).min_depth(1).sort_by_file_name();
            if !collection.recursive() {
                walker = walker.max_depth(1);
            }
            walkers.push(walker.into_iter().filter_entry(|e| !is_hidden(e)));
        }

        let walk_root = self.root.clone();
        let paths = walkers
            .into_iter()
            .flatten()
            .filter_map(move |entry| match entry {
                Ok(entry) => {
                    let accepted = entry.file_type().is_file()
                        && collection.accepts(&entry.file_name().to_string_lossy());
                    accepted.then(|| Ok(entry.into_path()))
                }
                Err(err) => {
                    let path = err
                        .path()
                        .map(|p| relative_path(&walk_root, p))
                        .unwrap_or_default();
                    Some(Err(SourceError::file(path, err)))
                }
            });

        let read_root = self.root.clone();
        let files = stream::iter(paths)
            .then(move |item| {
                let root = read_root.clone();
                async move {
                    let path = item?;
                    let relative = relative_path(&root, &path);
                    match tokio::fs::read(&path).await {
                        Ok(contents) => Ok(SourceFile::new(relative, contents)),
                        Err(e) => Err(SourceError::file(relative, e)),
                    }
                }
            })
            .boxed();

        Ok(files)
    }
}

#[async_trait]
impl SourceFetcher for LocalTree {
    async fn list_files(&self, collection: Collection) -> SourceResult<SourceStream> {
        self.walk(collection)
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

/// Clones (or pulls) each repository under `data_dir`, then walks the checkout
#[derive(Debug, Clone)]
pub struct GitCheckout {
    config: SourcesConfig,
}

impl GitCheckout {
    pub fn new(config: SourcesConfig) -> Self {
        Self { config }
    }

    pub fn checkout_dir(&self, repository: &RepositoryConfig) -> PathBuf {
        self.config.data_dir.join(&repository.repo)
    }

    /// Bring the working tree up to date with the tracked branch.
    pub async fn sync(&self, repository: &RepositoryConfig) -> SourceResult<PathBuf> {
        let local_path = self.checkout_dir(repository);

        if local_path.exists() {
            info!(
                repository = %repository.id(),
                path = %local_path.display(),
                "Repository already checked out, pulling latest changes"
            );
            let dir = local_path.to_string_lossy().into_owned();
            run_git(&["-C", &dir, "pull"], repository).await?;
        } else {
            info!(
                repository = %repository.id(),
                path = %local_path.display(),
                "Cloning repository"
            );
            tokio::fs::create_dir_all(&self.config.data_dir).await?;
            let dir = local_path.to_string_lossy().into_owned();
            let url = repository.clone_url();
            run_git(
                &["clone", "--branch", &repository.branch, &url, &dir],
                repository,
            )
            .await?;
        }

        Ok(local_path)
    }
}

#[async_trait]
impl SourceFetcher for GitCheckout {
    async fn list_files(&self, collection: Collection) -> SourceResult<SourceStream> {
        let repository = self.config.repository(collection);
        let root = self.sync(repository).await?;
        LocalTree::new(root).walk(collection)
    }
}

async fn run_git(args: &[&str], repository: &RepositoryConfig) -> SourceResult<()> {
    debug!(repository = %repository.id(), args = ?args, "Running git");

    let output = Command::new("git")
        .args(args)
        .output()
        .await
        .map_err(|e| SourceError::Repository {
            repository: repository.id(),
            reason: format!("failed to run git: {}", e),
        })?;

    if !output.status.success() {
        return Err(SourceError::Repository {
            repository: repository.id(),
            reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(())
}
