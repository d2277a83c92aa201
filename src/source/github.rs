//! GitHub contents API fetching

use super::{SourceError, SourceFetcher, SourceFile, SourceResult, SourceStream};
use crate::config::{RepositoryConfig, SourcesConfig};
use crate::models::Collection;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct ContentEntry {
    name: String,
    path: String,
    #[serde(rename = "type")]
    kind: String,
    download_url: Option<String>,
}

/// Walks a repository through `GET /repos/{owner}/{repo}/contents/{path}`
#[derive(Clone)]
pub struct GithubTree {
    client: Client,
    config: SourcesConfig,
}

impl GithubTree {
    pub fn new(config: SourcesConfig) -> SourceResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        if let Some(token) = config.github_token() {
            let value = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|e| {
                SourceError::Repository {
                    repository: "github".to_string(),
                    reason: format!("invalid token: {}", e),
                }
            })?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .user_agent(concat!("misp-global-search/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SourceError::Repository {
                repository: "github".to_string(),
                reason: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl SourceFetcher for GithubTree {
    async fn list_files(&self, collection: Collection) -> SourceResult<SourceStream> {
        let walk = TreeWalk::new(
            self.client.clone(),
            self.config.github_api_url.trim_end_matches('/').to_string(),
            self.config.repository(collection).clone(),
            collection,
        );

        Ok(stream::unfold(walk, |mut walk| async move {
            walk.next_file().await.map(|item| (item, walk))
        })
        .boxed())
    }
}

enum Pending {
    Dir { path: String, root: bool },
    File { path: String, url: String },
}

/// Depth-first walk with an explicit stack, so memory stays proportional to
/// the tree's breadth rather than its size. Each walk starts from the roots.
struct TreeWalk {
    client: Client,
    api_url: String,
    repository: RepositoryConfig,
    collection: Collection,
    stack: Vec<Pending>,
}

impl TreeWalk {
    fn new(
        client: Client,
        api_url: String,
        repository: RepositoryConfig,
        collection: Collection,
    ) -> Self {
        let stack = collection
            .source_roots()
            .iter()
            .rev()
            .map(|root| Pending::Dir {
                path: root.to_string(),
                root: true,
            })
            .collect();

        Self {
            client,
            api_url,
            repository,
            collection,
            stack,
        }
    }

    async fn next_file(&mut self) -> Option<SourceResult<SourceFile>> {
        while let Some(pending) = self.stack.pop() {
            match pending {
                Pending::Dir { path, root } => match self.list_dir(&path).await {
                    Ok(entries) => self.push_entries(entries),
                    Err(reason) if root => {
                        self.stack.clear();
                        return Some(Err(SourceError::Repository {
                            repository: self.repository.id(),
                            reason: format!("listing '{}' failed: {}", path, reason),
                        }));
                    }
                    Err(reason) => return Some(Err(SourceError::file(path, reason))),
                },
                Pending::File { path, url } => {
                    return Some(match self.download(&url).await {
                        Ok(contents) => Ok(SourceFile::new(path, contents)),
                        Err(reason) => Err(SourceError::file(path, reason)),
                    });
                }
            }
        }
        None
    }

    fn push_entries(&mut self, entries: Vec<ContentEntry>) {
        // Reversed so the stack pops entries in listing order
        for entry in entries.into_iter().rev() {
            match entry.kind.as_str() {
                "dir" if self.collection.recursive() => {
                    if !entry.name.starts_with('.') {
                        self.stack.push(Pending::Dir {
                            path: entry.path,
                            root: false,
                        });
                    }
                }
                "file" if self.collection.accepts(&entry.name) => {
                    if let Some(url) = entry.download_url {
                        self.stack.push(Pending::File {
                            path: entry.path,
                            url,
                        });
                    }
                }
                _ => {}
            }
        }
    }

    async fn list_dir(&self, path: &str) -> Result<Vec<ContentEntry>, reqwest::Error> {
        let url = if path.is_empty() {
            format!(
                "{}/repos/{}/{}/contents",
                self.api_url, self.repository.owner, self.repository.repo
            )
        } else {
            format!(
                "{}/repos/{}/{}/contents/{}",
                self.api_url, self.repository.owner, self.repository.repo, path
            )
        };

        debug!(url = %url, "Listing directory");

        self.client
            .get(&url)
            .query(&[("ref", self.repository.branch.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, reqwest::Error> {
        let bytes = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(bytes.to_vec())
    }
}
