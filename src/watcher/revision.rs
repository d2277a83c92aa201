//! Upstream head lookup

use crate::config::{RepositoryConfig, SourcesConfig};
use crate::source::{SourceError, SourceResult};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

/// Reports the current head revision of a repository branch
#[async_trait]
pub trait RevisionSource: Send + Sync {
    async fn head(&self, repository: &RepositoryConfig) -> SourceResult<String>;
}

#[derive(Debug, Deserialize)]
struct CommitEntry {
    sha: String,
}

/// Reads heads from `GET /repos/{owner}/{repo}/commits?sha={branch}&per_page=1`
#[derive(Clone)]
pub struct GithubCommits {
    client: Client,
    api_url: String,
}

impl GithubCommits {
    pub fn new(config: &SourcesConfig) -> SourceResult<Self> {
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

        Ok(Self {
            client,
            api_url: config.github_api_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl RevisionSource for GithubCommits {
    async fn head(&self, repository: &RepositoryConfig) -> SourceResult<String> {
        let url = format!(
            "{}/repos/{}/{}/commits",
            self.api_url, repository.owner, repository.repo
        );
        let failed = |reason: String| SourceError::Repository {
            repository: repository.id(),
            reason,
        };

        let commits: Vec<CommitEntry> = self
            .client
            .get(&url)
            .query(&[("sha", repository.branch.as_str()), ("per_page", "1")])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| failed(e.to_string()))?
            .json()
            .await
            .map_err(|e| failed(e.to_string()))?;

        commits
            .into_iter()
            .next()
            .map(|c| c.sha)
            .ok_or_else(|| failed(format!("no commits on branch {}", repository.branch)))
    }
}
