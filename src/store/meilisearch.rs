//! Meilisearch REST adapter

use super::{
    FederationOptions, Highlight, IndexQuery, IndexStore, SearchOptions, SearchResult, StoreError,
    StoreResult,
};
use crate::config::MeilisearchConfig;
use crate::models::Record;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{debug, info};

const INDEX_PAGE_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnqueuedTask {
    task_uid: u64,
}

#[derive(Debug, Deserialize)]
struct Task {
    uid: u64,
    status: String,
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
    code: String,
}

#[derive(Debug, Deserialize)]
struct IndexPage {
    results: Vec<IndexEntry>,
    total: usize,
}

#[derive(Debug, Deserialize)]
struct IndexEntry {
    uid: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexStats {
    number_of_documents: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateIndexBody<'a> {
    uid: &'a str,
    primary_key: &'a str,
}

#[derive(Serialize)]
struct SwapBody<'a> {
    indexes: [&'a str; 2],
}

#[derive(Serialize)]
struct SearchBody<'a> {
    q: &'a str,
    limit: usize,
    offset: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<String>,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    facets: &'a [String],
    #[serde(flatten)]
    highlight: Option<&'a Highlight>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Federation {
    limit: usize,
    offset: usize,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    facets_by_index: BTreeMap<String, Vec<String>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FederatedQuery<'a> {
    index_uid: &'a str,
    q: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<String>,
    #[serde(flatten)]
    highlight: Option<&'a Highlight>,
}

#[derive(Serialize)]
struct MultiSearchBody<'a> {
    federation: Federation,
    queries: Vec<FederatedQuery<'a>>,
}

/// [`IndexStore`] backed by a Meilisearch server
///
/// Every write is enqueued as a Meilisearch task and awaited before the call
/// returns, so a returned `Ok` means the change is visible.
#[derive(Clone)]
pub struct MeilisearchStore {
    client: Client,
    base_url: String,
    admin_key: Option<String>,
    search_key: Option<String>,
    poll_interval: Duration,
    task_timeout: Duration,
}

impl MeilisearchStore {
    pub fn new(config: &MeilisearchConfig) -> StoreResult<Self> {
        let client = Client::builder()
            .user_agent(concat!("misp-global-search/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StoreError::Unavailable(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            admin_key: config.admin_api_key.clone(),
            search_key: config.search_key().map(str::to_string),
            poll_interval: Duration::from_millis(config.task_poll_interval_ms.max(1)),
            task_timeout: Duration::from_secs(config.task_timeout_secs),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn admin(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.admin_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    fn searcher(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.search_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> StoreResult<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(match serde_json::from_str::<ApiErrorBody>(&body) {
            Ok(err) => StoreError::api(status.as_u16(), err.code, err.message),
            Err(_) => StoreError::api(status.as_u16(), "http_error", body),
        })
    }

    /// Send a write request and wait for the resulting task.
    async fn enqueue(&self, request: RequestBuilder) -> StoreResult<()> {
        let enqueued: EnqueuedTask = self.send(self.admin(request)).await?.json().await?;
        self.wait_for_task(enqueued.task_uid).await
    }

    async fn wait_for_task(&self, task_uid: u64) -> StoreResult<()> {
        let started = Instant::now();
        let url = self.url(&format!("/tasks/{}", task_uid));

        loop {
            let task: Task = self
                .send(self.admin(self.client.get(&url)))
                .await?
                .json()
                .await?;

            match task.status.as_str() {
                "succeeded" => {
                    debug!(task_uid = task.uid, elapsed_ms = started.elapsed().as_millis() as u64, "Task succeeded");
                    return Ok(());
                }
                "failed" | "canceled" => {
                    let (code, message) = task
                        .error
                        .map(|e| (e.code, e.message))
                        .unwrap_or_else(|| (task.status.clone(), "task did not succeed".to_string()));
                    return Err(StoreError::TaskFailed {
                        task_uid: task.uid,
                        code,
                        message,
                    });
                }
                _ => {}
            }

            if started.elapsed() >= self.task_timeout {
                return Err(StoreError::TaskTimeout(task_uid));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

fn has_code(err: &StoreError, expected: &str) -> bool {
    match err {
        StoreError::Api { code, .. } | StoreError::TaskFailed { code, .. } => code == expected,
        _ => false,
    }
}

fn not_found(err: StoreError, index: &str) -> StoreError {
    if has_code(&err, "index_not_found") {
        StoreError::IndexNotFound(index.to_string())
    } else {
        err
    }
}

#[async_trait]
impl IndexStore for MeilisearchStore {
    async fn create_index(&self, index: &str, primary_key: &str) -> StoreResult<()> {
        let request = self.client.post(self.url("/indexes")).json(&CreateIndexBody {
            uid: index,
            primary_key,
        });

        match self.enqueue(request).await {
            Ok(()) => {
                info!(index = %index, primary_key = %primary_key, "Index created");
                Ok(())
            }
            Err(e) if has_code(&e, "index_already_exists") => {
                debug!(index = %index, "Index already exists");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn delete_index(&self, index: &str) -> StoreResult<()> {
        let request = self.client.delete(self.url(&format!("/indexes/{}", index)));

        match self.enqueue(request).await {
            Ok(()) => {
                info!(index = %index, "Index deleted");
                Ok(())
            }
            Err(e) if has_code(&e, "index_not_found") => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn upsert(&self, index: &str, records: &[Record]) -> StoreResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        debug!(index = %index, documents = records.len(), "Submitting documents");
        let request = self
            .client
            .post(self.url(&format!("/indexes/{}/documents", index)))
            .json(records);
        self.enqueue(request).await.map_err(|e| not_found(e, index))
    }

    async fn set_filterable_attributes(&self, index: &str, attributes: &[&str]) -> StoreResult<()> {
        let request = self
            .client
            .put(self.url(&format!(
                "/indexes/{}/settings/filterable-attributes",
                index
            )))
            .json(attributes);
        self.enqueue(request).await.map_err(|e| not_found(e, index))
    }

    async fn swap(&self, pairs: &[(String, String)]) -> StoreResult<()> {
        if pairs.is_empty() {
            return Ok(());
        }

        let body: Vec<SwapBody<'_>> = pairs
            .iter()
            .map(|(a, b)| SwapBody {
                indexes: [a.as_str(), b.as_str()],
            })
            .collect();

        let request = self.client.post(self.url("/swap-indexes")).json(&body);
        self.enqueue(request).await?;
        info!(pairs = pairs.len(), "Indexes swapped");
        Ok(())
    }

    async fn search(
        &self,
        index: &str,
        query: &str,
        options: &SearchOptions,
    ) -> StoreResult<SearchResult> {
        let body = SearchBody {
            q: query,
            limit: options.limit,
            offset: options.offset,
            filter: options.filter.as_ref().map(ToString::to_string),
            facets: &options.facets,
            highlight: options.highlight.as_ref(),
        };

        let request = self
            .client
            .post(self.url(&format!("/indexes/{}/search", index)))
            .json(&body);
        let value: Value = self
            .send(self.searcher(request))
            .await
            .map_err(|e| not_found(e, index))?
            .json()
            .await?;
        Ok(SearchResult(value))
    }

    async fn multi_search(
        &self,
        queries: &[IndexQuery],
        options: &FederationOptions,
    ) -> StoreResult<SearchResult> {
        let facets_by_index = queries
            .iter()
            .filter(|q| !q.facets.is_empty())
            .map(|q| (q.index_uid.clone(), q.facets.clone()))
            .collect();

        let body = MultiSearchBody {
            federation: Federation {
                limit: options.limit,
                offset: options.offset,
                facets_by_index,
            },
            queries: queries
                .iter()
                .map(|q| FederatedQuery {
                    index_uid: &q.index_uid,
                    q: &q.q,
                    filter: q.filter.as_ref().map(ToString::to_string),
                    highlight: options.highlight.as_ref(),
                })
                .collect(),
        };

        let request = self.client.post(self.url("/multi-search")).json(&body);
        let value: Value = self.send(self.searcher(request)).await?.json().await?;
        Ok(SearchResult(value))
    }

    async fn list_indexes(&self) -> StoreResult<Vec<String>> {
        let mut names = Vec::new();
        let mut offset = 0;

        loop {
            let request = self
                .client
                .get(self.url("/indexes"))
                .query(&[("offset", offset), ("limit", INDEX_PAGE_SIZE)]);
            let page: IndexPage = self.send(self.admin(request)).await?.json().await?;

            let fetched = page.results.len();
            names.extend(page.results.into_iter().map(|entry| entry.uid));
            offset += fetched;

            if fetched == 0 || offset >= page.total {
                break;
            }
        }

        Ok(names)
    }

    async fn document_count(&self, index: &str) -> StoreResult<u64> {
        let request = self
            .client
            .get(self.url(&format!("/indexes/{}/stats", index)));
        let stats: IndexStats = self
            .send(self.admin(request))
            .await
            .map_err(|e| not_found(e, index))?
            .json()
            .await?;
        Ok(stats.number_of_documents)
    }

    async fn health(&self) -> StoreResult<()> {
        self.send(self.client.get(self.url("/health"))).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FilterExpr;
    use serde_json::json;

    #[test]
    fn test_search_body_shape() {
        let highlight = Highlight::all_attributes();
        let facets = vec!["galaxy".to_string()];
        let body = SearchBody {
            q: "apt",
            limit: 10,
            offset: 20,
            filter: Some(FilterExpr::equals("galaxy", "tool").to_string()),
            facets: &facets,
            highlight: Some(&highlight),
        };

        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(
            value,
            json!({
                "q": "apt",
                "limit": 10,
                "offset": 20,
                "filter": "galaxy = 'tool'",
                "facets": ["galaxy"],
                "attributesToHighlight": ["*"],
                "highlightPreTag": "<mark>",
                "highlightPostTag": "</mark>"
            })
        );
    }

    #[test]
    fn test_search_body_omits_empty_parts() {
        let body = SearchBody {
            q: "",
            limit: 10,
            offset: 0,
            filter: None,
            facets: &[],
            highlight: None,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value, json!({"q": "", "limit": 10, "offset": 0}));
    }

    #[test]
    fn test_federation_shape() {
        let highlight = Highlight::all_attributes();
        let body = MultiSearchBody {
            federation: Federation {
                limit: 5,
                offset: 5,
                facets_by_index: BTreeMap::new(),
            },
            queries: vec![FederatedQuery {
                index_uid: "misp-objects",
                q: "file",
                filter: None,
                highlight: Some(&highlight),
            }],
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["federation"], json!({"limit": 5, "offset": 5}));
        assert_eq!(value["queries"][0]["indexUid"], "misp-objects");
        assert_eq!(value["queries"][0]["highlightPreTag"], "<mark>");
        assert!(value["queries"][0].get("limit").is_none());
    }
}
