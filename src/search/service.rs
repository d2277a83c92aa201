//! Query composition and dispatch

use super::facets::{distribution_for, filter_for};
use super::{IndexTarget, SearchRequest};
use crate::config::IndexesConfig;
use crate::metrics::{SEARCH_DURATION_SECONDS, SEARCH_REQUESTS_TOTAL};
use crate::store::{
    FederationOptions, Highlight, IndexQuery, IndexStore, SearchOptions, SearchResult, StoreError,
    StoreResult,
};
use moka::future::Cache;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// An index readers can select, with its ordinal
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoverableIndex {
    pub position: usize,
    pub name: String,
}

/// Builds search requests and sends them to the store
///
/// The discoverable index list (every index except staging ones) is cached
/// for a short time. Swaps never rename production indexes, so cached names
/// stay valid across a reindex.
pub struct QueryComposer {
    store: Arc<dyn IndexStore>,
    indexes: IndexesConfig,
    index_cache: Option<Cache<(), Arc<Vec<String>>>>,
}

impl QueryComposer {
    /// A zero `cache_ttl` disables caching.
    pub fn new(store: Arc<dyn IndexStore>, indexes: IndexesConfig, cache_ttl: Duration) -> Self {
        let index_cache = (!cache_ttl.is_zero()).then(|| {
            Cache::builder()
                .max_capacity(1)
                .time_to_live(cache_ttl)
                .build()
        });

        Self {
            store,
            indexes,
            index_cache,
        }
    }

    pub fn store(&self) -> &Arc<dyn IndexStore> {
        &self.store
    }

    /// Production index names in store order
    pub async fn discoverable_indexes(&self) -> StoreResult<Arc<Vec<String>>> {
        match &self.index_cache {
            Some(cache) => cache
                .try_get_with((), self.load_indexes())
                .await
                .map_err(Arc::unwrap_or_clone),
            None => self.load_indexes().await,
        }
    }

    /// Drop the cached index list.
    pub async fn invalidate(&self) {
        if let Some(cache) = &self.index_cache {
            cache.invalidate(&()).await;
        }
    }

    async fn load_indexes(&self) -> StoreResult<Arc<Vec<String>>> {
        let names: Vec<String> = self
            .store
            .list_indexes()
            .await?
            .into_iter()
            .filter(|name| !self.indexes.is_shadow(name))
            .collect();
        debug!(indexes = names.len(), "Loaded discoverable indexes");
        Ok(Arc::new(names))
    }

    pub async fn list(&self) -> StoreResult<Vec<DiscoverableIndex>> {
        Ok(self
            .discoverable_indexes()
            .await?
            .iter()
            .enumerate()
            .map(|(position, name)| DiscoverableIndex {
                position,
                name: name.clone(),
            })
            .collect())
    }

    /// Run a search against one index or all of them.
    pub async fn search(&self, request: &SearchRequest) -> StoreResult<SearchResult> {
        let started = Instant::now();
        let target = request.target.label();

        let result = self.dispatch(request).await;

        let status = match &result {
            Ok(Some(_)) => "ok",
            Ok(None) => "empty",
            Err(_) => "error",
        };
        SEARCH_REQUESTS_TOTAL
            .with_label_values(&[target, status])
            .inc();
        SEARCH_DURATION_SECONDS
            .with_label_values(&[target])
            .observe(started.elapsed().as_secs_f64());

        match result {
            Ok(Some(result)) => Ok(result),
            Ok(None) => Ok(SearchResult::empty()),
            Err(e) => {
                warn!(target = %request.target, error = %e, "Search failed");
                Err(e)
            }
        }
    }

    /// `None` when there is no index to search.
    async fn dispatch(&self, request: &SearchRequest) -> StoreResult<Option<SearchResult>> {
        let indexes = self.discoverable_indexes().await?;
        if indexes.is_empty() {
            debug!("No indexes to search");
            return Ok(None);
        }

        let pagination = request.pagination;
        let highlight = Some(Highlight::all_attributes());

        match request.target {
            IndexTarget::All => {
                let queries: Vec<IndexQuery> = indexes
                    .iter()
                    .map(|name| {
                        let collection = self.indexes.collection_of(name);
                        IndexQuery::new(name.as_str(), request.query.as_str())
                            .with_filter(filter_for(collection, &request.facets))
                            .with_facets(distribution_for(collection, &request.facets))
                    })
                    .collect();

                let options = FederationOptions {
                    limit: pagination.limit(),
                    offset: pagination.offset(),
                    highlight,
                };

                debug!(indexes = queries.len(), limit = options.limit, offset = options.offset, "Federated search");
                self.store.multi_search(&queries, &options).await.map(Some)
            }
            IndexTarget::Position(_) => {
                let position = request
                    .target
                    .resolve(indexes.len())
                    .ok_or_else(|| StoreError::IndexNotFound(request.target.to_string()))?;
                let index = &indexes[position];
                let collection = self.indexes.collection_of(index);

                let options = SearchOptions {
                    limit: pagination.limit(),
                    offset: pagination.offset(),
                    filter: filter_for(collection, &request.facets),
                    highlight,
                    facets: distribution_for(collection, &request.facets),
                };

                debug!(
                    index = %index,
                    filter = ?options.filter.as_ref().map(ToString::to_string),
                    limit = options.limit,
                    offset = options.offset,
                    "Single-index search"
                );
                self.store
                    .search(index, &request.query, &options)
                    .await
                    .map(Some)
            }
        }
    }
}
