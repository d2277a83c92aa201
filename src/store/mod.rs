//! Search index storage
//!
//! [`IndexStore`] is the narrow surface the reindex coordinator and the query
//! composer need from the search engine. [`MeilisearchStore`] talks to a live
//! Meilisearch instance; [`MemoryStore`] keeps everything in process and is
//! used by tests and local tooling.
//!
//! Writes are durable once the call returns: implementations backed by an
//! asynchronous task queue wait for the task to finish before returning.

mod error;
mod filter;
mod meilisearch;
mod memory;
mod types;

pub use error::{StoreError, StoreResult};
pub use filter::FilterExpr;
pub use meilisearch::MeilisearchStore;
pub use memory::MemoryStore;
pub use types::{FederationOptions, Highlight, IndexQuery, SearchOptions, SearchResult};

use crate::models::Record;
use async_trait::async_trait;

#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Create an index; succeeds if it already exists.
    async fn create_index(&self, index: &str, primary_key: &str) -> StoreResult<()>;

    /// Delete an index; succeeds if it does not exist.
    async fn delete_index(&self, index: &str) -> StoreResult<()>;

    /// Insert or replace records by primary key.
    async fn upsert(&self, index: &str, records: &[Record]) -> StoreResult<()>;

    async fn set_filterable_attributes(&self, index: &str, attributes: &[&str]) -> StoreResult<()>;

    /// Exchange the contents of every pair in one atomic operation.
    ///
    /// Either all pairs are swapped or none are.
    async fn swap(&self, pairs: &[(String, String)]) -> StoreResult<()>;

    async fn search(
        &self,
        index: &str,
        query: &str,
        options: &SearchOptions,
    ) -> StoreResult<SearchResult>;

    /// Run several queries and merge their hits into one ranked list.
    async fn multi_search(
        &self,
        queries: &[IndexQuery],
        options: &FederationOptions,
    ) -> StoreResult<SearchResult>;

    /// Names of all existing indexes
    async fn list_indexes(&self) -> StoreResult<Vec<String>>;

    async fn document_count(&self, index: &str) -> StoreResult<u64>;

    async fn index_exists(&self, index: &str) -> StoreResult<bool> {
        Ok(self.list_indexes().await?.iter().any(|name| name == index))
    }

    /// Check the store is reachable.
    async fn health(&self) -> StoreResult<()> {
        self.list_indexes().await.map(|_| ())
    }
}
