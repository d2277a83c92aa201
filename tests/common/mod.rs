//! Shared fixtures for integration tests
//!
//! `seed_tree` writes a miniature checkout holding all three collections in
//! one directory, which `LocalTree` can walk for every collection.

#![allow(dead_code)]

use async_trait::async_trait;
use misp_global_search::config::IndexesConfig;
use misp_global_search::models::{Collection, Record};
use misp_global_search::reindex::ReindexCoordinator;
use misp_global_search::source::{LocalTree, SourceError, SourceFetcher, SourceResult, SourceStream};
use misp_global_search::store::{
    FederationOptions, IndexQuery, IndexStore, MemoryStore, SearchOptions, SearchResult,
    StoreResult,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;

pub const GALAXY_INDEX: &str = "misp-galaxy";
pub const OBJECTS_INDEX: &str = "misp-objects";
pub const TAXONOMIES_INDEX: &str = "misp-taxonomies";

pub fn write_json(root: &Path, rel: &str, value: &Value) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, serde_json::to_vec_pretty(value).unwrap()).unwrap();
}

/// Write a small upstream tree. `extra_tools` adds that many values to the
/// `tool` cluster, so successive generations differ in size.
///
/// Record counts for `extra_tools = 0`: galaxy 2, objects 2, taxonomies 7.
pub fn seed_tree(root: &Path, extra_tools: usize) {
    write_json(
        root,
        "galaxies/tool.json",
        &json!({"name": "Tool", "namespace": "misp", "type": "tool", "uuid": "gal-tool"}),
    );
    let mut tools = vec![
        json!({"value": "Mimikatz", "uuid": "tool-1", "description": "credential dumper"}),
        json!({"value": "PsExec", "uuid": "tool-2"}),
    ];
    for i in 0..extra_tools {
        tools.push(json!({"value": format!("Extra {}", i), "uuid": format!("tool-extra-{}", i)}));
    }
    write_json(
        root,
        "clusters/tool.json",
        &json!({"name": "Tool", "type": "tool", "uuid": "cl-tool", "values": tools}),
    );

    write_json(
        root,
        "galaxies/retired.json",
        &json!({"name": "Retired", "namespace": "deprecated", "type": "retired"}),
    );
    write_json(
        root,
        "clusters/retired.json",
        &json!({"name": "Retired", "values": [{"value": "Gone", "uuid": "retired-1"}]}),
    );

    write_json(
        root,
        "objects/file/definition.json",
        &json!({"name": "file", "uuid": "obj-file", "version": 24}),
    );
    write_json(
        root,
        "objects/domain-ip/definition.json",
        &json!({"name": "domain-ip", "uuid": "obj-domain-ip", "version": 9}),
    );

    write_json(
        root,
        "tlp/machinetag.json",
        &json!({
            "namespace": "tlp",
            "version": 2,
            "description": "Traffic Light Protocol",
            "predicates": [
                {"value": "red", "expanded": "TLP:RED"},
                {"value": "amber", "expanded": "TLP:AMBER"}
            ]
        }),
    );
    write_json(
        root,
        "admiralty-scale/machinetag.json",
        &json!({
            "namespace": "admiralty-scale",
            "version": 1,
            "predicates": [{"value": "source-reliability"}],
            "values": [{
                "predicate": "source-reliability",
                "entry": [
                    {"value": "a", "expanded": "Completely reliable"},
                    {"value": "b", "expanded": "Usually reliable"}
                ]
            }]
        }),
    );
}

pub fn coordinator(store: Arc<dyn IndexStore>, fetcher: Arc<dyn SourceFetcher>) -> ReindexCoordinator {
    ReindexCoordinator::new(store, fetcher, IndexesConfig::default())
}

pub fn production_counts(store: &MemoryStore) -> [usize; 3] {
    [
        store.documents(GALAXY_INDEX).len(),
        store.documents(OBJECTS_INDEX).len(),
        store.documents(TAXONOMIES_INDEX).len(),
    ]
}

/// Walks a directory but fails one collection outright
pub struct FailingFetcher {
    pub inner: LocalTree,
    pub failing: Collection,
}

#[async_trait]
impl SourceFetcher for FailingFetcher {
    async fn list_files(&self, collection: Collection) -> SourceResult<SourceStream> {
        if collection == self.failing {
            return Err(SourceError::Repository {
                repository: collection.to_string(),
                reason: "remote hung up".to_string(),
            });
        }
        self.inner.list_files(collection).await
    }
}

/// Delegates to a `MemoryStore` and, before every call, records the
/// production document counts a concurrent reader would see.
pub struct ObservingStore {
    pub inner: MemoryStore,
    pub observed: Mutex<Vec<[usize; 3]>>,
}

impl ObservingStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            observed: Mutex::new(Vec::new()),
        }
    }

    fn record_counts(&self) {
        let counts = production_counts(&self.inner);
        self.observed.lock().push(counts);
    }

    pub fn observed(&self) -> Vec<[usize; 3]> {
        self.observed.lock().clone()
    }
}

#[async_trait]
impl IndexStore for ObservingStore {
    async fn create_index(&self, index: &str, primary_key: &str) -> StoreResult<()> {
        self.record_counts();
        self.inner.create_index(index, primary_key).await
    }

    async fn delete_index(&self, index: &str) -> StoreResult<()> {
        self.record_counts();
        let result = self.inner.delete_index(index).await;
        self.record_counts();
        result
    }

    async fn upsert(&self, index: &str, records: &[Record]) -> StoreResult<()> {
        self.record_counts();
        let result = self.inner.upsert(index, records).await;
        self.record_counts();
        result
    }

    async fn set_filterable_attributes(&self, index: &str, attributes: &[&str]) -> StoreResult<()> {
        self.record_counts();
        self.inner.set_filterable_attributes(index, attributes).await
    }

    async fn swap(&self, pairs: &[(String, String)]) -> StoreResult<()> {
        self.record_counts();
        let result = self.inner.swap(pairs).await;
        self.record_counts();
        result
    }

    async fn search(&self, index: &str, query: &str, options: &SearchOptions) -> StoreResult<SearchResult> {
        self.inner.search(index, query, options).await
    }

    async fn multi_search(&self, queries: &[IndexQuery], options: &FederationOptions) -> StoreResult<SearchResult> {
        self.inner.multi_search(queries, options).await
    }

    async fn list_indexes(&self) -> StoreResult<Vec<String>> {
        self.inner.list_indexes().await
    }

    async fn document_count(&self, index: &str) -> StoreResult<u64> {
        self.inner.document_count(index).await
    }
}
