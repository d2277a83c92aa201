//! In-process index store

use super::{
    FederationOptions, FilterExpr, Highlight, IndexQuery, IndexStore, SearchOptions, SearchResult,
    StoreError, StoreResult,
};
use crate::models::Record;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone)]
struct MemoryIndex {
    primary_key: String,
    documents: BTreeMap<String, Record>,
    filterable: Vec<String>,
}

impl MemoryIndex {
    fn new(primary_key: &str) -> Self {
        Self {
            primary_key: primary_key.to_string(),
            documents: BTreeMap::new(),
            filterable: Vec::new(),
        }
    }

    fn check_filter(&self, name: &str, filter: Option<&FilterExpr>) -> StoreResult<()> {
        let Some(filter) = filter else {
            return Ok(());
        };
        match filter
            .attributes()
            .into_iter()
            .find(|attr| !self.filterable.iter().any(|f| f == attr))
        {
            Some(attr) => Err(StoreError::api(
                400,
                "invalid_search_filter",
                format!("attribute `{}` is not filterable in index `{}`", attr, name),
            )),
            None => Ok(()),
        }
    }

    fn matching<'a>(
        &'a self,
        query: &'a str,
        filter: Option<&'a FilterExpr>,
    ) -> impl Iterator<Item = &'a Record> + 'a {
        let terms = terms(query);
        self.documents.values().filter(move |record| {
            filter.map(|f| f.matches(record)).unwrap_or(true)
                && terms
                    .iter()
                    .all(|t| record.as_map().values().any(|v| contains_term(v, t)))
        })
    }
}

/// [`IndexStore`] that keeps indexes in memory
///
/// Swaps run under a single write lock so readers never observe a partial
/// swap. [`MemoryStore::fail_next_swap`] makes the next swap fail without
/// changing anything.
#[derive(Clone, Default)]
pub struct MemoryStore {
    indexes: Arc<RwLock<BTreeMap<String, MemoryIndex>>>,
    fail_next_swap: Arc<AtomicBool>,
    swaps: Arc<AtomicU64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next call to `swap` fail.
    pub fn fail_next_swap(&self) {
        self.fail_next_swap.store(true, Ordering::SeqCst);
    }

    /// Number of successful swaps so far
    pub fn swap_count(&self) -> u64 {
        self.swaps.load(Ordering::SeqCst)
    }

    /// Copy of every document in an index, ordered by primary key
    pub fn documents(&self, index: &str) -> Vec<Record> {
        self.indexes
            .read()
            .get(index)
            .map(|idx| idx.documents.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn filterable_attributes(&self, index: &str) -> Vec<String> {
        self.indexes
            .read()
            .get(index)
            .map(|idx| idx.filterable.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl IndexStore for MemoryStore {
    async fn create_index(&self, index: &str, primary_key: &str) -> StoreResult<()> {
        self.indexes
            .write()
            .entry(index.to_string())
            .or_insert_with(|| MemoryIndex::new(primary_key));
        Ok(())
    }

    async fn delete_index(&self, index: &str) -> StoreResult<()> {
        self.indexes.write().remove(index);
        Ok(())
    }

    async fn upsert(&self, index: &str, records: &[Record]) -> StoreResult<()> {
        let mut indexes = self.indexes.write();
        let idx = indexes
            .get_mut(index)
            .ok_or_else(|| StoreError::IndexNotFound(index.to_string()))?;

        // Validate the whole batch first so a bad record leaves nothing behind
        let mut keyed = Vec::with_capacity(records.len());
        for record in records {
            let key = record.primary_key(&idx.primary_key).ok_or_else(|| {
                StoreError::api(
                    400,
                    "missing_document_id",
                    format!("document has no `{}` attribute", idx.primary_key),
                )
            })?;
            if !record.has_valid_key(&idx.primary_key) {
                return Err(StoreError::api(
                    400,
                    "invalid_document_id",
                    format!("document identifier `{}` is invalid", key),
                ));
            }
            keyed.push((key, record.clone()));
        }

        idx.documents.extend(keyed);
        Ok(())
    }

    async fn set_filterable_attributes(&self, index: &str, attributes: &[&str]) -> StoreResult<()> {
        let mut indexes = self.indexes.write();
        let idx = indexes
            .get_mut(index)
            .ok_or_else(|| StoreError::IndexNotFound(index.to_string()))?;
        idx.filterable = attributes.iter().map(|a| a.to_string()).collect();
        Ok(())
    }

    async fn swap(&self, pairs: &[(String, String)]) -> StoreResult<()> {
        let mut indexes = self.indexes.write();

        for (a, b) in pairs {
            for name in [a, b] {
                if !indexes.contains_key(name) {
                    return Err(StoreError::IndexNotFound(name.clone()));
                }
            }
        }

        if self.fail_next_swap.swap(false, Ordering::SeqCst) {
            return Err(StoreError::TaskFailed {
                task_uid: 0,
                code: "internal".to_string(),
                message: "injected swap failure".to_string(),
            });
        }

        for (a, b) in pairs.iter().filter(|(a, b)| a != b) {
            if let (Some(left), Some(right)) = (indexes.remove(a), indexes.remove(b)) {
                indexes.insert(a.clone(), right);
                indexes.insert(b.clone(), left);
            }
        }

        self.swaps.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn search(
        &self,
        index: &str,
        query: &str,
        options: &SearchOptions,
    ) -> StoreResult<SearchResult> {
        let indexes = self.indexes.read();
        let idx = indexes
            .get(index)
            .ok_or_else(|| StoreError::IndexNotFound(index.to_string()))?;
        idx.check_filter(index, options.filter.as_ref())?;

        let matched: Vec<&Record> = idx.matching(query, options.filter.as_ref()).collect();
        let total = matched.len();

        let hits: Vec<Value> = matched
            .iter()
            .skip(options.offset)
            .take(options.limit)
            .map(|record| hit(record, query, options.highlight.as_ref(), None))
            .collect();

        let mut response = json!({
            "hits": hits,
            "query": query,
            "limit": options.limit,
            "offset": options.offset,
            "estimatedTotalHits": total,
            "processingTimeMs": 0,
        });
        if !options.facets.is_empty() {
            response["facetDistribution"] = facet_distribution(&matched, &options.facets);
        }

        Ok(SearchResult(response))
    }

    async fn multi_search(
        &self,
        queries: &[IndexQuery],
        options: &FederationOptions,
    ) -> StoreResult<SearchResult> {
        let indexes = self.indexes.read();
        let mut merged = Vec::new();
        let mut facets_by_index = Map::new();

        for (position, query) in queries.iter().enumerate() {
            let idx = indexes
                .get(&query.index_uid)
                .ok_or_else(|| StoreError::IndexNotFound(query.index_uid.clone()))?;
            idx.check_filter(&query.index_uid, query.filter.as_ref())?;

            let matched: Vec<&Record> = idx.matching(&query.q, query.filter.as_ref()).collect();
            if !query.facets.is_empty() {
                facets_by_index.insert(
                    query.index_uid.clone(),
                    json!({ "distribution": facet_distribution(&matched, &query.facets) }),
                );
            }

            let federation = json!({ "indexUid": query.index_uid, "queriesPosition": position });
            merged.extend(
                matched
                    .into_iter()
                    .map(|record| hit(record, &query.q, options.highlight.as_ref(), Some(&federation))),
            );
        }

        let total = merged.len();
        let hits: Vec<Value> = merged
            .into_iter()
            .skip(options.offset)
            .take(options.limit)
            .collect();

        let mut response = json!({
            "hits": hits,
            "limit": options.limit,
            "offset": options.offset,
            "estimatedTotalHits": total,
            "processingTimeMs": 0,
        });
        if !facets_by_index.is_empty() {
            response["facetsByIndex"] = Value::Object(facets_by_index);
        }

        Ok(SearchResult(response))
    }

    async fn list_indexes(&self) -> StoreResult<Vec<String>> {
        Ok(self.indexes.read().keys().cloned().collect())
    }

    async fn document_count(&self, index: &str) -> StoreResult<u64> {
        self.indexes
            .read()
            .get(index)
            .map(|idx| idx.documents.len() as u64)
            .ok_or_else(|| StoreError::IndexNotFound(index.to_string()))
    }

    async fn index_exists(&self, index: &str) -> StoreResult<bool> {
        Ok(self.indexes.read().contains_key(index))
    }
}

fn terms(query: &str) -> Vec<String> {
    query.split_whitespace().map(str::to_lowercase).collect()
}

fn contains_term(value: &Value, term: &str) -> bool {
    match value {
        Value::String(s) => s.to_lowercase().contains(term),
        Value::Number(n) => n.to_string().contains(term),
        Value::Array(items) => items.iter().any(|v| contains_term(v, term)),
        Value::Object(map) => map.values().any(|v| contains_term(v, term)),
        _ => false,
    }
}

fn hit(record: &Record, query: &str, highlight: Option<&Highlight>, federation: Option<&Value>) -> Value {
    let mut document = record.as_map().clone();

    if let Some(highlight) = highlight {
        let terms = terms(query);
        let formatted: Map<String, Value> = record
            .as_map()
            .iter()
            .map(|(field, value)| (field.clone(), mark(value, &terms, highlight)))
            .collect();
        document.insert("_formatted".to_string(), Value::Object(formatted));
    }
    if let Some(federation) = federation {
        document.insert("_federation".to_string(), federation.clone());
    }

    Value::Object(document)
}

fn mark(value: &Value, terms: &[String], highlight: &Highlight) -> Value {
    match value {
        Value::String(s) => Value::String(mark_str(s, terms, highlight)),
        Value::Array(items) => Value::Array(items.iter().map(|v| mark(v, terms, highlight)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), mark(v, terms, highlight)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Wrap ASCII case-insensitive term occurrences in the highlight tags
fn mark_str(text: &str, terms: &[String], highlight: &Highlight) -> String {
    if terms.is_empty() || !text.is_ascii() {
        return text.to_string();
    }

    let lower = text.to_ascii_lowercase();
    let mut out = String::with_capacity(text.len());
    let mut pos = 0;

    while pos < text.len() {
        let found = terms
            .iter()
            .filter(|t| !t.is_empty() && lower[pos..].starts_with(t.as_str()))
            .map(|t| t.len())
            .max();
        match found {
            Some(len) => {
                out.push_str(&highlight.pre_tag);
                out.push_str(&text[pos..pos + len]);
                out.push_str(&highlight.post_tag);
                pos += len;
            }
            None => {
                out.push_str(&text[pos..pos + 1]);
                pos += 1;
            }
        }
    }
    out
}

fn facet_distribution(records: &[&Record], facets: &[String]) -> Value {
    let mut distribution = Map::new();
    for facet in facets {
        let mut counts: BTreeMap<String, u64> = BTreeMap::new();
        for record in records {
            match record.get(facet) {
                Some(Value::Array(items)) => {
                    for item in items {
                        if let Some(key) = facet_key(item) {
                            *counts.entry(key).or_default() += 1;
                        }
                    }
                }
                Some(value) => {
                    if let Some(key) = facet_key(value) {
                        *counts.entry(key).or_default() += 1;
                    }
                }
                None => {}
            }
        }
        distribution.insert(facet.clone(), json!(counts));
    }
    Value::Object(distribution)
}

fn facet_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
