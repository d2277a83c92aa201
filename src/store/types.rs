//! Request and response shapes shared by store implementations

use super::FilterExpr;
use serde::Serialize;
use serde_json::{json, Value};

/// Highlight markers applied to matched terms
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Highlight {
    #[serde(rename = "attributesToHighlight")]
    pub attributes: Vec<String>,
    #[serde(rename = "highlightPreTag")]
    pub pre_tag: String,
    #[serde(rename = "highlightPostTag")]
    pub post_tag: String,
}

impl Highlight {
    /// `<mark>` / `</mark>` on every attribute
    pub fn all_attributes() -> Self {
        Self {
            attributes: vec!["*".to_string()],
            pre_tag: "<mark>".to_string(),
            post_tag: "</mark>".to_string(),
        }
    }
}

/// Options for a single-index search
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub limit: usize,
    pub offset: usize,
    pub filter: Option<FilterExpr>,
    pub highlight: Option<Highlight>,
    /// Attributes to compute a facet distribution for
    pub facets: Vec<String>,
}

/// One query of a federated search
#[derive(Debug, Clone, PartialEq)]
pub struct IndexQuery {
    pub index_uid: String,
    pub q: String,
    pub filter: Option<FilterExpr>,
    pub facets: Vec<String>,
}

impl IndexQuery {
    pub fn new(index_uid: impl Into<String>, q: impl Into<String>) -> Self {
        Self {
            index_uid: index_uid.into(),
            q: q.into(),
            filter: None,
            facets: Vec::new(),
        }
    }

    pub fn with_filter(mut self, filter: Option<FilterExpr>) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_facets(mut self, facets: Vec<String>) -> Self {
        self.facets = facets;
        self
    }
}

/// Options applied to the merged result of a federated search
#[derive(Debug, Clone, Default)]
pub struct FederationOptions {
    pub limit: usize,
    pub offset: usize,
    pub highlight: Option<Highlight>,
}

/// Store response, passed through to callers untouched
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SearchResult(pub Value);

impl SearchResult {
    /// `{"hits": []}`
    pub fn empty() -> Self {
        SearchResult(json!({ "hits": [] }))
    }

    pub fn hits(&self) -> &[Value] {
        self.0
            .get("hits")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}
