use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// A flat, primary-keyed document submitted to an index.
///
/// Records are plain JSON objects. Upstream documents are kept as-is apart
/// from the annotation fields the normalizer injects (`galaxy`, `namespace`,
/// `predicate`) and a synthesized primary key when the source has none.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Wrap a JSON value; anything but an object is rejected.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(field.into(), value.into());
    }

    /// Builder-style annotation
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    /// Primary key as a string, if present and scalar
    pub fn primary_key(&self, field: &str) -> Option<String> {
        match self.0.get(field)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Whether `field` holds a document id the index store accepts
    pub fn has_valid_key(&self, field: &str) -> bool {
        self.0.get(field).is_some_and(is_valid_document_id)
    }

    /// Set `field` to a UUIDv5 of `natural_key` unless the record already carries a key.
    pub fn ensure_key(&mut self, field: &str, natural_key: &str) {
        if self.primary_key(field).is_none() {
            self.insert(field, synthesize_key(natural_key).to_string());
        }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Shape of a taxonomy record, inferred from which fields are present.
    ///
    /// The taxonomy index stores three shapes side by side with no kind tag;
    /// the facet filters built by the query composer test exactly these
    /// presence rules, so they must stay in lockstep.
    pub fn taxonomy_shape(&self) -> Option<TaxonomyShape> {
        if self.contains("version") {
            Some(TaxonomyShape::Root)
        } else if self.contains("predicate") {
            Some(TaxonomyShape::Entry)
        } else if self.contains("namespace") {
            Some(TaxonomyShape::Predicate)
        } else {
            None
        }
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// The three record shapes coexisting in the taxonomy index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaxonomyShape {
    /// The machinetag document itself (`version` present)
    Root,
    /// One predicate, annotated with `namespace`
    Predicate,
    /// One value entry, annotated with `namespace` and `predicate`
    Entry,
}

/// Longest string document id the store accepts, in bytes
pub const MAX_DOCUMENT_ID_BYTES: usize = 511;

/// An unsigned integer, or a non-empty string of ASCII alphanumerics, `-`
/// and `_` of at most [`MAX_DOCUMENT_ID_BYTES`].
pub fn is_valid_document_id(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.is_u64(),
        Value::String(s) => {
            !s.is_empty()
                && s.len() <= MAX_DOCUMENT_ID_BYTES
                && s.bytes()
                    .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        }
        _ => false,
    }
}

fn synthesize_key(natural_key: &str) -> Uuid {
    Uuid::new_v5(
        &Uuid::NAMESPACE_URL,
        format!("urn:misp-global-search:{}", natural_key).as_bytes(),
    )
}
