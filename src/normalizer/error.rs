//! Parse errors for a single source file

/// Why a file produced no records
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum NormalizeError {
    /// Not valid JSON
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    /// Valid JSON but not an object
    #[error("expected a JSON object at the document root")]
    NotAnObject,

    /// A required field is absent
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    /// A record's primary key is not a valid document id
    #[error("primary key {0} is not a valid document id")]
    InvalidDocumentId(String),

    /// A field has the wrong JSON type
    #[error("field '{field}' must be {expected}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },
}

impl From<serde_json::Error> for NormalizeError {
    fn from(err: serde_json::Error) -> Self {
        NormalizeError::InvalidJson(err.to_string())
    }
}
