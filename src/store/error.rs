//! Error types for index store operations

use crate::error::AppError;

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors returned by an [`IndexStore`](super::IndexStore)
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// The store could not be reached
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The store rejected the request
    #[error("Store rejected request ({status} {code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    /// An asynchronous store task finished unsuccessfully
    #[error("Task {task_uid} failed ({code}): {message}")]
    TaskFailed {
        task_uid: u64,
        code: String,
        message: String,
    },

    /// An asynchronous store task did not finish in time
    #[error("Task {0} did not complete in time")]
    TaskTimeout(u64),

    /// Index not found
    #[error("Index not found: {0}")]
    IndexNotFound(String),

    /// Response did not have the expected shape
    #[error("Invalid store response: {0}")]
    InvalidResponse(String),
}

impl StoreError {
    pub(crate) fn api(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        StoreError::Api {
            status,
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            StoreError::InvalidResponse(err.to_string())
        } else {
            StoreError::Unavailable(err.to_string())
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::IndexNotFound(name) => AppError::NotFound(format!("index {}", name)),
            _ => AppError::Store(err.to_string()),
        }
    }
}
