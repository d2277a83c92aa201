//! Error types for source fetching

/// Result type for source operations
pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// Errors raised while fetching upstream files
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Clone, pull or root listing failed; nothing can be fetched for the collection
    #[error("Repository {repository} unavailable: {reason}")]
    Repository { repository: String, reason: String },

    /// A collection directory is missing from the repository
    #[error("Collection root not found: {0}")]
    MissingRoot(String),

    /// One file (or sub-directory) could not be fetched
    #[error("Failed to fetch {path}: {reason}")]
    File { path: String, reason: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SourceError {
    pub(crate) fn file(path: impl Into<String>, reason: impl ToString) -> Self {
        SourceError::File {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
