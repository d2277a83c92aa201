use crate::models::Collection;
use crate::source::SourceError;
use crate::store::StoreError;

/// Errors that abort a reindex cycle
#[derive(Debug, thiserror::Error)]
pub enum ReindexError {
    /// A collection's files could not be fetched at all
    #[error("Fetching {collection} failed: {source}")]
    Fetch {
        collection: Collection,
        #[source]
        source: SourceError,
    },

    /// The normalization task panicked or was cancelled
    #[error("Normalizing {collection} did not complete: {source}")]
    Normalize {
        collection: Collection,
        #[source]
        source: tokio::task::JoinError,
    },

    /// Writing a collection's index failed
    #[error("Writing {collection} into {index} failed: {source}")]
    Write {
        collection: Collection,
        index: String,
        #[source]
        source: StoreError,
    },

    /// The swap did not succeed; nothing was deleted
    #[error("Swap failed, production indexes left untouched: {0}")]
    Swap(#[source] StoreError),

    /// Another cycle is already running
    #[error("A reindex cycle is already running")]
    AlreadyRunning,

    /// Any other store failure
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl ReindexError {
    pub fn collection(&self) -> Option<Collection> {
        match self {
            ReindexError::Fetch { collection, .. }
            | ReindexError::Normalize { collection, .. }
            | ReindexError::Write { collection, .. } => Some(*collection),
            _ => None,
        }
    }
}
