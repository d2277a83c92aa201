//! Blue/green indexing and federated faceted search over the MISP galaxy,
//! object and taxonomy repositories.
//!
//! ```text
//! FreshnessWatcher ─▶ ReindexCoordinator ─▶ SourceFetcher ─▶ Normalizer ─▶ IndexStore
//! front door (api) ─▶ QueryComposer ─────────────────────────────────────▶ IndexStore
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod normalizer;
pub mod reindex;
pub mod search;
pub mod source;
pub mod store;
pub mod watcher;

pub use error::{AppError, Result};
