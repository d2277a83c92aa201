pub mod handlers;
pub mod routes;

pub use routes::*;

use crate::search::QueryComposer;
use std::sync::Arc;
use std::time::Instant;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub composer: Arc<QueryComposer>,
    /// Page size used when a request omits `pageSize`
    pub default_page_size: i64,
    pub metrics_enabled: bool,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(composer: Arc<QueryComposer>) -> Self {
        Self {
            composer,
            default_page_size: 10,
            metrics_enabled: true,
            started_at: Instant::now(),
        }
    }

    pub fn with_default_page_size(mut self, page_size: i64) -> Self {
        self.default_page_size = page_size;
        self
    }

    pub fn with_metrics(mut self, enabled: bool) -> Self {
        self.metrics_enabled = enabled;
        self
    }
}
