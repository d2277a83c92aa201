use super::ReindexMode;
use crate::models::Collection;
use crate::normalizer::BatchSummary;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// What one collection contributed to a cycle
#[derive(Debug, Clone, Serialize)]
pub struct CollectionReport {
    pub collection: Collection,
    /// Index the records were written to
    pub index: String,
    pub records_written: usize,
    pub summary: BatchSummary,
}

/// Outcome of a successful cycle
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub mode: ReindexMode,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub collections: Vec<CollectionReport>,
    /// Whether the store acknowledged the swap
    pub swap_confirmed: bool,
    /// Old-generation indexes deleted after the swap
    pub retired: Vec<String>,
}

impl CycleReport {
    pub fn records_written(&self) -> usize {
        self.collections.iter().map(|c| c.records_written).sum()
    }

    pub fn failed_files(&self) -> usize {
        self.collections.iter().map(|c| c.summary.failed_files).sum()
    }

    pub fn collection(&self, collection: Collection) -> Option<&CollectionReport> {
        self.collections.iter().find(|c| c.collection == collection)
    }
}
