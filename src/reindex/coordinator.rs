//! Blue/green reindex orchestration

use super::{CollectionReport, CyclePhase, CycleReport, ReindexError, ReindexMode};
use crate::config::IndexesConfig;
use crate::metrics::{
    NORMALIZER_FILES_TOTAL, REINDEX_CYCLES_TOTAL, REINDEX_CYCLE_DURATION_SECONDS,
    REINDEX_DOCUMENTS_TOTAL,
};
use crate::models::{Collection, Record};
use crate::normalizer::{BatchSummary, Normalizer};
use crate::source::{fetch_collection, SourceFetcher};
use crate::store::IndexStore;
use chrono::Utc;
use dashmap::DashMap;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Rebuilds indexes without exposing a partially written one to readers
///
/// Each collection is fetched, normalized and written into its staging index
/// concurrently. Once all three are complete, one swap request exchanges every
/// staging index with its production index, and only after the store confirms
/// the swap are the old generations deleted.
pub struct ReindexCoordinator {
    store: Arc<dyn IndexStore>,
    fetcher: Arc<dyn SourceFetcher>,
    normalizer: Normalizer,
    indexes: IndexesConfig,
    phases: Arc<DashMap<Collection, CyclePhase>>,
    running: Mutex<()>,
}

impl ReindexCoordinator {
    pub fn new(
        store: Arc<dyn IndexStore>,
        fetcher: Arc<dyn SourceFetcher>,
        indexes: IndexesConfig,
    ) -> Self {
        let phases = Arc::new(DashMap::new());
        for collection in Collection::ALL {
            phases.insert(collection, CyclePhase::Idle);
        }

        Self {
            store,
            fetcher,
            normalizer: Normalizer::new(indexes.primary_key.clone()),
            indexes,
            phases,
            running: Mutex::new(()),
        }
    }

    pub fn indexes(&self) -> &IndexesConfig {
        &self.indexes
    }

    /// Current phase of a collection
    pub fn phase(&self, collection: Collection) -> CyclePhase {
        self.phases
            .get(&collection)
            .map(|p| *p)
            .unwrap_or_default()
    }

    pub fn phases(&self) -> Vec<(Collection, CyclePhase)> {
        Collection::ALL
            .into_iter()
            .map(|c| (c, self.phase(c)))
            .collect()
    }

    fn set_phase(&self, collection: Collection, phase: CyclePhase) {
        info!(collection = %collection, phase = %phase, "Phase transition");
        self.phases.insert(collection, phase);
    }

    fn reset_phases(&self) {
        for collection in Collection::ALL {
            self.phases.insert(collection, CyclePhase::Idle);
        }
    }

    /// Run one full blue/green cycle over every collection.
    pub async fn run_cycle(&self) -> Result<CycleReport, ReindexError> {
        let _guard = self.running.try_lock().map_err(|_| ReindexError::AlreadyRunning)?;
        let timer = Instant::now();
        let started_at = Utc::now();
        let mode = ReindexMode::BlueGreen;

        info!(mode = %mode, "Starting reindex cycle");

        let result = self.blue_green(started_at, timer).await;
        self.reset_phases();
        self.finish(mode, timer, result)
    }

    async fn blue_green(
        &self,
        started_at: chrono::DateTime<Utc>,
        timer: Instant,
    ) -> Result<CycleReport, ReindexError> {
        let pipelines = Collection::ALL.into_iter().map(|collection| {
            let shadow = self.indexes.shadow_name(collection);
            async move { self.build(collection, shadow, CyclePhase::WritingShadow).await }
        });

        let mut collections = Vec::with_capacity(Collection::ALL.len());
        let mut first_error = None;
        for result in join_all(pipelines).await {
            match result {
                Ok(report) => collections.push(report),
                Err(e) => {
                    error!(collection = ?e.collection(), error = %e, "Collection pipeline failed");
                    first_error.get_or_insert(e);
                }
            }
        }

        if let Some(e) = first_error {
            self.abandon_shadows().await;
            return Err(e);
        }

        // Both sides of every pair must exist for the swap
        if let Err(e) = self.ensure_production().await {
            self.abandon_shadows().await;
            return Err(e);
        }

        let pairs: Vec<(String, String)> = Collection::ALL
            .into_iter()
            .map(|c| {
                (
                    self.indexes.production_name(c).to_string(),
                    self.indexes.shadow_name(c),
                )
            })
            .collect();

        if let Err(e) = self.store.swap(&pairs).await {
            error!(error = %e, "Swap failed; leaving every index in place");
            return Err(ReindexError::Swap(e));
        }
        info!(pairs = pairs.len(), "Swap confirmed");

        let mut retired = Vec::new();
        for (collection, (_, shadow)) in Collection::ALL.into_iter().zip(&pairs) {
            self.set_phase(collection, CyclePhase::RetiringOld);
            match self.store.delete_index(shadow).await {
                Ok(()) => retired.push(shadow.clone()),
                Err(e) => {
                    warn!(index = %shadow, error = %e, "Failed to delete old generation");
                }
            }
        }

        Ok(CycleReport {
            mode: ReindexMode::BlueGreen,
            started_at,
            duration_ms: timer.elapsed().as_millis() as u64,
            collections,
            swap_confirmed: true,
            retired,
        })
    }

    /// Create any missing production index, empty.
    async fn ensure_production(&self) -> Result<(), ReindexError> {
        for collection in Collection::ALL {
            let production = self.indexes.production_name(collection);
            self.store
                .create_index(production, &self.indexes.primary_key)
                .await
                .map_err(|source| ReindexError::Write {
                    collection,
                    index: production.to_string(),
                    source,
                })?;
            self.set_phase(collection, CyclePhase::Swapping);
        }
        Ok(())
    }

    /// Delete this cycle's staging indexes. Only called before any swap was
    /// attempted, so the staging names still hold unswapped data.
    async fn abandon_shadows(&self) {
        for collection in Collection::ALL {
            let shadow = self.indexes.shadow_name(collection);
            if let Err(e) = self.store.delete_index(&shadow).await {
                warn!(index = %shadow, error = %e, "Failed to delete abandoned staging index");
            }
        }
    }

    /// Load every collection straight into its production index.
    ///
    /// Meant for first-time setup, when production is empty and there is no
    /// previous generation to keep serving.
    pub async fn bootstrap(&self) -> Result<CycleReport, ReindexError> {
        let _guard = self.running.try_lock().map_err(|_| ReindexError::AlreadyRunning)?;
        let timer = Instant::now();
        let started_at = Utc::now();
        let mode = ReindexMode::Direct;

        info!(mode = %mode, "Starting direct load");

        let pipelines = Collection::ALL.into_iter().map(|collection| {
            let production = self.indexes.production_name(collection).to_string();
            async move {
                self.build(collection, production, CyclePhase::WritingProduction)
                    .await
            }
        });

        let result = join_all(pipelines)
            .await
            .into_iter()
            .collect::<Result<Vec<_>, _>>()
            .map(|collections| CycleReport {
                mode,
                started_at,
                duration_ms: timer.elapsed().as_millis() as u64,
                collections,
                swap_confirmed: false,
                retired: Vec::new(),
            });

        self.reset_phases();
        self.finish(mode, timer, result)
    }

    /// Delete every index the store lists.
    pub async fn clean(&self) -> Result<Vec<String>, ReindexError> {
        let _guard = self.running.try_lock().map_err(|_| ReindexError::AlreadyRunning)?;

        let names = self.store.list_indexes().await?;
        for name in &names {
            self.store.delete_index(name).await?;
            info!(index = %name, "Deleted index");
        }
        Ok(names)
    }

    fn finish(
        &self,
        mode: ReindexMode,
        timer: Instant,
        result: Result<CycleReport, ReindexError>,
    ) -> Result<CycleReport, ReindexError> {
        let mode_label = mode.to_string();
        let outcome = if result.is_ok() { "success" } else { "failed" };

        REINDEX_CYCLES_TOTAL
            .with_label_values(&[&mode_label, outcome])
            .inc();
        REINDEX_CYCLE_DURATION_SECONDS
            .with_label_values(&[&mode_label])
            .observe(timer.elapsed().as_secs_f64());

        match &result {
            Ok(report) => info!(
                mode = %mode,
                records = report.records_written(),
                failed_files = report.failed_files(),
                duration_ms = report.duration_ms,
                "Reindex cycle completed"
            ),
            Err(e) => error!(mode = %mode, error = %e, "Reindex cycle failed"),
        }

        result
    }

    /// Fetch, normalize and write one collection into `index`.
    async fn build(
        &self,
        collection: Collection,
        index: String,
        write_phase: CyclePhase,
    ) -> Result<CollectionReport, ReindexError> {
        let write_err = |source| ReindexError::Write {
            collection,
            index: index.clone(),
            source,
        };

        self.set_phase(collection, CyclePhase::Fetching);
        let fetched = fetch_collection(self.fetcher.as_ref(), collection)
            .await
            .map_err(|source| ReindexError::Fetch { collection, source })?;

        self.set_phase(collection, CyclePhase::Normalizing);
        let normalizer = self.normalizer.clone();
        let files = fetched.files;
        let mut batch =
            tokio::task::spawn_blocking(move || normalizer.normalize(collection, &files))
                .await
                .map_err(|source| ReindexError::Normalize { collection, source })?;
        for (path, reason) in fetched.failures {
            batch.push_fetch_failure(path, reason);
        }
        let (records, summary) = batch.into_records();
        record_file_outcomes(collection, &summary);

        self.set_phase(collection, write_phase);
        if write_phase == CyclePhase::WritingShadow {
            // Leftovers of an interrupted cycle
            self.store.delete_index(&index).await.map_err(write_err)?;
        }
        self.store
            .create_index(&index, &self.indexes.primary_key)
            .await
            .map_err(write_err)?;
        self.store
            .set_filterable_attributes(&index, collection.filterable_attributes())
            .await
            .map_err(write_err)?;

        let written = self
            .write_records(collection, &index, &records)
            .await
            .map_err(write_err)?;

        info!(
            collection = %collection,
            index = %index,
            records = written,
            files = summary.files,
            skipped = summary.skipped_files,
            failed = summary.failed_files,
            "Collection written"
        );

        Ok(CollectionReport {
            collection,
            index,
            records_written: written,
            summary,
        })
    }

    async fn write_records(
        &self,
        collection: Collection,
        index: &str,
        records: &[Record],
    ) -> Result<usize, crate::store::StoreError> {
        let batch_size = self.indexes.batch_size.max(1);
        let mut written = 0;

        for chunk in records.chunks(batch_size) {
            self.store.upsert(index, chunk).await?;
            written += chunk.len();
            REINDEX_DOCUMENTS_TOTAL
                .with_label_values(&[&collection.to_string()])
                .inc_by(chunk.len() as f64);
            debug!(index = %index, batch = chunk.len(), written, total = records.len(), "Batch written");
        }

        Ok(written)
    }
}

fn record_file_outcomes(collection: Collection, summary: &BatchSummary) {
    let label = collection.to_string();
    for (outcome, count) in [
        ("indexed", summary.indexed_files),
        ("skipped", summary.skipped_files),
        ("failed", summary.failed_files),
    ] {
        NORMALIZER_FILES_TOTAL
            .with_label_values(&[&label, outcome])
            .inc_by(count as f64);
    }
}
