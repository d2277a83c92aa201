//! Upstream freshness polling
//!
//! Every interval the watcher asks each tracked repository for its head
//! commit and compares it with the revision state file. Any change triggers
//! one full reindex cycle. Revisions are written back only after the cycle
//! succeeds, so a failed cycle is retried on the next poll.

mod revision;
mod state;

pub use revision::{GithubCommits, RevisionSource};
pub use state::RevisionState;

use crate::config::{RepositoryConfig, SourcesConfig, WatcherConfig};
use crate::reindex::{CycleReport, ReindexCoordinator, ReindexError};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};

/// Result of one poll
#[derive(Debug)]
pub enum PollOutcome {
    /// Every repository is at its recorded revision
    Unchanged,
    /// At least one repository moved and a cycle ran
    Reindexed {
        changed: Vec<String>,
        report: CycleReport,
    },
}

pub struct FreshnessWatcher {
    coordinator: Arc<ReindexCoordinator>,
    revisions: Arc<dyn RevisionSource>,
    repositories: Vec<RepositoryConfig>,
    state_path: PathBuf,
    interval: Duration,
}

impl FreshnessWatcher {
    pub fn new(
        coordinator: Arc<ReindexCoordinator>,
        revisions: Arc<dyn RevisionSource>,
        sources: &SourcesConfig,
        config: &WatcherConfig,
    ) -> Self {
        let mut repositories: Vec<RepositoryConfig> = Vec::new();
        for repository in [&sources.galaxy, &sources.objects, &sources.taxonomies] {
            if !repositories.iter().any(|r| r.id() == repository.id()) {
                repositories.push(repository.clone());
            }
        }

        Self {
            coordinator,
            revisions,
            repositories,
            state_path: config.state_path.clone(),
            interval: Duration::from_secs(config.interval_secs.max(1)),
        }
    }

    /// Check every repository once and reindex if any moved.
    pub async fn poll_once(&self) -> Result<PollOutcome, ReindexError> {
        let mut state = RevisionState::load(&self.state_path).await;
        let mut changed = Vec::new();

        for repository in &self.repositories {
            let id = repository.id();
            match self.revisions.head(repository).await {
                Ok(head) => {
                    if state.get(&id) != Some(head.as_str()) {
                        info!(repository = %id, previous = ?state.get(&id), head = %head, "Repository changed");
                        changed.push(id.clone());
                        state.set(id, head);
                    } else {
                        debug!(repository = %id, head = %head, "Repository unchanged");
                    }
                }
                Err(e) => {
                    warn!(repository = %id, error = %e, "Could not read head revision");
                }
            }
        }

        if changed.is_empty() {
            return Ok(PollOutcome::Unchanged);
        }

        let report = self.coordinator.run_cycle().await?;

        if let Err(e) = state.save(&self.state_path).await {
            error!(path = %self.state_path.display(), error = %e, "Failed to persist revision state");
        }

        Ok(PollOutcome::Reindexed { changed, report })
    }

    /// Poll forever.
    pub async fn run(self: Arc<Self>) {
        info!(
            interval_secs = self.interval.as_secs(),
            repositories = self.repositories.len(),
            "Starting freshness watcher"
        );

        loop {
            match self.poll_once().await {
                Ok(PollOutcome::Unchanged) => debug!("No upstream changes"),
                Ok(PollOutcome::Reindexed { changed, report }) => info!(
                    changed = ?changed,
                    records = report.records_written(),
                    "Upstream changes indexed"
                ),
                Err(e) => error!(error = %e, "Reindex after upstream change failed"),
            }

            sleep(self.interval).await;
        }
    }
}
