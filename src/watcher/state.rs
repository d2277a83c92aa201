//! Persisted last-seen revisions

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

/// Repository id (`owner/repo`) to last indexed commit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevisionState(BTreeMap<String, String>);

impl RevisionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the state file. A missing, unreadable or corrupt file is an
    /// empty state, which makes every repository look changed.
    pub async fn load(path: &Path) -> Self {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not read revision state");
                return Self::new();
            }
        };

        serde_json::from_slice(&bytes).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "Revision state is corrupt, starting over");
            Self::new()
        })
    }

    /// Write the state file, replacing it in one rename.
    pub async fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let body = serde_json::to_vec_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, path).await
    }

    pub fn get(&self, repository: &str) -> Option<&str> {
        self.0.get(repository).map(String::as_str)
    }

    pub fn set(&mut self, repository: impl Into<String>, revision: impl Into<String>) {
        self.0.insert(repository.into(), revision.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
