//! Document normalization
//!
//! Turns raw upstream files into flat, primary-keyed [`Record`](crate::models::Record)s. The
//! normalizer performs no I/O: callers hand it the files they fetched and get
//! back a [`NormalizedBatch`] describing every file's outcome, so bad files
//! are visible in the report instead of disappearing in a log line.
//!
//! | Collection      | Input files                          | Records per file                    |
//! |-----------------|--------------------------------------|-------------------------------------|
//! | galaxy-clusters | `galaxies/*.json`, `clusters/*.json` | one per `values` entry (+ `galaxy`) |
//! | objects         | `objects/**/*.json`                  | one, verbatim                       |
//! | taxonomies      | `**/machinetag.json`                 | root + predicates + value entries   |

mod error;
mod galaxy;
mod objects;
mod report;
mod taxonomy;

pub use error::NormalizeError;
pub use galaxy::cluster_records;
pub use objects::object_record;
pub use report::{
    BatchSummary, DiagnosticKind, FileDiagnostic, FileOutcome, FileReport, NormalizedBatch,
};
pub use taxonomy::taxonomy_records;

use crate::models::Collection;
use crate::source::SourceFile;
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Stateless record builder, parameterized by the primary key field
#[derive(Debug, Clone)]
pub struct Normalizer {
    primary_key: String,
}

impl Normalizer {
    pub fn new(primary_key: impl Into<String>) -> Self {
        Self {
            primary_key: primary_key.into(),
        }
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Normalize every file of one collection.
    pub fn normalize(&self, collection: Collection, files: &[SourceFile]) -> NormalizedBatch {
        let reports = match collection {
            Collection::GalaxyClusters => galaxy::normalize(files, &self.primary_key),
            Collection::Objects => objects::normalize(files, &self.primary_key),
            Collection::Taxonomies => taxonomy::normalize(files, &self.primary_key),
        };

        let mut batch = NormalizedBatch::new(collection);
        for report in reports {
            let report = self.check_keys(report);
            match &report.outcome {
                FileOutcome::Records(records) => {
                    debug!(collection = %collection, path = %report.path, records = records.len(), "File normalized");
                }
                FileOutcome::Skipped(reason) => {
                    debug!(collection = %collection, path = %report.path, reason = %reason, "File skipped");
                }
                FileOutcome::Failed(reason) => {
                    warn!(collection = %collection, path = %report.path, reason = %reason, "Error processing file");
                }
            }
            batch.push(report);
        }
        batch
    }

    /// A file with any record the store would reject is failed as a whole,
    /// so one bad upstream id cannot fail the index write.
    fn check_keys(&self, report: FileReport) -> FileReport {
        let bad_key = match &report.outcome {
            FileOutcome::Records(records) => records
                .iter()
                .find(|r| !r.has_valid_key(&self.primary_key))
                .map(|r| r.get(&self.primary_key).map(Value::to_string).unwrap_or_default()),
            _ => None,
        };

        match bad_key {
            Some(key) => {
                FileReport::failed(report.path, NormalizeError::InvalidDocumentId(key).to_string())
            }
            None => report,
        }
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new("uuid")
    }
}

pub(crate) fn parse_object(contents: &[u8]) -> Result<Map<String, Value>, NormalizeError> {
    match serde_json::from_slice(contents)? {
        Value::Object(map) => Ok(map),
        _ => Err(NormalizeError::NotAnObject),
    }
}
