//! Per-file normalization outcomes

use crate::models::{Collection, Record};
use serde::Serialize;

/// What happened to one source file
#[derive(Debug, Clone, PartialEq)]
pub enum FileOutcome {
    /// Parsed; these records go to the index
    Records(Vec<Record>),
    /// Deliberately ignored (deprecated galaxy, missing container, ...)
    Skipped(String),
    /// Could not be fetched or parsed
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileReport {
    pub path: String,
    pub outcome: FileOutcome,
}

impl FileReport {
    pub fn records(path: impl Into<String>, records: Vec<Record>) -> Self {
        Self {
            path: path.into(),
            outcome: FileOutcome::Records(records),
        }
    }

    pub fn skipped(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            outcome: FileOutcome::Skipped(reason.into()),
        }
    }

    pub fn failed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            outcome: FileOutcome::Failed(reason.into()),
        }
    }
}

/// Diagnostic kept after records have been handed to the index writer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    Skipped,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileDiagnostic {
    pub path: String,
    pub kind: DiagnosticKind,
    pub reason: String,
}

/// Counts and diagnostics for one normalized collection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub files: usize,
    pub indexed_files: usize,
    pub skipped_files: usize,
    pub failed_files: usize,
    pub records: usize,
    pub diagnostics: Vec<FileDiagnostic>,
}

/// Every file of one collection with its outcome
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedBatch {
    pub collection: Collection,
    pub files: Vec<FileReport>,
}

impl NormalizedBatch {
    pub fn new(collection: Collection) -> Self {
        Self {
            collection,
            files: Vec::new(),
        }
    }

    pub fn push(&mut self, report: FileReport) {
        self.files.push(report);
    }

    /// Records fetch failures that never reached the normalizer
    pub fn push_fetch_failure(&mut self, path: impl Into<String>, reason: impl Into<String>) {
        self.files.push(FileReport::failed(path, reason));
    }

    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.files.iter().flat_map(|f| match &f.outcome {
            FileOutcome::Records(records) => records.as_slice(),
            _ => &[][..],
        })
    }

    pub fn record_count(&self) -> usize {
        self.records().count()
    }

    pub fn summary(&self) -> BatchSummary {
        let mut summary = BatchSummary {
            files: self.files.len(),
            ..Default::default()
        };

        for file in &self.files {
            match &file.outcome {
                FileOutcome::Records(records) => {
                    summary.indexed_files += 1;
                    summary.records += records.len();
                }
                FileOutcome::Skipped(reason) => {
                    summary.skipped_files += 1;
                    summary.diagnostics.push(FileDiagnostic {
                        path: file.path.clone(),
                        kind: DiagnosticKind::Skipped,
                        reason: reason.clone(),
                    });
                }
                FileOutcome::Failed(reason) => {
                    summary.failed_files += 1;
                    summary.diagnostics.push(FileDiagnostic {
                        path: file.path.clone(),
                        kind: DiagnosticKind::Failed,
                        reason: reason.clone(),
                    });
                }
            }
        }

        summary
    }

    /// Split into the records to write and the summary to keep
    pub fn into_records(self) -> (Vec<Record>, BatchSummary) {
        let summary = self.summary();
        let records = self
            .files
            .into_iter()
            .flat_map(|f| match f.outcome {
                FileOutcome::Records(records) => records,
                _ => Vec::new(),
            })
            .collect();
        (records, summary)
    }
}
