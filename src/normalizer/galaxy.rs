//! Galaxy cluster files: one record per cluster value, tagged with its galaxy

use super::{parse_object, FileReport, NormalizeError};
use crate::models::{Record, CLUSTERS_DIR, GALAXIES_DIR};
use crate::source::SourceFile;
use rayon::prelude::*;
use std::collections::HashMap;

const DEPRECATED_NAMESPACE: &str = "deprecated";

/// State of the `galaxies/<stem>.json` container a cluster file belongs to
#[derive(Debug, Clone, PartialEq)]
enum Container {
    Active,
    Deprecated,
    Unreadable(String),
}

pub(super) fn normalize(files: &[SourceFile], primary_key: &str) -> Vec<FileReport> {
    let containers: HashMap<&str, Container> = files
        .iter()
        .filter(|f| f.top_dir() == Some(GALAXIES_DIR))
        .map(|f| (f.stem(), container_status(f)))
        .collect();

    files
        .par_iter()
        .filter(|f| f.top_dir() == Some(CLUSTERS_DIR))
        .map(|f| normalize_cluster_file(f, containers.get(f.stem()), primary_key))
        .collect()
}

fn container_status(file: &SourceFile) -> Container {
    match parse_object(&file.contents) {
        Ok(doc) if doc.get("namespace").and_then(|v| v.as_str()) == Some(DEPRECATED_NAMESPACE) => {
            Container::Deprecated
        }
        Ok(_) => Container::Active,
        Err(e) => Container::Unreadable(e.to_string()),
    }
}

fn normalize_cluster_file(
    file: &SourceFile,
    container: Option<&Container>,
    primary_key: &str,
) -> FileReport {
    match container {
        None => return FileReport::skipped(&file.path, "no galaxy definition"),
        Some(Container::Deprecated) => {
            return FileReport::skipped(&file.path, "galaxy is deprecated")
        }
        Some(Container::Unreadable(reason)) => {
            return FileReport::skipped(
                &file.path,
                format!("galaxy definition unreadable: {}", reason),
            )
        }
        Some(Container::Active) => {}
    }

    match cluster_records(file.stem(), &file.contents, primary_key) {
        Ok(records) => FileReport::records(&file.path, records),
        Err(e) => FileReport::failed(&file.path, e.to_string()),
    }
}

/// Expand a cluster document into one record per entry of its `values` list.
pub fn cluster_records(
    galaxy: &str,
    contents: &[u8],
    primary_key: &str,
) -> Result<Vec<Record>, NormalizeError> {
    let doc = parse_object(contents)?;
    let values = doc
        .get("values")
        .ok_or(NormalizeError::MissingField("values"))?
        .as_array()
        .ok_or(NormalizeError::InvalidField {
            field: "values",
            expected: "an array",
        })?;

    values
        .iter()
        .enumerate()
        .map(|(position, value)| {
            let mut record =
                Record::from_value(value.clone()).ok_or(NormalizeError::InvalidField {
                    field: "values",
                    expected: "an array of objects",
                })?;
            record.insert("galaxy", galaxy);

            let natural_key = match record.get_str("value") {
                Some(name) => format!("galaxy:{}:{}", galaxy, name),
                None => format!("galaxy:{}:#{}", galaxy, position),
            };
            record.ensure_key(primary_key, &natural_key);
            Ok(record)
        })
        .collect()
}
