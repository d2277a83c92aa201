//! Taxonomy `machinetag.json` files
//!
//! Each file yields three record shapes that share one index: the document
//! itself, one record per predicate (tagged `namespace`) and one record per
//! value entry (tagged `namespace` and `predicate`). See
//! [`Record::taxonomy_shape`] for how they are told apart.

use super::{parse_object, FileReport, NormalizeError};
use crate::models::{Record, MACHINETAG_FILE};
use crate::source::SourceFile;
use rayon::prelude::*;
use serde_json::Value;
use tracing::debug;

pub(super) fn normalize(files: &[SourceFile], primary_key: &str) -> Vec<FileReport> {
    files
        .par_iter()
        .filter(|f| f.file_name() == MACHINETAG_FILE)
        .map(|file| match taxonomy_records(&file.contents, primary_key) {
            Ok(records) => FileReport::records(&file.path, records),
            Err(e) => FileReport::failed(&file.path, e.to_string()),
        })
        .collect()
}

pub fn taxonomy_records(contents: &[u8], primary_key: &str) -> Result<Vec<Record>, NormalizeError> {
    let doc = parse_object(contents)?;

    let namespace = doc
        .get("namespace")
        .ok_or(NormalizeError::MissingField("namespace"))?
        .as_str()
        .ok_or(NormalizeError::InvalidField {
            field: "namespace",
            expected: "a string",
        })?
        .to_string();

    let predicates = doc
        .get("predicates")
        .ok_or(NormalizeError::MissingField("predicates"))?
        .as_array()
        .ok_or(NormalizeError::InvalidField {
            field: "predicates",
            expected: "an array",
        })?;

    let mut records = Vec::with_capacity(1 + predicates.len());

    let mut root = Record::from(doc.clone());
    root.ensure_key(primary_key, &format!("taxonomy:{}", namespace));
    records.push(root);

    for predicate in predicates {
        let mut record =
            Record::from_value(predicate.clone()).ok_or(NormalizeError::InvalidField {
                field: "predicates",
                expected: "an array of objects",
            })?;
        record.insert("namespace", namespace.as_str());
        let natural_key = format!(
            "taxonomy:{}:{}",
            namespace,
            record.get_str("value").unwrap_or_default()
        );
        record.ensure_key(primary_key, &natural_key);
        records.push(record);
    }

    // `values` is optional; predicates without enumerated entries are common
    let Some(values) = doc.get("values").and_then(Value::as_array) else {
        return Ok(records);
    };

    for value in values {
        let Some(predicate) = value.get("predicate").and_then(Value::as_str) else {
            debug!(namespace = %namespace, "Ignoring value block without predicate");
            continue;
        };
        let Some(entries) = value.get("entry").and_then(Value::as_array) else {
            continue;
        };

        for entry in entries {
            let Some(mut record) = Record::from_value(entry.clone()) else {
                continue;
            };
            record.insert("namespace", namespace.as_str());
            record.insert("predicate", predicate);
            let natural_key = format!(
                "taxonomy:{}:{}:{}",
                namespace,
                predicate,
                record.get_str("value").unwrap_or_default()
            );
            record.ensure_key(primary_key, &natural_key);
            records.push(record);
        }
    }

    Ok(records)
}
