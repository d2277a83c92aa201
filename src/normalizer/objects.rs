//! Object definition files: one record per file, verbatim

use super::{parse_object, FileReport, NormalizeError};
use crate::models::Record;
use crate::source::SourceFile;
use rayon::prelude::*;

pub(super) fn normalize(files: &[SourceFile], primary_key: &str) -> Vec<FileReport> {
    files
        .par_iter()
        .map(|file| match object_record(file, primary_key) {
            Ok(record) => FileReport::records(&file.path, vec![record]),
            Err(e) => FileReport::failed(&file.path, e.to_string()),
        })
        .collect()
}

pub fn object_record(file: &SourceFile, primary_key: &str) -> Result<Record, NormalizeError> {
    let mut record = Record::from(parse_object(&file.contents)?);
    let natural_key = format!(
        "object:{}",
        record.get_str("name").unwrap_or(file.path.as_str())
    );
    record.ensure_key(primary_key, &natural_key);
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::FileOutcome;

    #[test]
    fn test_object_emitted_verbatim() {
        let body = br#"{"uuid": "u-1", "name": "file", "attributes": {"md5": {}}}"#;
        let file = SourceFile::new("objects/file/definition.json", body.to_vec());
        let record = object_record(&file, "uuid").unwrap();
        assert_eq!(record.get_str("name"), Some("file"));
        assert_eq!(record.primary_key("uuid").as_deref(), Some("u-1"));
        assert_eq!(record.as_map().len(), 3);
    }

    #[test]
    fn test_malformed_object_fails_only_itself() {
        let files = vec![
            SourceFile::new("objects/a/definition.json", b"{not json".to_vec()),
            SourceFile::new("objects/b/definition.json", br#"{"uuid": "b"}"#.to_vec()),
        ];
        let reports = normalize(&files, "uuid");
        assert!(matches!(reports[0].outcome, FileOutcome::Failed(_)));
        assert!(matches!(reports[1].outcome, FileOutcome::Records(ref r) if r.len() == 1));
    }
}
