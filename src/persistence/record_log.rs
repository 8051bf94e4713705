//! Persisted Record Log
//!
//! A log stream stored as one JSON array per file. Every flush reads the
//! file back, merges the new records in, drops exact duplicates and
//! rewrites the whole file. The file is not locked: concurrent writers
//! race and the last full rewrite wins.

use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Serializer, Value};

use crate::error::LogError;

/// Default file for orchestrator resource records.
pub const DEFAULT_RESOURCE_LOG: &str = "resource_usage.json";

/// Handle to a JSON-array log file.
#[derive(Debug, Clone)]
pub struct RecordLog {
    path: PathBuf,
}

impl RecordLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the records currently on disk.
    ///
    /// A missing, unreadable or unparseable file yields an empty sequence.
    /// A file holding a single object is treated as a one-record sequence.
    pub fn load(&self) -> Vec<Value> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!("Cannot read {}: {}. Starting empty.", self.path.display(), e);
                return Vec::new();
            }
        };

        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Array(records)) => records,
            Ok(record) => vec![record],
            Err(e) => {
                debug!("Discarding corrupt log {}: {}", self.path.display(), e);
                Vec::new()
            }
        }
    }

    /// Merges `records` with the file contents and rewrites the file.
    ///
    /// Returns the number of records now stored.
    pub fn flush<T: Serialize>(&self, records: &[T]) -> Result<usize, LogError> {
        let fresh = records
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;

        let merged = merge_unique(self.load(), fresh);
        self.write_all(&merged)?;

        debug!("Flushed {} records to {}", merged.len(), self.path.display());
        Ok(merged.len())
    }

    fn write_all(&self, records: &[Value]) -> Result<(), LogError> {
        let write_error = |source| LogError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(write_error)?;
            }
        }

        let mut buf = Vec::new();
        let formatter = PrettyFormatter::with_indent(b"    ");
        let mut serializer = Serializer::with_formatter(&mut buf, formatter);
        records.serialize(&mut serializer)?;

        fs::write(&self.path, buf).map_err(write_error)
    }
}

/// Concatenates two record sequences, keeping the first occurrence of each
/// structurally equal record.
pub fn merge_unique(existing: Vec<Value>, fresh: Vec<Value>) -> Vec<Value> {
    let mut seen = HashSet::new();

    existing
        .into_iter()
        .chain(fresh)
        .filter(|record| seen.insert(canonical_key(record)))
        .collect()
}

/// Serialized form with object keys sorted, used as the equality key.
fn canonical_key(record: &Value) -> String {
    // serde_json's default map is ordered by key.
    record.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let log = RecordLog::new(dir.path().join("absent.json"));
        assert!(log.load().is_empty());
    }

    #[test]
    fn test_load_single_object_is_wrapped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("single.json");
        fs::write(&path, r#"{"step": "only"}"#).unwrap();

        let records = RecordLog::new(&path).load();
        assert_eq!(records, vec![json!({"step": "only"})]);
    }

    #[test]
    fn test_flush_is_idempotent() {
        let dir = tempdir().unwrap();
        let log = RecordLog::new(dir.path().join("log.json"));
        let records = vec![json!({"a": 1}), json!({"b": 2})];

        assert_eq!(log.flush(&records).unwrap(), 2);
        assert_eq!(log.flush(&records).unwrap(), 2);
        assert_eq!(log.load(), records);
    }

    #[test]
    fn test_corrupt_file_treated_as_absent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("corrupt.json");
        fs::write(&path, "[{\"a\": 1,").unwrap();

        let log = RecordLog::new(&path);
        let fresh = vec![json!({"n": 1}), json!({"n": 2}), json!({"n": 3})];

        assert_eq!(log.flush(&fresh).unwrap(), 3);
        assert_eq!(log.load(), fresh);
    }

    #[test]
    fn test_disjoint_flushes_accumulate() {
        let dir = tempdir().unwrap();
        let log = RecordLog::new(dir.path().join("union.json"));
        let a = vec![json!({"id": "a1"}), json!({"id": "a2"})];
        let b = vec![json!({"id": "b1"})];

        log.flush(&a).unwrap();
        log.flush(&b).unwrap();

        let stored = log.load();
        assert_eq!(stored.len(), 3);
        for record in a.iter().chain(b.iter()) {
            assert!(stored.contains(record));
        }
    }

    #[test]
    fn test_duplicates_within_one_flush_collapse() {
        let dir = tempdir().unwrap();
        let log = RecordLog::new(dir.path().join("dups.json"));
        let records = vec![json!({"x": 1}), json!({"x": 1}), json!({"x": 2})];

        assert_eq!(log.flush(&records).unwrap(), 2);
    }

    #[test]
    fn test_merge_ignores_key_order() {
        let existing: Vec<Value> = vec![serde_json::from_str(r#"{"b": 2, "a": 1}"#).unwrap()];
        let fresh: Vec<Value> = vec![serde_json::from_str(r#"{"a": 1, "b": 2}"#).unwrap()];

        assert_eq!(merge_unique(existing, fresh).len(), 1);
    }

    #[test]
    fn test_merge_keeps_first_position() {
        let merged = merge_unique(vec![json!(1), json!(2)], vec![json!(3), json!(1), json!(4)]);
        assert_eq!(merged, vec![json!(1), json!(2), json!(3), json!(4)]);
    }

    #[test]
    fn test_flush_creates_parent_directory() {
        let dir = tempdir().unwrap();
        let log = RecordLog::new(dir.path().join("nested/logs/out.json"));

        log.flush(&[json!({"k": "v"})]).unwrap();
        assert!(log.path().exists());
    }

    #[test]
    fn test_file_uses_four_space_indent() {
        let dir = tempdir().unwrap();
        let log = RecordLog::new(dir.path().join("indent.json"));
        log.flush(&[json!({"k": "v"})]).unwrap();

        let content = fs::read_to_string(log.path()).unwrap();
        assert!(content.contains("\n        \"k\": \"v\""));
    }
}
