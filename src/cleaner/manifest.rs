use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::common::errors::{ResetError, Result};

/// Name of the append-only backup log inside the backup root
pub const MANIFEST_FILE_NAME: &str = "manifest.jsonl";

/// How a backup is stored on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupKind {
    /// Mirror of a single file
    File,
    /// Mirror of a directory tree
    Directory,
    /// Zip archive of a file or tree
    Archive,
}

impl std::fmt::Display for BackupKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackupKind::File => write!(f, "file"),
            BackupKind::Directory => write!(f, "directory"),
            BackupKind::Archive => write!(f, "archive"),
        }
    }
}

/// One completed backup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupRecord {
    /// Path that was backed up
    pub source: PathBuf,

    /// Where the copy lives
    pub backup_path: PathBuf,

    /// Sanitized label the backup name was built from
    pub label: String,

    pub kind: BackupKind,

    pub created_at: DateTime<Utc>,

    /// Bytes copied from the source
    #[serde(default)]
    pub size_bytes: u64,

    /// Whether the source was a directory tree
    #[serde(default)]
    pub source_is_dir: bool,
}

impl BackupRecord {
    /// File name of the backup inside the backup root
    pub fn name(&self) -> String {
        self.backup_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    pub fn exists(&self) -> bool {
        self.backup_path.exists()
    }
}

/// Append one record as a JSON line
pub fn append_record(backup_root: &Path, record: &BackupRecord) -> Result<()> {
    let manifest_path = backup_root.join(MANIFEST_FILE_NAME);

    let line = serde_json::to_string(record).map_err(|e| ResetError::Json {
        path: manifest_path.clone(),
        source: e,
    })?;

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&manifest_path)
        .map_err(|e| ResetError::io(&manifest_path, e))?;
    writeln!(file, "{}", line).map_err(|e| ResetError::io(&manifest_path, e))?;

    Ok(())
}

/// Read every record from the manifest. Malformed lines are skipped.
pub fn read_records(backup_root: &Path) -> Result<Vec<BackupRecord>> {
    let manifest_path = backup_root.join(MANIFEST_FILE_NAME);
    if !manifest_path.exists() {
        return Ok(Vec::new());
    }

    let file = std::fs::File::open(&manifest_path).map_err(|e| ResetError::io(&manifest_path, e))?;

    let mut records = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| ResetError::io(&manifest_path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<BackupRecord>(&line) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!(line = index + 1, error = %e, "Skipping malformed manifest entry");
            }
        }
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(root: &Path, name: &str) -> BackupRecord {
        BackupRecord {
            source: PathBuf::from("/data/state.vscdb"),
            backup_path: root.join(name),
            label: "demo".to_string(),
            kind: BackupKind::File,
            created_at: Utc::now(),
            size_bytes: 10,
            source_is_dir: false,
        }
    }

    #[test]
    fn test_append_and_read() {
        let dir = tempfile::tempdir().unwrap();
        append_record(dir.path(), &record(dir.path(), "a_20240101_000000")).unwrap();
        append_record(dir.path(), &record(dir.path(), "b_20240101_000000")).unwrap();

        let records = read_records(dir.path()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].name(), "b_20240101_000000");
    }

    #[test]
    fn test_malformed_lines_skipped() {
        let dir = tempfile::tempdir().unwrap();
        append_record(dir.path(), &record(dir.path(), "a")).unwrap();
        let path = dir.path().join(MANIFEST_FILE_NAME);
        let mut contents = std::fs::read_to_string(&path).unwrap();
        contents.push_str("not json\n\n");
        std::fs::write(&path, contents).unwrap();

        assert_eq!(read_records(dir.path()).unwrap().len(), 1);
    }

    #[test]
    fn test_kind_serializes_lowercase() {
        let json = serde_json::to_string(&BackupKind::Archive).unwrap();
        assert_eq!(json, "\"archive\"");
    }
}
