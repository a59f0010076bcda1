//! Identifier mutation across JSON and SQLite storage.

pub mod database;
pub mod json;

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::common::config::CleaningOptions;
use crate::common::errors::{ResetError, Result};
use crate::scanner::walker;

/// Replacement identifiers generated once per file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreshIds {
    pub machine_id: String,
    pub session_id: String,
}

impl FreshIds {
    pub fn generate() -> Self {
        Self {
            machine_id: uuid::Uuid::new_v4().to_string(),
            session_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Session id for keys mentioning a session, machine id otherwise
    pub fn for_key(&self, key: &str) -> &str {
        if key.to_lowercase().contains("session") {
            &self.session_id
        } else {
            &self.machine_id
        }
    }
}

/// Keys changed in one file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MutationOutcome {
    pub keys_updated: usize,
    pub keys_deleted: usize,
}

impl MutationOutcome {
    pub fn is_empty(&self) -> bool {
        self.keys_updated == 0 && self.keys_deleted == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateKind {
    Database,
    Json,
    Other,
}

impl CandidateKind {
    pub fn from_path(path: &Path) -> Self {
        if walker::is_database_file(path) {
            return CandidateKind::Database;
        }
        match path.extension().map(|e| e.to_string_lossy().to_lowercase()) {
            Some(ext) if ext == "json" => CandidateKind::Json,
            _ => CandidateKind::Other,
        }
    }
}

/// A file that may carry identifiers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFile {
    pub path: PathBuf,
    pub kind: CandidateKind,
}

impl CandidateFile {
    pub fn new(path: PathBuf) -> Self {
        let kind = CandidateKind::from_path(&path);
        Self { path, kind }
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// Totals for one identifier phase
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MutationSummary {
    pub files_processed: usize,
    pub files_skipped: usize,
    pub files_failed: usize,
    pub keys_updated: usize,
    pub keys_deleted: usize,
}

impl MutationSummary {
    /// Fold one file's result into the totals
    pub fn record(&mut self, result: &Result<Option<MutationOutcome>>) {
        match result {
            Ok(Some(outcome)) => {
                self.files_processed += 1;
                self.keys_updated += outcome.keys_updated;
                self.keys_deleted += outcome.keys_deleted;
            }
            Ok(None) => self.files_skipped += 1,
            Err(_) => self.files_failed += 1,
        }
    }

    pub fn message(&self) -> String {
        format!(
            "Identifiers: {} files processed, {} keys updated, {} keys deleted, {} failed",
            self.files_processed, self.keys_updated, self.keys_deleted, self.files_failed
        )
    }
}

/// Finds identifier-bearing files and rewrites them
#[derive(Debug, Clone)]
pub struct IdentifierMutator {
    telemetry_keys: Vec<String>,
    session_keys: Vec<String>,
    database_files: Vec<String>,
}

impl IdentifierMutator {
    pub fn new(options: &CleaningOptions) -> Self {
        Self {
            telemetry_keys: options.telemetry_keys.clone(),
            session_keys: options.session_keys.clone(),
            database_files: options.database_files.clone(),
        }
    }

    /// Files named like a known identifier store, or every database file
    /// when none is present
    pub fn find_candidates(&self, root: &Path) -> Vec<CandidateFile> {
        let mut paths = walker::find_files_by_name(root, &self.database_files);
        if paths.is_empty() {
            tracing::debug!(root = %root.display(), "No named stores, falling back to database extensions");
            paths = walker::find_database_files(root);
        }
        paths.into_iter().map(CandidateFile::new).collect()
    }

    /// Mutate one file with freshly generated ids.
    ///
    /// `Ok(None)` means the file type is not handled.
    pub fn mutate(&self, candidate: &CandidateFile) -> Result<Option<MutationOutcome>> {
        if candidate.kind == CandidateKind::Other {
            tracing::debug!(path = %candidate.path.display(), "Unsupported file type, skipping");
            return Ok(None);
        }

        if !candidate.path.exists() {
            return Err(ResetError::io(
                &candidate.path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "candidate file disappeared"),
            ));
        }

        let ids = FreshIds::generate();
        let outcome = match candidate.kind {
            CandidateKind::Database => database::mutate_database(
                &candidate.path,
                &self.telemetry_keys,
                &self.session_keys,
                &ids,
            )?,
            CandidateKind::Json => json::mutate_json_file(
                &candidate.path,
                &self.telemetry_keys,
                &self.session_keys,
                &ids,
            )?,
            CandidateKind::Other => return Ok(None),
        };
        Ok(Some(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_key() {
        let ids = FreshIds::generate();
        assert_eq!(ids.for_key("lastSessionId"), ids.session_id);
        assert_eq!(ids.for_key("telemetry.machineId"), ids.machine_id);
        assert_ne!(ids.machine_id, ids.session_id);
        assert!(uuid::Uuid::parse_str(&ids.machine_id).is_ok());
    }

    #[test]
    fn test_candidate_kind() {
        assert_eq!(CandidateKind::from_path(Path::new("a/state.vscdb")), CandidateKind::Database);
        assert_eq!(CandidateKind::from_path(Path::new("a/x.SQLITE")), CandidateKind::Database);
        assert_eq!(CandidateKind::from_path(Path::new("storage.json")), CandidateKind::Json);
        assert_eq!(CandidateKind::from_path(Path::new("notes.txt")), CandidateKind::Other);
    }

    #[test]
    fn test_fallback_to_database_extensions() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("data.sqlite"), b"").unwrap();
        std::fs::write(dir.path().join("data.db.bak"), b"").unwrap();

        let mutator = IdentifierMutator::new(&CleaningOptions {
            database_files: vec!["storage.json".into()],
            ..CleaningOptions::default()
        });
        let candidates = mutator.find_candidates(dir.path());
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].file_name(), "data.sqlite");
    }

    #[test]
    fn test_summary_counts() {
        let mut summary = MutationSummary::default();
        summary.record(&Ok(Some(MutationOutcome { keys_updated: 2, keys_deleted: 1 })));
        summary.record(&Ok(None));
        summary.record(&Err(ResetError::Cancelled));
        assert_eq!(summary.files_processed, 1);
        assert_eq!(summary.files_skipped, 1);
        assert_eq!(summary.files_failed, 1);
        assert_eq!(summary.keys_updated, 2);
    }
}
