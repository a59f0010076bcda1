use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use std::path::Path;

use super::manifest::MANIFEST_FILE_NAME;
use crate::common::errors::{ResetError, Result};
use crate::scanner::walker;

/// Remove top-level entries of the backup root last modified before
/// `now - retention_days`.
///
/// Retention of zero or less disables pruning. The manifest file is never
/// removed, and a failed removal is reported without stopping the pass.
pub fn prune_older_than(backup_root: &Path, retention_days: i64) -> Result<PruneReport> {
    let mut report = PruneReport::default();

    if retention_days <= 0 || !backup_root.exists() {
        return Ok(report);
    }

    // A window beyond chrono's range keeps everything
    let Some(cutoff) = TimeDelta::try_days(retention_days)
        .and_then(|window| Utc::now().checked_sub_signed(window))
    else {
        tracing::debug!(retention_days, "Retention window out of range, nothing to prune");
        return Ok(report);
    };

    let entries = std::fs::read_dir(backup_root).map_err(|e| ResetError::io(backup_root, e))?;
    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();

        if name == MANIFEST_FILE_NAME {
            continue;
        }

        let modified: DateTime<Utc> = match entry.metadata().and_then(|m| m.modified()) {
            Ok(time) => time.into(),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Cannot read backup mtime");
                continue;
            }
        };

        if modified >= cutoff {
            continue;
        }

        let size = walker::dir_size(&path);
        let result = if path.is_dir() {
            std::fs::remove_dir_all(&path)
        } else {
            std::fs::remove_file(&path)
        };

        match result {
            Ok(()) => {
                tracing::info!(backup = %name, "Pruned old backup");
                report.total_bytes_freed += size;
                report.pruned.push(PrunedBackup {
                    name,
                    bytes_freed: size,
                });
            }
            Err(e) => {
                tracing::warn!(backup = %name, error = %e, "Failed to prune backup");
                report.errors.push(format!("Failed to prune '{}': {}", name, e));
            }
        }
    }

    Ok(report)
}

/// Report from a prune pass
#[derive(Debug, Default, Serialize)]
pub struct PruneReport {
    pub pruned: Vec<PrunedBackup>,
    pub total_bytes_freed: u64,
    pub errors: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct PrunedBackup {
    pub name: String,
    pub bytes_freed: u64,
}
