use serde_json::Value;
use std::path::{Path, PathBuf};

use super::{FreshIds, MutationOutcome};
use crate::common::errors::{ResetError, Result};

/// Rewrite telemetry values and drop session keys anywhere in a document.
///
/// Telemetry keys are only touched when their value is a string. Returns
/// `(keys_updated, keys_deleted)`.
pub fn mutate_value(
    value: &mut Value,
    telemetry_keys: &[String],
    session_keys: &[String],
    ids: &FreshIds,
) -> (usize, usize) {
    let mut updated = 0;
    let mut deleted = 0;

    match value {
        Value::Object(map) => {
            for key in session_keys {
                if map.shift_remove(key.as_str()).is_some() {
                    deleted += 1;
                }
            }

            for (key, child) in map.iter_mut() {
                if telemetry_keys.iter().any(|k| k == key) && child.is_string() {
                    *child = Value::String(ids.for_key(key).to_string());
                    updated += 1;
                } else {
                    let (u, d) = mutate_value(child, telemetry_keys, session_keys, ids);
                    updated += u;
                    deleted += d;
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                let (u, d) = mutate_value(item, telemetry_keys, session_keys, ids);
                updated += u;
                deleted += d;
            }
        }
        _ => {}
    }

    (updated, deleted)
}

/// Mutate one JSON file in place.
///
/// Empty files and documents whose root is an array are left alone; a
/// scalar root is a parse failure.
/// The rewrite goes through `<file>.tmp` and a rename, with a `<file>.bak`
/// copy restored if the write fails.
pub fn mutate_json_file(
    path: &Path,
    telemetry_keys: &[String],
    session_keys: &[String],
    ids: &FreshIds,
) -> Result<MutationOutcome> {
    let contents = std::fs::read_to_string(path).map_err(|e| ResetError::io(path, e))?;
    if contents.trim().is_empty() {
        tracing::debug!(path = %path.display(), "Empty JSON file, nothing to do");
        return Ok(MutationOutcome::default());
    }

    let mut document: Value = serde_json::from_str(&contents).map_err(|e| ResetError::Json {
        path: path.to_path_buf(),
        source: e,
    })?;

    match document {
        Value::Object(_) => {}
        Value::Array(_) => {
            tracing::debug!(path = %path.display(), "JSON root is an array, skipping");
            return Ok(MutationOutcome::default());
        }
        _ => {
            return Err(ResetError::Json {
                path: path.to_path_buf(),
                source: serde::de::Error::custom("JSON root is neither an object nor an array"),
            });
        }
    }

    let (keys_updated, keys_deleted) =
        mutate_value(&mut document, telemetry_keys, session_keys, ids);
    let outcome = MutationOutcome {
        keys_updated,
        keys_deleted,
    };
    if outcome.is_empty() {
        return Ok(outcome);
    }

    let rendered = serde_json::to_string_pretty(&document).map_err(|e| ResetError::Json {
        path: path.to_path_buf(),
        source: e,
    })?;
    write_with_rollback(path, rendered.as_bytes())?;

    tracing::info!(
        path = %path.display(),
        keys_updated,
        keys_deleted,
        "JSON identifiers rewritten"
    );
    Ok(outcome)
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

fn write_with_rollback(path: &Path, bytes: &[u8]) -> Result<()> {
    let backup = sibling(path, ".bak");
    let temp = sibling(path, ".tmp");

    std::fs::copy(path, &backup).map_err(|e| ResetError::io(&backup, e))?;

    let result = write_atomically(path, &temp, bytes);
    if result.is_err() {
        let _ = std::fs::remove_file(&temp);
        if let Err(e) = std::fs::copy(&backup, path) {
            tracing::error!(path = %path.display(), error = %e, "Failed to restore pre-write copy");
        }
    }

    let _ = std::fs::remove_file(&backup);
    result
}

fn write_atomically(path: &Path, temp: &Path, bytes: &[u8]) -> Result<()> {
    let permissions = std::fs::metadata(path)
        .map_err(|e| ResetError::io(path, e))?
        .permissions();

    std::fs::write(temp, bytes).map_err(|e| ResetError::io(temp, e))?;
    std::fs::set_permissions(temp, permissions).map_err(|e| ResetError::io(temp, e))?;
    std::fs::rename(temp, path).map_err(|e| ResetError::io(path, e))?;
    Ok(())
}
