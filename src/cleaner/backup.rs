use chrono::{Local, Utc};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::manifest::{self, BackupKind, BackupRecord};
use super::purger::{self, PruneReport};
use crate::common::config::Config;
use crate::common::errors::{ResetError, Result};
use crate::scanner::walker;

/// Creates, lists and restores backups under one root directory
#[derive(Debug, Clone)]
pub struct BackupManager {
    root: PathBuf,
    enabled: bool,
    compression: bool,
    max_bytes: Option<u64>,
    verify: bool,
}

impl BackupManager {
    /// Build a manager from the config and create the backup root
    pub fn from_config(config: &Config) -> Result<Self> {
        let manager = Self {
            root: config.backup_dir(),
            enabled: config.backup_options.enabled,
            compression: config.backup_options.compression,
            max_bytes: config.max_backup_bytes(),
            verify: config.safety_options.verify_backups,
        };
        manager.ensure_root()?;
        Ok(manager)
    }

    /// Manager rooted at `root` with compression and verification switches
    pub fn new(root: impl Into<PathBuf>, compression: bool, verify: bool) -> Result<Self> {
        let manager = Self {
            root: root.into(),
            enabled: true,
            compression,
            max_bytes: None,
            verify,
        };
        manager.ensure_root()?;
        Ok(manager)
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_size_limit(mut self, max_bytes: Option<u64>) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    fn ensure_root(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root).map_err(|e| ResetError::io(&self.root, e))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Back up `source` under a name derived from `label`.
    ///
    /// Returns `Ok(None)` when backups are disabled.
    pub fn backup(&self, source: &Path, label: &str) -> Result<Option<BackupRecord>> {
        if !self.enabled {
            return Ok(None);
        }

        if !source.exists() {
            return Err(ResetError::BackupSourceMissing {
                path: source.to_path_buf(),
            });
        }

        let size = walker::dir_size(source);
        if let Some(limit) = self.max_bytes {
            if size > limit {
                return Err(ResetError::BackupTooLarge {
                    path: source.to_path_buf(),
                    size,
                    limit,
                });
            }
        }

        let label = sanitize_label(label);
        let backup_path = self.unique_path(&label);

        let kind = match self.write_backup(source, &backup_path) {
            Ok(kind) => kind,
            Err(e) => {
                discard_partial(&backup_path);
                return Err(e);
            }
        };

        let record = BackupRecord {
            source: source.to_path_buf(),
            backup_path,
            label,
            kind,
            created_at: Utc::now(),
            size_bytes: size,
            source_is_dir: source.is_dir(),
        };

        if let Err(e) = manifest::append_record(&self.root, &record) {
            tracing::warn!(error = %e, "Failed to record backup in manifest");
        }

        tracing::info!(
            source = %source.display(),
            backup = %record.backup_path.display(),
            kind = %kind,
            "Backup created"
        );
        Ok(Some(record))
    }

    /// `<label>_<YYYYMMDD_HHMMSS>[_N][.zip]`, first free name wins
    fn write_backup(&self, source: &Path, backup_path: &Path) -> Result<BackupKind> {
        let kind = if self.compression {
            write_archive(source, backup_path)?;
            BackupKind::Archive
        } else if source.is_dir() {
            copy_dir_recursive(source, backup_path)?;
            BackupKind::Directory
        } else {
            std::fs::copy(source, backup_path).map_err(|e| ResetError::io(source, e))?;
            BackupKind::File
        };

        if self.verify {
            verify_backup(source, backup_path, kind)?;
        }
        Ok(kind)
    }

    fn unique_path(&self, label: &str) -> PathBuf {
        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let extension = if self.compression { ".zip" } else { "" };

        let base = format!("{}_{}", label, stamp);
        let mut candidate = self.root.join(format!("{}{}", base, extension));
        let mut counter = 1;
        while candidate.exists() {
            candidate = self.root.join(format!("{}_{}{}", base, counter, extension));
            counter += 1;
        }
        candidate
    }

    /// Recorded backups that still exist, newest first
    pub fn list_backups(&self) -> Result<Vec<BackupRecord>> {
        let mut records: Vec<BackupRecord> = manifest::read_records(&self.root)?
            .into_iter()
            .filter(|r| r.exists())
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    /// Look up a backup by its file name
    pub fn find(&self, name: &str) -> Result<Option<BackupRecord>> {
        Ok(self.list_backups()?.into_iter().find(|r| r.name() == name))
    }

    /// Copy a backup back to its source, or to `destination` when given.
    /// An existing target is replaced only with `overwrite`.
    pub fn restore(
        &self,
        record: &BackupRecord,
        destination: Option<&Path>,
        overwrite: bool,
    ) -> Result<PathBuf> {
        let target = destination.unwrap_or(&record.source).to_path_buf();

        if !record.backup_path.exists() {
            return Err(ResetError::BackupSourceMissing {
                path: record.backup_path.clone(),
            });
        }

        if target.exists() {
            if !overwrite {
                return Err(ResetError::RestoreTargetExists { path: target });
            }
            remove_path(&target)?;
        }

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ResetError::io(parent, e))?;
        }

        match record.kind {
            BackupKind::File => {
                std::fs::copy(&record.backup_path, &target)
                    .map_err(|e| ResetError::io(&target, e))?;
            }
            BackupKind::Directory => copy_dir_recursive(&record.backup_path, &target)?,
            BackupKind::Archive => {
                extract_archive(&record.backup_path, &target, record.source_is_dir)?
            }
        }

        tracing::info!(
            backup = %record.backup_path.display(),
            target = %target.display(),
            "Backup restored"
        );
        Ok(target)
    }

    /// Remove backups older than the retention window
    pub fn prune_older_than(&self, retention_days: i64) -> Result<PruneReport> {
        purger::prune_older_than(&self.root, retention_days)
    }
}

/// Path separators in labels become `_`
pub fn sanitize_label(label: &str) -> String {
    let cleaned: String = label
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c => c,
        })
        .collect();
    if cleaned.trim().is_empty() {
        "backup".to_string()
    } else {
        cleaned
    }
}

/// Recursively copy a directory. Symlinks are skipped.
fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<()> {
    std::fs::create_dir_all(dst).map_err(|e| ResetError::io(dst, e))?;

    for entry in std::fs::read_dir(src).map_err(|e| ResetError::io(src, e))? {
        let entry = entry.map_err(|e| ResetError::io(src, e))?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        let file_type = entry.file_type().map_err(|e| ResetError::io(&src_path, e))?;

        if file_type.is_symlink() {
            tracing::debug!(path = %src_path.display(), "Skipping symlink in backup");
        } else if file_type.is_dir() {
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            std::fs::copy(&src_path, &dst_path).map_err(|e| ResetError::io(&src_path, e))?;
        }
    }

    Ok(())
}

fn archive_error(path: &Path) -> impl FnOnce(zip::result::ZipError) -> ResetError + '_ {
    move |source| ResetError::Archive {
        path: path.to_path_buf(),
        source,
    }
}

/// Write `source` into a deflated zip. Trees keep their relative paths,
/// a single file is stored under its base name.
fn write_archive(source: &Path, archive_path: &Path) -> Result<usize> {
    let file = File::create(archive_path).map_err(|e| ResetError::io(archive_path, e))?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut files_written = 0usize;

    if source.is_file() {
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "file".to_string());
        add_file(&mut zip, source, name, options, archive_path)?;
        files_written += 1;
    } else {
        for entry in WalkDir::new(source)
            .follow_links(false)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let Ok(relative) = entry.path().strip_prefix(source) else {
                continue;
            };
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            if entry.file_type().is_dir() {
                zip.add_directory(name, options)
                    .map_err(archive_error(archive_path))?;
            } else if entry.file_type().is_file() {
                add_file(&mut zip, entry.path(), name, options, archive_path)?;
                files_written += 1;
            }
        }
    }

    zip.finish().map_err(archive_error(archive_path))?;
    Ok(files_written)
}

fn add_file(
    zip: &mut ZipWriter<File>,
    path: &Path,
    name: String,
    options: SimpleFileOptions,
    archive_path: &Path,
) -> Result<()> {
    let mut input = File::open(path).map_err(|e| ResetError::io(path, e))?;
    let large = input
        .metadata()
        .map(|m| m.len() >= u32::MAX as u64)
        .unwrap_or(false);
    zip.start_file(name, options.large_file(large))
        .map_err(archive_error(archive_path))?;
    std::io::copy(&mut input, zip).map_err(|e| ResetError::io(path, e))?;
    Ok(())
}

fn extract_archive(archive_path: &Path, target: &Path, tree: bool) -> Result<()> {
    let file = File::open(archive_path).map_err(|e| ResetError::io(archive_path, e))?;
    let mut archive = ZipArchive::new(file).map_err(archive_error(archive_path))?;

    // Single-file archives restore to the target path itself
    if !tree && archive.len() == 1 {
        let mut entry = archive.by_index(0).map_err(archive_error(archive_path))?;
        let mut output = File::create(target).map_err(|e| ResetError::io(target, e))?;
        std::io::copy(&mut entry, &mut output).map_err(|e| ResetError::io(target, e))?;
        return Ok(());
    }

    std::fs::create_dir_all(target).map_err(|e| ResetError::io(target, e))?;
    archive.extract(target).map_err(archive_error(archive_path))
}

fn remove_path(path: &Path) -> Result<()> {
    let result = if path.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    };
    result.map_err(|e| ResetError::io(path, e))
}

/// Drop whatever a failed backup left in the root
fn discard_partial(path: &Path) {
    if !path.exists() {
        return;
    }
    if let Err(e) = remove_path(path) {
        tracing::warn!(path = %path.display(), error = %e, "Failed to remove partial backup");
    }
}

/// Compare a fresh backup with its source
fn verify_backup(source: &Path, backup: &Path, kind: BackupKind) -> Result<()> {
    let mismatch = |message: String| ResetError::BackupVerification {
        path: backup.to_path_buf(),
        message,
    };

    match kind {
        BackupKind::File => {
            if file_hash(source)? != file_hash(backup)? {
                return Err(mismatch("checksum differs from source".to_string()));
            }
        }
        BackupKind::Directory => {
            for entry in WalkDir::new(source)
                .follow_links(false)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
            {
                let Ok(relative) = entry.path().strip_prefix(source) else {
                    continue;
                };
                let copy = backup.join(relative);
                if !copy.exists() {
                    return Err(mismatch(format!("missing {}", relative.display())));
                }
                if file_hash(entry.path())? != file_hash(&copy)? {
                    return Err(mismatch(format!("checksum differs for {}", relative.display())));
                }
            }
        }
        BackupKind::Archive => {
            let expected = if source.is_file() { 1 } else { walker::file_count(source) };
            let file = File::open(backup).map_err(|e| ResetError::io(backup, e))?;
            let archive = ZipArchive::new(file).map_err(archive_error(backup))?;
            let actual = archive.file_names().filter(|n| !n.ends_with('/')).count();
            if actual != expected {
                return Err(mismatch(format!(
                    "archive holds {} files, source has {}",
                    actual, expected
                )));
            }
        }
    }

    Ok(())
}

/// Full SHA-256 of a file
fn file_hash(path: &Path) -> Result<String> {
    let file = File::open(path).map_err(|e| ResetError::io(path, e))?;
    let mut reader = BufReader::with_capacity(1024 * 1024, file);
    let mut hasher = Sha256::new();

    let mut buffer = vec![0u8; 64 * 1024];
    loop {
        let bytes_read = reader.read(&mut buffer).map_err(|e| ResetError::io(path, e))?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}
