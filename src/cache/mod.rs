//! Cache directory eviction.
//!
//! Cache names come from the config either as a bare directory name
//! (`GPUCache`) or with a parent hint (`User/workspaceStorage`). A hinted
//! name matches directories called `workspaceStorage` whose parent, or any
//! ancestor below the application root, is called `User`.

use serde::Serialize;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::cleaner::backup::BackupManager;
use crate::cleaner::manifest::BackupRecord;
use crate::common::errors::{ResetError, Result};
use crate::common::{format, safety};
use crate::scanner::walker;

/// Per cache-kind counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStat {
    pub directories_found: usize,
    pub files_found: usize,
    pub bytes_found: u64,
    pub bytes_freed: u64,
    pub directories_cleared: usize,
}

/// Result of one eviction pass over an application root
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheReport {
    /// Keyed by configured cache name
    pub stats: BTreeMap<String, CacheStat>,
    pub failures: usize,
    pub backups: Vec<BackupRecord>,
    pub backup_failures: usize,
    pub dry_run: bool,
}

impl CacheReport {
    pub fn bytes_freed(&self) -> u64 {
        self.stats.values().map(|s| s.bytes_freed).sum()
    }

    pub fn directories_cleared(&self) -> usize {
        self.stats.values().map(|s| s.directories_cleared).sum()
    }

    pub fn directories_found(&self) -> usize {
        self.stats.values().map(|s| s.directories_found).sum()
    }

    /// Human-readable multi-line summary
    pub fn summary(&self) -> String {
        if self.directories_found() == 0 {
            return "No cache directories found".to_string();
        }

        let mut lines = vec![format!(
            "Cache: {} of {} directories cleared, {} freed",
            self.directories_cleared(),
            self.directories_found(),
            format::format_size(self.bytes_freed())
        )];
        for (kind, stat) in self.stats.iter().filter(|(_, s)| s.directories_found > 0) {
            lines.push(format!(
                "  {}: {} found ({}), {} cleared, {} freed",
                kind,
                stat.directories_found,
                format::format_size(stat.bytes_found),
                stat.directories_cleared,
                format::format_size(stat.bytes_freed)
            ));
        }
        if self.failures > 0 {
            lines.push(format!("  {} directories could not be cleared", self.failures));
        }
        lines.join("\n")
    }
}

/// One directory selected for eviction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheTarget {
    pub kind: String,
    pub path: PathBuf,
}

/// Outcome of clearing one directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Eviction {
    pub size_before: u64,
    pub size_after: u64,
    pub attempts: u8,
}

impl Eviction {
    pub fn bytes_freed(&self) -> u64 {
        self.size_before.saturating_sub(self.size_after)
    }
}

/// A parsed cache name: `name` or `hint/name`
#[derive(Debug, Clone, PartialEq, Eq)]
struct CachePattern {
    name: String,
    hint: Option<String>,
}

impl CachePattern {
    fn parse(raw: &str) -> Self {
        let raw = raw.trim_matches(['/', '\\']);
        match raw.split_once(['/', '\\']) {
            Some((hint, rest)) => {
                let name = rest.rsplit(['/', '\\']).next().unwrap_or(rest);
                Self {
                    name: name.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            None => Self {
                name: raw.to_string(),
                hint: None,
            },
        }
    }

    fn matches(&self, root: &Path, dir: &Path) -> bool {
        let Some(name) = dir.file_name() else {
            return false;
        };
        if name.to_string_lossy() != self.name {
            return false;
        }

        let Some(hint) = &self.hint else {
            return true;
        };

        if dir
            .parent()
            .and_then(|p| p.file_name())
            .map(|p| p.to_string_lossy() == *hint)
            .unwrap_or(false)
        {
            return true;
        }

        dir.strip_prefix(root)
            .ok()
            .and_then(|rel| rel.parent())
            .map(|ancestors| {
                ancestors
                    .components()
                    .any(|c| c.as_os_str().to_string_lossy() == *hint)
            })
            .unwrap_or(false)
    }
}

/// Finds, backs up and empties cache directories
#[derive(Debug, Clone)]
pub struct CacheEvictor {
    cache_names: Vec<String>,
}

impl CacheEvictor {
    pub fn new(cache_names: &[String]) -> Self {
        Self {
            cache_names: cache_names.to_vec(),
        }
    }

    /// Directories matching any configured cache name, in config order.
    /// Directories nested inside an earlier match are dropped.
    pub fn targets(&self, root: &Path) -> Vec<CacheTarget> {
        let mut targets: Vec<CacheTarget> = Vec::new();

        for raw in &self.cache_names {
            let pattern = CachePattern::parse(raw);
            if pattern.name.is_empty() {
                continue;
            }

            for path in walker::find_directories(root, |dir| pattern.matches(root, dir)) {
                let already_covered = targets
                    .iter()
                    .any(|t| path == t.path || path.starts_with(&t.path));
                if !already_covered {
                    targets.push(CacheTarget {
                        kind: raw.clone(),
                        path,
                    });
                }
            }
        }

        targets
    }

    /// Sizes of every cache kind without touching anything
    pub fn survey(&self, root: &Path) -> BTreeMap<String, CacheStat> {
        let mut stats: BTreeMap<String, CacheStat> = self
            .cache_names
            .iter()
            .map(|n| (n.clone(), CacheStat::default()))
            .collect();

        for target in self.targets(root) {
            let stat = stats.entry(target.kind).or_default();
            stat.directories_found += 1;
            stat.files_found += walker::file_count(&target.path);
            stat.bytes_found += walker::dir_size(&target.path);
        }

        stats
    }

    /// Back up and clear every cache directory under `root`.
    ///
    /// `on_target` is called before each directory with its index and the
    /// total count. Failures are counted, never returned.
    pub fn evict<F>(
        &self,
        root: &Path,
        backups: Option<(&BackupManager, &str)>,
        dry_run: bool,
        mut on_target: F,
    ) -> CacheReport
    where
        F: FnMut(usize, usize, &CacheTarget),
    {
        let mut report = CacheReport {
            dry_run,
            stats: self
                .cache_names
                .iter()
                .map(|n| (n.clone(), CacheStat::default()))
                .collect(),
            ..CacheReport::default()
        };

        let targets = self.targets(root);
        let total = targets.len();

        for (index, target) in targets.iter().enumerate() {
            on_target(index, total, target);

            let size_before = walker::dir_size(&target.path);
            let files = walker::file_count(&target.path);
            {
                let stat = report.stats.entry(target.kind.clone()).or_default();
                stat.directories_found += 1;
                stat.files_found += files;
                stat.bytes_found += size_before;
            }

            if dry_run {
                continue;
            }

            if let Some((manager, app)) = backups {
                let label = format!("{}_cache_{}", app, base_name(&target.path));
                match manager.backup(&target.path, &label) {
                    Ok(Some(record)) => report.backups.push(record),
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(path = %target.path.display(), error = %e, "Cache backup failed");
                        report.backup_failures += 1;
                    }
                }
            }

            match evict_directory(&target.path) {
                Ok(eviction) => {
                    let stat = report.stats.entry(target.kind.clone()).or_default();
                    stat.bytes_freed += eviction.bytes_freed();
                    if eviction.size_after == 0 {
                        stat.directories_cleared += 1;
                    }
                    tracing::info!(
                        path = %target.path.display(),
                        freed = %format::format_size(eviction.bytes_freed()),
                        attempts = eviction.attempts,
                        "Cache directory cleared"
                    );
                }
                Err(e) => {
                    tracing::warn!(path = %target.path.display(), error = %e, "Cache eviction failed");
                    report.failures += 1;
                }
            }
        }

        report
    }
}

fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Clear a directory, with one extra pass when something survives the first
pub fn evict_directory(dir: &Path) -> Result<Eviction> {
    evict_with(dir, clear_directory_contents)
}

/// Two clearing passes at most, whatever `clear` leaves behind
fn evict_with<F>(dir: &Path, mut clear: F) -> Result<Eviction>
where
    F: FnMut(&Path) -> Result<usize>,
{
    if safety::is_protected(dir) {
        return Err(ResetError::io(
            dir,
            std::io::Error::new(ErrorKind::PermissionDenied, "refusing to clear a protected path"),
        ));
    }

    let size_before = walker::dir_size(dir);
    clear(dir)?;
    let mut size_after = walker::dir_size(dir);
    let mut attempts = 1;

    if size_after > 0 || has_entries(dir) {
        attempts += 1;
        let remaining = size_after;
        clear(dir)?;
        size_after = walker::dir_size(dir);
        tracing::debug!(
            path = %dir.display(),
            before = remaining,
            after = size_after,
            "Second clearing pass"
        );
    }

    Ok(Eviction {
        size_before,
        size_after,
        attempts,
    })
}

fn has_entries(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

/// Remove every entry inside `dir`, keeping `dir` itself.
///
/// Symlinks are unlinked without following them; read-only files are made
/// writable and retried. Returns how many entries were removed.
pub fn clear_directory_contents(dir: &Path) -> Result<usize> {
    let entries = std::fs::read_dir(dir).map_err(|e| ResetError::io(dir, e))?;
    let mut removed = 0usize;

    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        let file_type = match entry.file_type() {
            Ok(ft) => ft,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Cannot stat entry");
                continue;
            }
        };

        let result = if file_type.is_symlink() {
            remove_symlink(&path)
        } else if file_type.is_dir() {
            std::fs::remove_dir_all(&path)
        } else {
            remove_file_forced(&path)
        };

        match result {
            Ok(()) => removed += 1,
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to remove cache entry"),
        }
    }

    Ok(removed)
}

fn remove_symlink(path: &Path) -> std::io::Result<()> {
    // Directory symlinks on Windows need remove_dir
    std::fs::remove_file(path).or_else(|_| std::fs::remove_dir(path))
}

fn remove_file_forced(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() == ErrorKind::PermissionDenied => {
            let mut permissions = std::fs::metadata(path)?.permissions();
            #[allow(clippy::permissions_set_readonly_false)]
            permissions.set_readonly(false);
            std::fs::set_permissions(path, permissions)?;
            std::fs::remove_file(path)
        }
        other => other,
    }
}
