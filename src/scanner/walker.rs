use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Extensions treated as embedded databases
pub const DATABASE_EXTENSIONS: &[&str] = &["vscdb", "db", "sqlite", "sqlite3"];

/// Collect files under `root` whose base name matches one of `names`
/// (case-insensitive). Results are sorted by path.
pub fn find_files_by_name(root: &Path, names: &[String]) -> Vec<PathBuf> {
    if names.is_empty() || !root.exists() {
        return Vec::new();
    }

    let wanted: Vec<String> = names.iter().map(|n| n.to_lowercase()).collect();

    walk_files(root)
        .filter(|e| {
            let name = e.file_name().to_string_lossy().to_lowercase();
            wanted.contains(&name)
        })
        .map(|e| e.into_path())
        .collect()
}

/// Collect database-like files under `root`, skipping anything that looks
/// like a backup copy
pub fn find_database_files(root: &Path) -> Vec<PathBuf> {
    if !root.exists() {
        return Vec::new();
    }

    walk_files(root)
        .map(|e| e.into_path())
        .filter(|p| is_database_file(p) && !is_backup_path(p))
        .collect()
}

/// Collect directories under `root` (root itself excluded) accepted by `matches`
pub fn find_directories<F>(root: &Path, mut matches: F) -> Vec<PathBuf>
where
    F: FnMut(&Path) -> bool,
{
    if !root.is_dir() {
        return Vec::new();
    }

    WalkDir::new(root)
        .follow_links(false)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
        .map(|e| e.into_path())
        .filter(|p| matches(p))
        .collect()
}

/// Whether the extension marks a database file
pub fn is_database_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| {
            let ext = ext.to_string_lossy().to_lowercase();
            DATABASE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Paths containing `backup` or `.bak` are never treated as live data
pub fn is_backup_path(path: &Path) -> bool {
    let lower = path.to_string_lossy().to_lowercase();
    lower.contains("backup") || lower.contains(".bak")
}

/// Calculate total size of a directory (sum of logical file lengths).
/// Unreadable entries are skipped; a plain file yields its own length.
pub fn dir_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.metadata().map(|m| m.len()).unwrap_or(0))
        .sum()
}

/// Count regular files below a path
pub fn file_count(path: &Path) -> usize {
    WalkDir::new(path)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .count()
}

/// Expand a glob pattern into existing paths, sorted
pub fn expand_glob(pattern: &str) -> Vec<PathBuf> {
    match glob::glob(pattern) {
        Ok(entries) => {
            let mut paths: Vec<PathBuf> = entries.filter_map(|e| e.ok()).collect();
            paths.sort();
            paths
        }
        Err(e) => {
            tracing::debug!(pattern, error = %e, "Invalid glob pattern");
            Vec::new()
        }
    }
}

fn walk_files(root: &Path) -> impl Iterator<Item = DirEntry> {
    WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
}
