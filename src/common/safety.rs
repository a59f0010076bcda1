use std::path::Path;

/// Paths whose contents must NEVER be cleared, whatever a profile resolves to.
/// A misconfigured cache name or data path template must not wipe these.
#[cfg(not(windows))]
const PROTECTED_PATHS: &[&str] = &[
    "/",
    "/System",
    "/Applications",
    "/Users",
    "/Library",
    "/home",
    "/root",
    "/usr",
    "/bin",
    "/sbin",
    "/var",
    "/etc",
    "/opt",
    "/private",
    "/Volumes",
];

#[cfg(windows)]
const PROTECTED_PATHS: &[&str] = &[
    "C:\\",
    "C:\\Windows",
    "C:\\Users",
    "C:\\Program Files",
    "C:\\Program Files (x86)",
    "C:\\ProgramData",
];

/// Home subdirectories that must never be cleared entirely
const PROTECTED_HOME_DIRS: &[&str] = &[
    "", // home dir itself
    "Desktop",
    "Documents",
    "Downloads",
    "Pictures",
    "Music",
    "Movies",
    "Library",
    "AppData",
    ".config",
    ".local",
    ".ssh",
    ".gnupg",
];

/// Check if a path is protected and its contents must never be cleared
pub fn is_protected(path: &Path) -> bool {
    let path_str = path.to_string_lossy();
    let trimmed = path_str.trim_end_matches(['/', '\\']);

    for protected in PROTECTED_PATHS {
        let protected = protected.trim_end_matches(['/', '\\']);
        if trimmed.eq_ignore_ascii_case(protected) {
            return true;
        }
    }

    if let Some(home) = dirs::home_dir() {
        for dir in PROTECTED_HOME_DIRS {
            let protected_path = if dir.is_empty() {
                home.clone()
            } else {
                home.join(dir)
            };
            if path == protected_path {
                return true;
            }
        }
    }

    false
}
