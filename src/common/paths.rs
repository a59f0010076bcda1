//! Path template expansion.
//!
//! Application profiles describe their data locations as templates such as
//! `~/.config/Cursor` or `%APPDATA%/Cursor`. Expansion never fails: an
//! unknown environment variable becomes the empty string, and existence of
//! the resulting path is the caller's concern.

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::path::{Path, PathBuf};

lazy_static! {
    /// `%NAME%` (Windows style)
    static ref PERCENT_VAR: Regex = Regex::new(r"%([^%\s/\\]+)%").unwrap();
    /// `${NAME}` or `$NAME` (Unix style)
    static ref DOLLAR_VAR: Regex =
        Regex::new(r"\$\{([^}\s]+)\}|\$([A-Za-z_][A-Za-z0-9_]*)").unwrap();
}

/// Expand a path template using the real home directory and environment
pub fn expand_template(template: &str) -> String {
    let home = dirs::home_dir();
    expand_with(template, home.as_deref(), |name| std::env::var(name).ok())
}

/// Expand a path template with an explicit home directory and variable lookup.
///
/// A leading `~` is replaced by `home` (left untouched when `home` is None),
/// then `${NAME}`/`$NAME` and `%NAME%` placeholders are substituted. Forward
/// slashes are converted to the platform separator.
pub fn expand_with<F>(template: &str, home: Option<&Path>, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut result = template.to_string();

    if result.starts_with('~') {
        match home {
            Some(home) => {
                result = result.replacen('~', &home.to_string_lossy(), 1);
            }
            None => tracing::warn!(template, "Home directory unavailable"),
        }
    }

    let resolve = |name: &str| -> String {
        match lookup(name) {
            Some(value) => value,
            None => {
                tracing::debug!(var = name, "Environment variable not found");
                String::new()
            }
        }
    };

    result = DOLLAR_VAR
        .replace_all(&result, |caps: &Captures| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            resolve(name)
        })
        .into_owned();

    result = PERCENT_VAR
        .replace_all(&result, |caps: &Captures| resolve(&caps[1]))
        .into_owned();

    to_native_separators(&result)
}

/// Expand a template into a `PathBuf`
pub fn expand_path(template: &str) -> PathBuf {
    PathBuf::from(expand_template(template))
}

#[cfg(windows)]
fn to_native_separators(path: &str) -> String {
    path.replace('/', "\\")
}

#[cfg(not(windows))]
fn to_native_separators(path: &str) -> String {
    path.to_string()
}

/// Configuration key for the running operating system
pub fn current_os_key() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        "windows" => "windows",
        _ => "linux",
    }
}
