//! Application data discovery.
//!
//! Resolves each configured application profile to the first existing data
//! directory for the running operating system.

use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::common::config::{ApplicationProfile, Config};
use crate::common::format;
use crate::common::paths;
use crate::common::process::ProcessInspector;
use crate::scanner::walker;

/// One application as seen on this machine
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveredApplication {
    pub name: String,
    pub display_name: String,
    /// Resolved data directory, empty when not found
    pub path: PathBuf,
    pub found: bool,
    pub running: bool,
    pub size_bytes: u64,
    pub size: String,
}

/// Resolves profiles to paths and answers liveness queries
pub struct Discovery {
    profiles: BTreeMap<String, ApplicationProfile>,
    os_key: String,
    inspector: Arc<dyn ProcessInspector>,
}

impl Discovery {
    pub fn new(config: &Config, inspector: Arc<dyn ProcessInspector>) -> Self {
        Self {
            profiles: config.applications.clone(),
            os_key: paths::current_os_key().to_string(),
            inspector,
        }
    }

    /// Override the OS key used to select path templates
    pub fn with_os_key(mut self, os_key: &str) -> Self {
        self.os_key = os_key.to_string();
        self
    }

    pub fn profile(&self, name: &str) -> Option<&ApplicationProfile> {
        self.profiles.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.profiles.keys()
    }

    /// Map of application name to its resolved path (empty if not found)
    pub fn resolved_paths(&self) -> BTreeMap<String, PathBuf> {
        self.profiles
            .iter()
            .map(|(name, profile)| {
                let path = self.resolve(profile).unwrap_or_default();
                if path.as_os_str().is_empty() {
                    tracing::debug!(app = %name, "No data directory found");
                } else {
                    tracing::debug!(app = %name, path = %path.display(), "Resolved data directory");
                }
                (name.clone(), path)
            })
            .collect()
    }

    /// Resolve one application by name
    pub fn resolve_application(&self, name: &str) -> Option<PathBuf> {
        self.profiles.get(name).and_then(|p| self.resolve(p))
    }

    /// First existing expansion of the profile's templates for this OS
    fn resolve(&self, profile: &ApplicationProfile) -> Option<PathBuf> {
        let templates = profile.data_paths.get(&self.os_key)?;

        for template in templates {
            let expanded = paths::expand_template(template);
            if expanded.is_empty() {
                continue;
            }

            if expanded.contains('*') {
                if let Some(hit) = walker::expand_glob(&expanded).into_iter().find(|p| p.exists()) {
                    return Some(hit);
                }
                continue;
            }

            let candidate = PathBuf::from(expanded);
            if candidate.exists() {
                return Some(candidate);
            }
        }

        None
    }

    /// Whether any of the application's processes is running.
    /// Unknown applications are never running.
    pub fn is_running(&self, name: &str) -> bool {
        let Some(profile) = self.profiles.get(name) else {
            return false;
        };

        if profile.process_names.is_empty() {
            return self.inspector.is_running(name);
        }

        profile
            .process_names
            .iter()
            .any(|process| self.inspector.is_running(process))
    }

    /// Every configured application with path, liveness and size.
    /// Sizes are computed in parallel.
    pub fn applications(&self) -> Vec<DiscoveredApplication> {
        let resolved = self.resolved_paths();

        let mut apps: Vec<DiscoveredApplication> = resolved
            .into_par_iter()
            .map(|(name, path)| {
                let found = !path.as_os_str().is_empty();
                let size_bytes = if found { directory_size(&path) } else { 0 };
                let display_name = self
                    .profiles
                    .get(&name)
                    .map(|p| p.display_name.clone())
                    .unwrap_or_else(|| name.clone());
                DiscoveredApplication {
                    running: self.is_running(&name),
                    display_name,
                    found,
                    size_bytes,
                    size: format::format_size(size_bytes),
                    path,
                    name,
                }
            })
            .collect();

        apps.sort_by(|a, b| a.name.cmp(&b.name));
        apps
    }
}

/// Recursive sum of file lengths below `path`
pub fn directory_size(path: &Path) -> u64 {
    walker::dir_size(path)
}
