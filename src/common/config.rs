use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default config file name, looked up in the working directory first
pub const CONFIG_FILE_NAME: &str = "reset_config.json";

/// Global reset configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default)]
    pub description: String,

    /// Application profiles keyed by canonical name (sorted iteration)
    #[serde(default)]
    pub applications: BTreeMap<String, ApplicationProfile>,

    #[serde(default)]
    pub cleaning_options: CleaningOptions,

    #[serde(default)]
    pub backup_options: BackupOptions,

    #[serde(default)]
    pub safety_options: SafetyOptions,

    #[serde(default)]
    pub logging: LoggingOptions,
}

/// Where an application keeps its data, per operating system
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplicationProfile {
    pub display_name: String,

    /// Executable names used by the running-process check
    #[serde(default)]
    pub process_names: Vec<String>,

    /// OS key (`windows`, `darwin`, `linux`) to ordered path templates
    #[serde(default)]
    pub data_paths: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleaningOptions {
    /// Keys whose values are replaced with fresh identifiers
    #[serde(default)]
    pub telemetry_keys: Vec<String>,

    /// Keys that are removed outright
    #[serde(default)]
    pub session_keys: Vec<String>,

    /// Row keywords removed by database sanitization
    #[serde(default)]
    pub database_keywords: Vec<String>,

    /// Cache directory names, optionally with a parent hint (`User/History`)
    #[serde(default)]
    pub cache_directories: Vec<String>,

    /// File names that carry identifiers (`state.vscdb`, `storage.json`, ...)
    #[serde(default)]
    pub database_files: Vec<String>,

    /// Table name fragments whose tables are emptied entirely
    #[serde(default)]
    pub cache_table_patterns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupOptions {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Write zip archives instead of mirrored copies
    #[serde(default)]
    pub compression: bool,

    #[serde(default = "default_retention_days")]
    pub retention_days: i64,

    /// Sources larger than this are not backed up (0 = unlimited)
    #[serde(default = "default_max_backup_mb")]
    pub max_backup_size_mb: u64,

    /// Backup root template; defaults to ~/.appreset/backups
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyOptions {
    #[serde(default = "default_true")]
    pub require_confirmation: bool,

    /// Refuse to reset an application while it is running
    #[serde(default = "default_true")]
    pub check_running_processes: bool,

    /// Hash-compare backups against their sources
    #[serde(default = "default_true")]
    pub verify_backups: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingOptions {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file, relative paths resolve against the data directory
    #[serde(default)]
    pub file: Option<String>,
}

fn default_version() -> String {
    "1.0.0".to_string()
}
fn default_true() -> bool {
    true
}
fn default_retention_days() -> i64 {
    30
}
fn default_max_backup_mb() -> u64 {
    1000
}
fn default_log_level() -> String {
    "INFO".to_string()
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for CleaningOptions {
    fn default() -> Self {
        Self {
            telemetry_keys: strings(&[
                "machineId",
                "telemetry.machineId",
                "telemetryMachineId",
                "deviceId",
                "telemetry.deviceId",
                "lastSessionId",
                "sessionId",
                "installationId",
                "sqmUserId",
                "sqmMachineId",
                "clientId",
                "instanceId",
            ]),
            session_keys: strings(&[
                "lastSessionDate",
                "sessionStartTime",
                "userSession",
                "authToken",
                "accessToken",
                "refreshToken",
                "bearerToken",
                "apiKey",
                "userToken",
            ]),
            database_keywords: strings(&[
                "augment",
                "account",
                "session",
                "user",
                "login",
                "auth",
                "token",
                "credential",
                "profile",
                "identity",
            ]),
            cache_directories: strings(&[
                "IndexedDB",
                "Local Storage",
                "Cache",
                "Code Cache",
                "GPUCache",
                "blob_storage",
                "logs",
                "User/workspaceStorage",
                "User/History",
                "User/logs",
                "CachedData",
                "CachedExtensions",
                "ShaderCache",
                "WebStorage",
            ]),
            database_files: strings(&[
                "state.vscdb",
                "storage.json",
                "preferences.json",
                "settings.json",
            ]),
            cache_table_patterns: strings(&[
                "cache",
                "session",
                "temp",
                "log",
                "history",
                "recent",
                "workspace",
                "project",
            ]),
        }
    }
}

impl Default for BackupOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            compression: false,
            retention_days: default_retention_days(),
            max_backup_size_mb: default_max_backup_mb(),
            directory: None,
        }
    }
}

impl Default for SafetyOptions {
    fn default() -> Self {
        Self {
            require_confirmation: true,
            check_running_processes: true,
            verify_backups: true,
        }
    }
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn profile(display_name: &str, process_names: &[&str], paths: &[(&str, &[&str])]) -> ApplicationProfile {
    ApplicationProfile {
        display_name: display_name.to_string(),
        process_names: strings(process_names),
        data_paths: paths
            .iter()
            .map(|(os, templates)| (os.to_string(), strings(templates)))
            .collect(),
    }
}

impl Default for Config {
    fn default() -> Self {
        let mut applications = BTreeMap::new();
        applications.insert(
            "cursor".to_string(),
            profile(
                "Cursor",
                &["cursor", "cursor.exe"],
                &[
                    (
                        "windows",
                        &[
                            "%APPDATA%/Cursor",
                            "%LOCALAPPDATA%/Cursor",
                            "%APPDATA%/cursor-ai",
                            "%LOCALAPPDATA%/cursor-ai",
                        ],
                    ),
                    (
                        "darwin",
                        &[
                            "~/Library/Application Support/Cursor",
                            "~/Library/Application Support/cursor-ai",
                        ],
                    ),
                    ("linux", &["~/.config/Cursor", "~/.config/cursor-ai"]),
                ],
            ),
        );
        applications.insert(
            "windsurf".to_string(),
            profile(
                "Windsurf",
                &["windsurf", "windsurf.exe", "Windsurf"],
                &[
                    (
                        "windows",
                        &[
                            "%APPDATA%/Windsurf",
                            "%LOCALAPPDATA%/Windsurf",
                            "%APPDATA%/windsurf-ai",
                            "%LOCALAPPDATA%/windsurf-ai",
                            "%APPDATA%/Codeium/Windsurf",
                            "%LOCALAPPDATA%/Codeium/Windsurf",
                        ],
                    ),
                    (
                        "darwin",
                        &[
                            "~/Library/Application Support/Windsurf",
                            "~/Library/Application Support/windsurf-ai",
                            "~/Library/Application Support/Codeium/Windsurf",
                        ],
                    ),
                    (
                        "linux",
                        &[
                            "~/.config/Windsurf",
                            "~/.config/windsurf-ai",
                            "~/.config/Codeium/Windsurf",
                        ],
                    ),
                ],
            ),
        );

        Self {
            version: default_version(),
            description: "Cursor & Windsurf reset configuration".to_string(),
            applications,
            cleaning_options: CleaningOptions::default(),
            backup_options: BackupOptions::default(),
            safety_options: SafetyOptions::default(),
            logging: LoggingOptions::default(),
        }
    }
}

impl Config {
    /// Get the appreset data directory (~/.appreset)
    pub fn data_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(".appreset")
    }

    /// Default backup root
    pub fn default_backup_dir() -> PathBuf {
        Self::data_dir().join("backups")
    }

    /// Find the config file to use when none is given explicitly.
    ///
    /// Order: working directory, executable directory, data directory.
    /// Returns the working-directory path when nothing exists yet.
    pub fn locate() -> PathBuf {
        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.exists() {
            return local;
        }

        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                let candidate = dir.join(CONFIG_FILE_NAME);
                if candidate.exists() {
                    return candidate;
                }
            }
        }

        let user = Self::data_dir().join(CONFIG_FILE_NAME);
        if user.exists() {
            return user;
        }

        local
    }

    /// Load config from a file, or fall back to defaults if it does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;

        let config: Config = if is_toml(path) {
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config: {}", path.display()))?
        } else {
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config: {}", path.display()))?
        };
        Ok(config)
    }

    /// Save config to a file (JSON unless the extension is `.toml`)
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create config dir: {}", dir.display()))?;
        }

        let contents = if is_toml(path) {
            toml::to_string_pretty(self).context("Failed to serialize config")?
        } else {
            serde_json::to_string_pretty(self).context("Failed to serialize config")?
        };
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }

    /// Resolved backup root directory
    pub fn backup_dir(&self) -> PathBuf {
        match &self.backup_options.directory {
            Some(template) if !template.trim().is_empty() => {
                crate::common::paths::expand_path(template)
            }
            _ => Self::default_backup_dir(),
        }
    }

    /// Resolved log file path, if logging to a file is configured
    pub fn log_file(&self) -> Option<PathBuf> {
        let file = self.logging.file.as_deref()?.trim();
        if file.is_empty() {
            return None;
        }
        let path = crate::common::paths::expand_path(file);
        if path.is_absolute() {
            Some(path)
        } else {
            Some(Self::data_dir().join("logs").join(path))
        }
    }

    /// Backup size limit in bytes (None = unlimited)
    pub fn max_backup_bytes(&self) -> Option<u64> {
        match self.backup_options.max_backup_size_mb {
            0 => None,
            mb => Some(mb * 1024 * 1024),
        }
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension()
        .map(|e| e.eq_ignore_ascii_case("toml"))
        .unwrap_or(false)
}
