use std::path::PathBuf;
use thiserror::Error;

/// Typed errors for reset operations.
///
/// The CLI works with `anyhow` at the top level, but the engine reports
/// precondition failures and per-item failures through this enum so callers
/// can tell an aborted run from a skipped file.
#[derive(Debug, Error)]
pub enum ResetError {
    /// Application name is not present in the configuration
    #[error("Unknown application '{name}'")]
    UnknownApplication { name: String },

    /// Application is configured but none of its data paths exist
    #[error("Application '{name}' was not found on this system")]
    ApplicationNotFound { name: String },

    /// Application is running and the safety check is enabled
    #[error("Application '{name}' is currently running. Please close it first")]
    ApplicationRunning { name: String },

    /// Backup source path does not exist
    #[error("Backup source does not exist: '{}'", path.display())]
    BackupSourceMissing { path: PathBuf },

    /// Backup source exceeds the configured size limit
    #[error("Backup source '{}' is {size} bytes (limit: {limit} bytes)", path.display())]
    BackupTooLarge { path: PathBuf, size: u64, limit: u64 },

    /// Backup copy does not match its source
    #[error("Backup verification failed for '{}': {message}", path.display())]
    BackupVerification { path: PathBuf, message: String },

    /// Restore would overwrite an existing path
    #[error("Restore target already exists (use overwrite): '{}'", path.display())]
    RestoreTargetExists { path: PathBuf },

    /// File system operation failed
    #[error("I/O error at '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// SQLite operation failed
    #[error("Database error in '{}': {source}", path.display())]
    Database {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Every connection strategy failed
    #[error("Could not open database '{}' with any connection strategy", path.display())]
    DatabaseUnavailable { path: PathBuf },

    /// JSON document could not be parsed or serialized
    #[error("JSON error in '{}': {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Zip archive could not be written or read
    #[error("Archive error at '{}': {source}", path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    /// Operation was cancelled before it started
    #[error("Operation cancelled")]
    Cancelled,
}

impl ResetError {
    /// Wrap an I/O error with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ResetError::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap a SQLite error with the database path
    pub fn database(path: impl Into<PathBuf>, source: rusqlite::Error) -> Self {
        ResetError::Database {
            path: path.into(),
            source,
        }
    }

    /// Whether this error aborts a whole `clean_application` call
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            ResetError::UnknownApplication { .. }
                | ResetError::ApplicationNotFound { .. }
                | ResetError::ApplicationRunning { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ResetError>;
