pub mod backup;
pub mod engine;
pub mod manifest;
pub mod progress;
pub mod purger;

pub use backup::BackupManager;
pub use engine::{CancelToken, CleanReport, DatabaseSummary, Engine};
pub use manifest::{BackupKind, BackupRecord};
pub use progress::{
    ChannelReporter, EngineState, NullReporter, ProgressReporter, ProgressUpdate, RecordingReporter,
};
pub use purger::{prune_older_than, PruneReport, PrunedBackup};
