//! Phase progress reporting.
//!
//! The engine pushes [`ProgressUpdate`]s through a [`ProgressReporter`].
//! [`ChannelReporter`] forwards them over a bounded channel and drops
//! updates when the receiver falls behind, so a slow UI never stalls a run.

use serde::Serialize;
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::sync::Mutex;

/// Engine phases, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Idle,
    Validating,
    Discovering,
    PruningBackups,
    MutatingIdentifiers,
    SanitizingDatabases,
    EvictingCache,
    Complete,
    Error,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            EngineState::Idle => "idle",
            EngineState::Validating => "validating",
            EngineState::Discovering => "discovering",
            EngineState::PruningBackups => "pruning_backups",
            EngineState::MutatingIdentifiers => "mutating_identifiers",
            EngineState::SanitizingDatabases => "sanitizing_databases",
            EngineState::EvictingCache => "evicting_cache",
            EngineState::Complete => "complete",
            EngineState::Error => "error",
        };
        write!(f, "{}", label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressUpdate {
    pub phase: EngineState,
    pub message: String,
    /// 0 to 100, never decreasing within one run
    pub percentage: u8,
    pub application: Option<String>,
}

/// Sink for progress updates
pub trait ProgressReporter: Send + Sync {
    fn report(&self, update: ProgressUpdate);
}

/// Discards every update
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl ProgressReporter for NullReporter {
    fn report(&self, _update: ProgressUpdate) {}
}

/// Forwards updates over a bounded channel, dropping them when it is full
#[derive(Debug, Clone)]
pub struct ChannelReporter {
    sender: SyncSender<ProgressUpdate>,
}

impl ChannelReporter {
    /// Create a reporter and the receiving end of its channel
    pub fn bounded(capacity: usize) -> (Self, Receiver<ProgressUpdate>) {
        let (sender, receiver) = sync_channel(capacity);
        (Self { sender }, receiver)
    }
}

impl ProgressReporter for ChannelReporter {
    fn report(&self, update: ProgressUpdate) {
        match self.sender.try_send(update) {
            Ok(()) => {}
            Err(TrySendError::Full(dropped)) => {
                tracing::trace!(percentage = dropped.percentage, "Progress channel full, update dropped");
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

/// Collects every update in memory
#[derive(Debug, Default)]
pub struct RecordingReporter {
    updates: Mutex<Vec<ProgressUpdate>>,
}

impl RecordingReporter {
    pub fn updates(&self) -> Vec<ProgressUpdate> {
        self.updates.lock().map(|u| u.clone()).unwrap_or_default()
    }
}

impl ProgressReporter for RecordingReporter {
    fn report(&self, update: ProgressUpdate) {
        if let Ok(mut updates) = self.updates.lock() {
            updates.push(update);
        }
    }
}

/// Per-run view over a reporter that keeps percentages monotonic
pub struct RunProgress<'a> {
    reporter: &'a dyn ProgressReporter,
    application: String,
    high_water: u8,
    completed: bool,
}

impl<'a> RunProgress<'a> {
    pub fn new(reporter: &'a dyn ProgressReporter, application: &str) -> Self {
        Self {
            reporter,
            application: application.to_string(),
            high_water: 0,
            completed: false,
        }
    }

    /// Emit an update, clamped to `[running max, 100]`
    pub fn emit(&mut self, phase: EngineState, percentage: u8, message: impl Into<String>) {
        if self.completed {
            return;
        }

        let percentage = percentage.min(100).max(self.high_water);
        self.high_water = percentage;
        if phase == EngineState::Complete {
            self.completed = true;
        }

        self.reporter.report(ProgressUpdate {
            phase,
            message: message.into(),
            percentage,
            application: Some(self.application.clone()),
        });
    }

    /// Percentage `index/total` of the way through `[start, end]`
    pub fn interpolate(start: u8, end: u8, index: usize, total: usize) -> u8 {
        if total == 0 || end <= start {
            return start;
        }
        let span = (end - start) as usize;
        let step = (span * index.min(total)) / total;
        start + step as u8
    }
}
