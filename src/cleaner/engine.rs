use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::Instant;

use super::backup::BackupManager;
use super::manifest::BackupRecord;
use super::progress::{
    ChannelReporter, EngineState, NullReporter, ProgressReporter, ProgressUpdate, RunProgress,
};
use crate::cache::{CacheEvictor, CacheReport, CacheStat};
use crate::common::config::Config;
use crate::common::errors::{ResetError, Result};
use crate::common::format;
use crate::common::process::{ProcessInspector, SystemProcessInspector};
use crate::database::sanitizer;
use crate::discovery::{self, DiscoveredApplication, Discovery};
use crate::identity::{CandidateKind, IdentifierMutator, MutationSummary};
use crate::scanner::walker;

/// Shared flag checked between applications
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Totals for the database sanitization phase
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DatabaseSummary {
    pub files_processed: usize,
    pub files_cleaned: usize,
    pub rows_affected: usize,
    pub files_failed: usize,
}

impl DatabaseSummary {
    pub fn message(&self) -> String {
        format!(
            "Databases: {} files processed, {} cleaned, {} rows affected, {} failed",
            self.files_processed, self.files_cleaned, self.rows_affected, self.files_failed
        )
    }
}

/// Everything one `clean_application` run did
#[derive(Debug, Clone, Serialize)]
pub struct CleanReport {
    pub application: String,
    pub path: PathBuf,
    pub dry_run: bool,
    pub cache_survey: BTreeMap<String, CacheStat>,
    pub backups_pruned: usize,
    pub identifiers: MutationSummary,
    pub databases: DatabaseSummary,
    pub cache: CacheReport,
    pub backups: Vec<BackupRecord>,
    pub backup_failures: usize,
    pub size_before: u64,
    pub size_after: u64,
    pub bytes_freed: u64,
    pub duration_secs: f64,
}

/// Runs the reset phases for configured applications
pub struct Engine {
    config: Config,
    discovery: Discovery,
    backups: BackupManager,
    mutator: IdentifierMutator,
    evictor: CacheEvictor,
    reporter: Arc<dyn ProgressReporter>,
    state: EngineState,
    dry_run: bool,
}

impl Engine {
    /// Engine probing real processes and reporting nowhere
    pub fn new(config: Config) -> Result<Self> {
        Self::with_inspector(config, Arc::new(SystemProcessInspector))
    }

    pub fn with_inspector(config: Config, inspector: Arc<dyn ProcessInspector>) -> Result<Self> {
        let backups = BackupManager::from_config(&config)?;
        let discovery = Discovery::new(&config, inspector);
        let mutator = IdentifierMutator::new(&config.cleaning_options);
        let evictor = CacheEvictor::new(&config.cleaning_options.cache_directories);

        tracing::debug!(backup_root = %backups.root().display(), "Engine ready");

        Ok(Self {
            config,
            discovery,
            backups,
            mutator,
            evictor,
            reporter: Arc::new(NullReporter),
            state: EngineState::Idle,
            dry_run: false,
        })
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Report progress over a bounded channel and hand back its receiver
    pub fn with_progress_channel(self, capacity: usize) -> (Self, Receiver<ProgressUpdate>) {
        let (reporter, receiver) = ChannelReporter::bounded(capacity);
        (self.with_reporter(Arc::new(reporter)), receiver)
    }

    pub fn set_dry_run(&mut self, dry_run: bool) {
        self.dry_run = dry_run;
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn backup_directory(&self) -> &Path {
        self.backups.root()
    }

    pub fn backups(&self) -> &BackupManager {
        &self.backups
    }

    /// Application name to resolved data directory (empty when not found)
    pub fn discover(&self) -> BTreeMap<String, PathBuf> {
        let resolved = self.discovery.resolved_paths();
        let found = resolved.values().filter(|p| !p.as_os_str().is_empty()).count();
        tracing::info!(configured = resolved.len(), found, "Discovery finished");
        resolved
    }

    pub fn resolved_paths(&self) -> BTreeMap<String, PathBuf> {
        self.discovery.resolved_paths()
    }

    pub fn applications(&self) -> Vec<DiscoveredApplication> {
        self.discovery.applications()
    }

    pub fn is_running(&self, application: &str) -> bool {
        self.discovery.is_running(application)
    }

    pub fn directory_size(&self, path: &Path) -> u64 {
        discovery::directory_size(path)
    }

    pub fn format_size(&self, bytes: u64) -> String {
        format::format_size(bytes)
    }

    fn transition(&mut self, state: EngineState) {
        tracing::debug!(from = %self.state, to = %state, "Engine state");
        self.state = state;
    }

    /// Reset one application.
    ///
    /// Only precondition failures (unknown, not found, running) are
    /// returned as errors; everything after validation is best effort.
    pub fn clean_application(&mut self, application: &str) -> Result<CleanReport> {
        let started = Instant::now();
        let reporter = Arc::clone(&self.reporter);
        let mut run = RunProgress::new(reporter.as_ref(), application);

        self.transition(EngineState::Validating);
        run.emit(EngineState::Validating, 0, format!("Starting reset of {}", application));

        let root = match self.validate(application) {
            Ok(root) => root,
            Err(e) => {
                self.transition(EngineState::Error);
                run.emit(EngineState::Error, 0, e.to_string());
                tracing::error!(app = application, error = %e, "Reset aborted");
                return Err(e);
            }
        };
        let size_before = walker::dir_size(&root);
        let mut backups: Vec<BackupRecord> = Vec::new();
        let mut backup_failures = 0usize;

        // Discovering
        self.transition(EngineState::Discovering);
        run.emit(
            EngineState::Discovering,
            10,
            format!("Found {} at {} ({})", application, root.display(), format::format_size(size_before)),
        );
        let cache_survey = self.evictor.survey(&root);
        let cache_dirs: usize = cache_survey.values().map(|s| s.directories_found).sum();
        let cache_bytes: u64 = cache_survey.values().map(|s| s.bytes_found).sum();
        run.emit(
            EngineState::Discovering,
            15,
            format!("{} cache directories ({})", cache_dirs, format::format_size(cache_bytes)),
        );

        // PruningBackups
        self.transition(EngineState::PruningBackups);
        run.emit(EngineState::PruningBackups, 18, "Pruning old backups");
        let backups_pruned = if self.dry_run {
            0
        } else {
            match self.backups.prune_older_than(self.config.backup_options.retention_days) {
                Ok(report) => {
                    for error in &report.errors {
                        tracing::warn!(error = %error, "Backup prune failure");
                    }
                    report.pruned.len()
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Backup pruning failed");
                    0
                }
            }
        };

        // MutatingIdentifiers
        self.transition(EngineState::MutatingIdentifiers);
        run.emit(EngineState::MutatingIdentifiers, 20, "Rewriting telemetry identifiers");
        let candidates = self.mutator.find_candidates(&root);
        let mut identifiers = MutationSummary::default();
        for (index, candidate) in candidates.iter().enumerate() {
            run.emit(
                EngineState::MutatingIdentifiers,
                RunProgress::interpolate(20, 45, index, candidates.len()),
                format!("Processing {}", candidate.file_name()),
            );

            if self.dry_run {
                if candidate.kind == CandidateKind::Other {
                    identifiers.files_skipped += 1;
                } else {
                    identifiers.files_processed += 1;
                }
                continue;
            }

            let label = format!("{}_telemetry_{}", application, candidate.file_name());
            self.backup_item(&candidate.path, &label, &mut backups, &mut backup_failures);

            let result = self.mutator.mutate(candidate);
            if let Err(e) = &result {
                tracing::warn!(path = %candidate.path.display(), error = %e, "Identifier mutation failed");
            }
            identifiers.record(&result);
        }
        run.emit(EngineState::MutatingIdentifiers, 45, identifiers.message());

        // SanitizingDatabases
        self.transition(EngineState::SanitizingDatabases);
        let databases =
            self.clean_databases(application, &root, &mut run, &mut backups, &mut backup_failures);

        // EvictingCache
        self.transition(EngineState::EvictingCache);
        let cache = self.clean_cache(application, &root, &mut run);
        backup_failures += cache.backup_failures;
        backups.extend(cache.backups.iter().cloned());

        // Complete
        let size_after = walker::dir_size(&root);
        let bytes_freed = size_before.saturating_sub(size_after);
        self.transition(EngineState::Complete);
        run.emit(
            EngineState::Complete,
            100,
            format!("Reset of {} complete, {} freed", application, format::format_size(bytes_freed)),
        );

        tracing::info!(
            app = application,
            freed = %format::format_size(bytes_freed),
            backups = backups.len(),
            backup_failures,
            "Reset finished"
        );

        Ok(CleanReport {
            application: application.to_string(),
            path: root,
            dry_run: self.dry_run,
            cache_survey,
            backups_pruned,
            identifiers,
            databases,
            cache,
            backups,
            backup_failures,
            size_before,
            size_after,
            bytes_freed,
            duration_secs: started.elapsed().as_secs_f64(),
        })
    }

    /// Back up and sanitize every database file under `root`
    fn clean_databases(
        &self,
        application: &str,
        root: &Path,
        run: &mut RunProgress<'_>,
        backups: &mut Vec<BackupRecord>,
        backup_failures: &mut usize,
    ) -> DatabaseSummary {
        run.emit(EngineState::SanitizingDatabases, 50, "Sanitizing databases");
        let database_files = walker::find_database_files(root);
        let mut databases = DatabaseSummary::default();

        for (index, path) in database_files.iter().enumerate() {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            run.emit(
                EngineState::SanitizingDatabases,
                RunProgress::interpolate(50, 65, index, database_files.len()),
                format!("Sanitizing {}", name),
            );
            databases.files_processed += 1;

            if self.dry_run {
                continue;
            }

            let label = format!("{}_database_{}", application, name);
            self.backup_item(path, &label, backups, backup_failures);

            match sanitizer::sanitize_database(path, &self.config.cleaning_options) {
                Ok(outcome) => {
                    databases.rows_affected += outcome.rows_affected();
                    if outcome.rows_affected() > 0 {
                        databases.files_cleaned += 1;
                    }
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Database sanitization failed");
                    databases.files_failed += 1;
                }
            }
        }

        run.emit(EngineState::SanitizingDatabases, 65, databases.message());
        databases
    }

    /// Back up and clear every cache directory under `root`
    fn clean_cache(&self, application: &str, root: &Path, run: &mut RunProgress<'_>) -> CacheReport {
        run.emit(EngineState::EvictingCache, 70, "Clearing cache directories");
        let backup_target = if self.backups.is_enabled() {
            Some((&self.backups, application))
        } else {
            None
        };

        let cache = self.evictor.evict(root, backup_target, self.dry_run, |index, total, target| {
            run.emit(
                EngineState::EvictingCache,
                RunProgress::interpolate(70, 95, index, total),
                format!("Clearing {}", target.path.display()),
            );
        });

        run.emit(EngineState::EvictingCache, 95, cache.summary());
        cache
    }

    /// Resolve the application's root or fail with a precondition error
    fn validate(&self, application: &str) -> Result<PathBuf> {
        if !self.config.applications.contains_key(application) {
            return Err(ResetError::UnknownApplication {
                name: application.to_string(),
            });
        }

        let root = self
            .discovery
            .resolve_application(application)
            .ok_or_else(|| ResetError::ApplicationNotFound {
                name: application.to_string(),
            })?;

        if self.config.safety_options.check_running_processes && self.discovery.is_running(application) {
            return Err(ResetError::ApplicationRunning {
                name: application.to_string(),
            });
        }

        Ok(root)
    }

    fn backup_item(
        &self,
        path: &Path,
        label: &str,
        records: &mut Vec<BackupRecord>,
        failures: &mut usize,
    ) {
        match self.backups.backup(path, label) {
            Ok(Some(record)) => records.push(record),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Backup failed, continuing");
                *failures += 1;
            }
        }
    }

    /// Reset several applications in order, stopping between them when
    /// `cancel` is set. Cancelled applications report `Cancelled`.
    pub fn clean_applications(
        &mut self,
        applications: &[String],
        cancel: &CancelToken,
    ) -> Vec<(String, Result<CleanReport>)> {
        let mut results = Vec::with_capacity(applications.len());

        for application in applications {
            if cancel.is_cancelled() {
                tracing::info!(app = %application, "Cancelled before start");
                results.push((application.clone(), Err(ResetError::Cancelled)));
                continue;
            }
            let result = self.clean_application(application);
            results.push((application.clone(), result));
        }

        results
    }
}
