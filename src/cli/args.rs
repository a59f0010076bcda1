use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// AppReset: reset an application's local identity with recoverable backups
#[derive(Parser, Debug)]
#[command(
    name = "appreset",
    version,
    about = "Reset an application's local identity and session footprint",
    long_about = "AppReset finds an application's local data, rewrites telemetry and\n\
                   session identifiers, sanitizes its databases and clears its caches.\n\
                   Everything it touches is backed up first and can be restored.",
    after_help = "EXAMPLES:\n  \
        appreset discover                       Show configured applications\n  \
        appreset clean cursor --dry-run         Preview a reset of Cursor\n  \
        appreset clean --all --yes              Reset every installed application\n  \
        appreset backups list                   Show stored backups\n  \
        appreset backups restore <NAME>         Put a backup back in place\n  \
        appreset backups prune --days 7         Remove backups older than a week\n  \
        appreset inspect-db state.vscdb         Show key/value tables of a database\n  \
        appreset config init                    Write the default configuration"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file to use
    #[arg(long, short, global = true, value_name = "PATH", env = "APPRESET_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, default_value = "human")]
    pub format: OutputFormat,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Quiet mode, minimal output
    #[arg(long, short, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List configured applications and where their data lives
    Discover,

    /// Reset an application's identifiers, databases and caches
    Clean {
        /// Application to reset (as named in the configuration)
        #[arg(value_name = "APP", required_unless_present = "all")]
        application: Option<String>,

        /// Reset every application that was found
        #[arg(long, conflicts_with = "application")]
        all: bool,

        /// Skip confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,

        /// Report what would change without touching anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Manage backups
    Backups {
        #[command(subcommand)]
        action: BackupAction,
    },

    /// Show the key/value tables of a database file
    InspectDb {
        /// Database file to inspect
        path: PathBuf,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: CompletionShell,
    },
}

#[derive(Subcommand, Debug)]
pub enum BackupAction {
    /// List stored backups, newest first
    List,

    /// Restore a backup to its original location
    Restore {
        /// Backup name as shown by `backups list`
        name: String,

        /// Restore somewhere else instead
        #[arg(long, value_name = "PATH")]
        to: Option<PathBuf>,

        /// Replace the target if it already exists
        #[arg(long)]
        force: bool,
    },

    /// Delete backups older than the retention window
    Prune {
        /// Retention in days (defaults to the configured value)
        #[arg(long)]
        days: Option<i64>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,

    /// Print the configuration file path in use
    Path,

    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
    Quiet,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
