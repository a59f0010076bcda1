use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;

use appreset::cleaner::{BackupManager, CancelToken, CleanReport, Engine, EngineState};
use appreset::cli::args::{BackupAction, Cli, Commands, CompletionShell, ConfigAction, OutputFormat};
use appreset::cli::output;
use appreset::common::config::Config;
use appreset::common::errors::ResetError;
use appreset::common::format;
use appreset::common::logging;
use appreset::database;

/// Progress updates buffered between the worker and the progress bar
const PROGRESS_CAPACITY: usize = 64;

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let config_path = cli.config.clone().unwrap_or_else(Config::locate);
    let config = Config::load(&config_path)?;

    logging::init_logging(&config.logging.level, cli.verbose, config.log_file().as_deref())?;
    tracing::debug!(config = %config_path.display(), "Configuration loaded");

    match cli.command {
        Commands::Discover => cmd_discover(&cli, config),

        Commands::Clean {
            ref application,
            all,
            yes,
            dry_run,
        } => cmd_clean(&cli, config, application.clone(), all, yes, dry_run),

        Commands::Backups { ref action } => cmd_backups(&cli, &config, action),

        Commands::InspectDb { ref path } => cmd_inspect_db(&cli, path),

        Commands::Config { ref action } => cmd_config(&cli, &config, &config_path, action),

        Commands::Completions { ref shell } => {
            use clap::CommandFactory;
            let mut cmd = Cli::command();
            let shell = match shell {
                CompletionShell::Bash => clap_complete::Shell::Bash,
                CompletionShell::Zsh => clap_complete::Shell::Zsh,
                CompletionShell::Fish => clap_complete::Shell::Fish,
            };
            clap_complete::generate(shell, &mut cmd, "appreset", &mut std::io::stdout());
            Ok(())
        }
    }
}

fn confirm(prompt: &str) -> Result<bool> {
    use std::io::Write;
    print!("\n  {} {} [y/N] ", "❓", prompt);
    std::io::stdout().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}

// ─── Discover ─────────────────────────────────────────────────────────────────

fn cmd_discover(cli: &Cli, config: Config) -> Result<()> {
    let engine = Engine::new(config).context("Failed to prepare backup directory")?;
    let apps = engine.applications();

    match cli.format {
        OutputFormat::Human if !cli.quiet => {
            output::print_applications(&apps, engine.backup_directory())
        }
        OutputFormat::Json => output::print_json(&apps)?,
        _ => output::print_applications_quiet(&apps),
    }
    Ok(())
}

// ─── Clean ────────────────────────────────────────────────────────────────────

fn cmd_clean(
    cli: &Cli,
    config: Config,
    application: Option<String>,
    all: bool,
    yes: bool,
    dry_run: bool,
) -> Result<()> {
    let require_confirmation = config.safety_options.require_confirmation;
    let mut engine = Engine::new(config).context("Failed to prepare backup directory")?;
    engine.set_dry_run(dry_run);

    let targets: Vec<String> = if all {
        engine
            .discover()
            .into_iter()
            .filter(|(_, path)| !path.as_os_str().is_empty())
            .map(|(name, _)| name)
            .collect()
    } else {
        application.into_iter().collect()
    };

    if targets.is_empty() {
        println!("  {} No installed applications found.", "✨");
        return Ok(());
    }

    if require_confirmation && !yes && !dry_run {
        let prompt = format!(
            "Reset {}? Identifiers, sessions and caches will be cleared",
            targets.join(", ").cyan()
        );
        if !confirm(&prompt)? {
            println!("  {} Cancelled", "✗".red());
            return Ok(());
        }
    }

    let show_progress = !cli.quiet && cli.format == OutputFormat::Human;
    let results = run_with_progress(engine, targets, show_progress)?;

    let mut failed = 0;
    let mut reports: Vec<&CleanReport> = Vec::new();
    for (name, result) in &results {
        match result {
            Ok(report) => reports.push(report),
            Err(e) => {
                failed += 1;
                if cli.format != OutputFormat::Json {
                    eprintln!("  {} {}: {}", "✗".red(), name, e);
                }
            }
        }
    }

    match cli.format {
        OutputFormat::Human => reports.iter().for_each(|r| output::print_clean_report(r)),
        OutputFormat::Json => {
            let json: Vec<serde_json::Value> = results
                .iter()
                .map(|(name, result)| match result {
                    Ok(report) => serde_json::json!({ "application": name, "report": report }),
                    Err(e) => serde_json::json!({ "application": name, "error": e.to_string() }),
                })
                .collect();
            output::print_json(&json)?;
        }
        OutputFormat::Quiet => reports.iter().for_each(|r| output::print_clean_quiet(r)),
    }

    if failed > 0 {
        anyhow::bail!("{} of {} applications could not be reset", failed, results.len());
    }
    Ok(())
}

/// Run the engine on a worker thread and render its progress channel
fn run_with_progress(
    engine: Engine,
    targets: Vec<String>,
    show_progress: bool,
) -> Result<Vec<(String, Result<CleanReport, ResetError>)>> {
    let (mut engine, receiver) = engine.with_progress_channel(PROGRESS_CAPACITY);
    let cancel = CancelToken::new();

    let worker = std::thread::spawn(move || engine.clean_applications(&targets, &cancel));

    let pb = if show_progress {
        let pb = ProgressBar::new(100);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("━━░"),
        );
        Some(pb)
    } else {
        None
    };

    // The channel closes when the worker drops the engine
    for update in receiver {
        tracing::debug!(phase = %update.phase, pct = update.percentage, "{}", update.message);
        if let Some(ref pb) = pb {
            pb.set_position(update.percentage as u64);
            pb.set_message(format!(
                "{} {}",
                update.application.as_deref().unwrap_or("").bold(),
                update.message
            ));
            if update.phase == EngineState::Complete || update.phase == EngineState::Error {
                pb.println(format!("  {} {}", "•".dimmed(), update.message));
            }
        }
    }

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    worker
        .join()
        .map_err(|_| anyhow::anyhow!("Reset worker panicked"))
}

// ─── Backups ──────────────────────────────────────────────────────────────────

fn cmd_backups(cli: &Cli, config: &Config, action: &BackupAction) -> Result<()> {
    let backups = BackupManager::from_config(config)
        .context("Failed to open backup directory")?;

    match action {
        BackupAction::List => {
            let records = backups.list_backups()?;
            match cli.format {
                OutputFormat::Human => output::print_backups(&records, backups.root()),
                OutputFormat::Json => output::print_json(&records)?,
                OutputFormat::Quiet => {
                    for r in &records {
                        println!("{}  {}  {}", r.name(), r.kind, format::format_size(r.size_bytes));
                    }
                }
            }
        }
        BackupAction::Restore { name, to, force } => {
            let record = backups
                .find(name)?
                .ok_or_else(|| anyhow::anyhow!("No backup named '{}'", name))?;

            let target = backups.restore(&record, to.as_deref(), *force)?;
            match cli.format {
                OutputFormat::Human => output::print_restore(&record, &target),
                OutputFormat::Json => output::print_json(&serde_json::json!({
                    "backup": record.name(),
                    "restored_to": target,
                }))?,
                OutputFormat::Quiet => println!("{}", target.display()),
            }
        }
        BackupAction::Prune { days } => {
            let days = days.unwrap_or(config.backup_options.retention_days);
            let report = backups.prune_older_than(days)?;
            match cli.format {
                OutputFormat::Human => output::print_prune_report(&report),
                OutputFormat::Json => output::print_json(&report)?,
                OutputFormat::Quiet => {
                    println!("{}  {}", report.pruned.len(), format::format_size(report.total_bytes_freed))
                }
            }
        }
    }
    Ok(())
}

// ─── Inspect ──────────────────────────────────────────────────────────────────

fn cmd_inspect_db(cli: &Cli, path: &Path) -> Result<()> {
    let inspection = database::inspect_database(path)?;
    match cli.format {
        OutputFormat::Json => output::print_json(&inspection)?,
        OutputFormat::Human => output::print_inspection(&inspection),
        OutputFormat::Quiet => {
            for sample in &inspection.relevant {
                println!("{}\t{}", sample.descriptor.table, sample.row_count);
            }
        }
    }
    Ok(())
}

// ─── Config ───────────────────────────────────────────────────────────────────

fn cmd_config(cli: &Cli, config: &Config, path: &Path, action: &ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            if cli.format == OutputFormat::Json || !is_toml(path) {
                output::print_json(config)?;
            } else {
                println!("{}", toml::to_string_pretty(config)?);
            }
        }
        ConfigAction::Path => {
            let state = if path.exists() { "" } else { " (not created, using defaults)" };
            println!("{}{}", path.display(), state.dimmed());
        }
        ConfigAction::Init { force } => {
            if path.exists() && !force {
                anyhow::bail!(
                    "Config already exists at {} (use --force to overwrite)",
                    path.display()
                );
            }
            Config::default().save(path)?;
            println!("  {} Wrote default configuration to {}", "✓".green(), path.display());
        }
    }
    Ok(())
}

fn is_toml(path: &Path) -> bool {
    path.extension().is_some_and(|e| e.eq_ignore_ascii_case("toml"))
}
