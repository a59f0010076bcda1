use colored::*;
use serde::Serialize;

use crate::cleaner::{BackupRecord, CleanReport, PruneReport};
use crate::common::format::{self, format_path, format_size, format_size_colored};
use crate::database::DatabaseInspection;
use crate::discovery::DiscoveredApplication;

fn rule(width: usize) {
    println!("{}", "─".repeat(width).dimmed());
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print discovered applications
pub fn print_applications(apps: &[DiscoveredApplication], backup_root: &std::path::Path) {
    println!();
    println!("  {} Applications", "🔎");
    rule(72);
    println!();

    if apps.is_empty() {
        println!("  No applications are configured.");
        println!();
        return;
    }

    println!(
        "  {:<14} {:<18} {:>10}  {:<8} {}",
        "Name".dimmed(),
        "Display".dimmed(),
        "Size".dimmed(),
        "State".dimmed(),
        "Path".dimmed(),
    );
    println!("  {}", "─".repeat(68).dimmed());

    for app in apps {
        let state = if !app.found {
            "missing".dimmed().to_string()
        } else if app.running {
            "running".yellow().to_string()
        } else {
            "ready".green().to_string()
        };
        let path = if app.found {
            format_path(&app.path)
        } else {
            "-".to_string()
        };
        println!(
            "  {:<14} {:<18} {:>10}  {:<8} {}",
            app.name,
            format::truncate(&app.display_name, 18),
            if app.found { app.size.clone() } else { "-".to_string() },
            state,
            path.dimmed(),
        );
    }

    println!();
    println!("  {} Backups: {}", "💾", format_path(backup_root).cyan());
    println!();
}

pub fn print_applications_quiet(apps: &[DiscoveredApplication]) {
    for app in apps.iter().filter(|a| a.found) {
        println!("{}\t{}\t{}", app.name, app.size_bytes, app.path.display());
    }
}

/// Print the outcome of one reset
pub fn print_clean_report(report: &CleanReport) {
    println!();
    let (icon, label) = if report.dry_run {
        ("ℹ️", "Dry run")
    } else {
        ("✓", "Reset complete")
    };
    println!(
        "  {} {} for {} in {}",
        icon,
        label.bold(),
        report.application.cyan(),
        format::format_duration(report.duration_secs),
    );
    println!("  {} {}", "📁", format_path(&report.path).dimmed());
    rule(60);

    println!("  {}", report.identifiers.message());
    println!("  {}", report.databases.message());
    for line in report.cache.summary().lines() {
        println!("  {}", line);
    }

    if report.dry_run {
        let found: u64 = report.cache_survey.values().map(|s| s.bytes_found).sum();
        let files: usize = report.cache_survey.values().map(|s| s.files_found).sum();
        println!(
            "  {} Would clear {} of cache ({}). No files modified.",
            "ℹ️",
            format_size_colored(found),
            format::format_count(files),
        );
    } else {
        println!(
            "  {} Size: {} → {} (freed {})",
            "📦",
            format_size(report.size_before),
            format_size(report.size_after),
            format_size_colored(report.bytes_freed),
        );
        if report.backups_pruned > 0 {
            println!("  {} Pruned {} old backups", "🔥", report.backups_pruned);
        }
    }

    if !report.backups.is_empty() {
        println!();
        println!("  {} {} backups written:", "💾", report.backups.len());
        for record in report.backups.iter().take(10) {
            println!("    {} {}", "•".dimmed(), record.name());
        }
        if report.backups.len() > 10 {
            println!(
                "    ... and {} more",
                (report.backups.len() - 10).to_string().dimmed()
            );
        }
    }
    if report.backup_failures > 0 {
        println!(
            "  {} {} backups failed (see log)",
            "⚠".yellow(),
            report.backup_failures
        );
    }
    println!();
}

pub fn print_clean_quiet(report: &CleanReport) {
    println!(
        "{}  {}  {}  {}",
        report.application,
        format_size(report.bytes_freed),
        report.identifiers.keys_updated + report.identifiers.keys_deleted,
        report.backups.len()
    );
}

/// Print the list of stored backups
pub fn print_backups(records: &[BackupRecord], root: &std::path::Path) {
    println!();
    println!("  {} Backups in {}", "💾", format_path(root).cyan());
    rule(80);
    println!();

    if records.is_empty() {
        println!("  No backups found.");
        println!();
        return;
    }

    println!(
        "  {:<44} {:<10} {:>10}  {}",
        "Name".dimmed(),
        "Kind".dimmed(),
        "Size".dimmed(),
        "Created".dimmed(),
    );
    println!("  {}", "─".repeat(76).dimmed());

    for record in records {
        println!(
            "  {:<44} {:<10} {:>10}  {}",
            format::truncate(&record.name(), 44),
            record.kind.to_string(),
            format_size(record.size_bytes),
            record
                .created_at
                .with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M"),
        );
    }

    println!();
    println!("  {} Restore: {}", "💡", "appreset backups restore <NAME>".cyan());
    println!();
}

pub fn print_restore(record: &BackupRecord, target: &std::path::Path) {
    println!();
    println!(
        "  {} Restored {} ({})",
        "✓".green(),
        record.name().cyan(),
        format_size_colored(record.size_bytes),
    );
    println!("  {} {}", "→".dimmed(), format_path(target));
    println!();
}

/// Print prune results
pub fn print_prune_report(report: &PruneReport) {
    println!();
    if report.pruned.is_empty() {
        println!("  {} No backups to prune.", "✓".green());
    } else {
        println!(
            "  {} Pruned {} backups, freed {}",
            "🔥",
            report.pruned.len().to_string().cyan(),
            format_size_colored(report.total_bytes_freed),
        );
        for pruned in &report.pruned {
            println!(
                "    {} {} ({})",
                "✗".red(),
                pruned.name,
                format_size(pruned.bytes_freed),
            );
        }
    }

    if !report.errors.is_empty() {
        println!();
        for err in &report.errors {
            println!("    {} {}", "⚠".yellow(), err.dimmed());
        }
    }
    println!();
}

/// Print a database inspection
pub fn print_inspection(inspection: &DatabaseInspection) {
    println!();
    println!(
        "  {} {} (opened {})",
        "🗄",
        format_path(&inspection.path).cyan(),
        inspection.strategy,
    );
    rule(60);
    println!("  Tables: {}", inspection.tables.join(", "));

    if inspection.relevant.is_empty() {
        println!();
        println!("  {} No key/value tables found.", "ℹ️");
        println!();
        return;
    }

    for sample in &inspection.relevant {
        let d = &sample.descriptor;
        println!();
        println!(
            "  {} {} ({} → {}, {} rows)",
            "●".green(),
            d.table.bold(),
            d.key_column,
            d.value_column,
            sample.row_count,
        );
        for (key, value) in &sample.rows {
            println!(
                "    {:<40} {}",
                format::truncate(key, 40),
                format::truncate(value, 48).dimmed()
            );
        }
        if sample.row_count as usize > sample.rows.len() {
            println!(
                "    ... and {} more",
                (sample.row_count as usize - sample.rows.len()).to_string().dimmed()
            );
        }
    }
    println!();
}
