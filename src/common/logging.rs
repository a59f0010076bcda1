//! Tracing subscriber setup.
//!
//! Console output goes to stderr so `--format json` stays machine readable.
//! When a log file is configured, a second non-ANSI layer appends to it.
use anyhow::{Context, Result};
use std::path::Path;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Initializes logging for the process.
///
/// # Arguments
///
/// * `level` - Default level from the config file (`INFO`, `debug`, ...)
/// * `verbose` - Forces debug output for this crate
/// * `log_file` - Optional file that receives a copy of every event
pub fn init_logging(level: &str, verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let default_directive = if verbose {
        "appreset=debug".to_string()
    } else {
        format!("appreset={}", level.to_lowercase())
    };

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&default_directive))
        .unwrap_or_else(|_| EnvFilter::new("appreset=info"));

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .boxed();

    let file_layer = match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;
            let file_name = path
                .file_name()
                .map(|n| n.to_os_string())
                .unwrap_or_else(|| "appreset.log".into());

            let appender = tracing_appender::rolling::never(dir, file_name);
            Some(
                fmt::layer()
                    .with_writer(appender)
                    .with_ansi(false)
                    .with_target(true)
                    .with_line_number(true)
                    .boxed(),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .ok(); // Ignore error if already initialized

    tracing::debug!(level, verbose, "Logging initialized");
    Ok(())
}
