// ABOUTME: tracing subscriber setup for the interactive binary and the hook helper

use crate::config::gwt_home;
use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::PathBuf;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "gwt=info";

/// JSON-lines file logging under `<gwt home>/logs`
///
/// The terminal belongs to the interactive loop, so nothing is written to it.
/// Returns the log file path.
pub fn setup_file_logging() -> Result<PathBuf> {
    let log_dir = gwt_home()
        .map(|home| home.join("logs"))
        .unwrap_or_else(|_| PathBuf::from(".gwt/logs"));
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    let log_file = log_dir.join(format!(
        "gwt-{}.jsonl",
        chrono::Local::now().format("%Y%m%d-%H%M%S")
    ));
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file)
        .with_context(|| format!("Failed to create log file {}", log_file.display()))?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_target(true)
                .with_writer(file)
                .with_ansi(false),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into()))
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(log_file)
}

/// Stderr-only logging for short-lived commands (`hook`, `status`)
///
/// Warnings only unless `RUST_LOG` says otherwise; never creates files.
pub fn setup_stderr_logging() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .try_init();
}
