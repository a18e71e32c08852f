//! Structured logging for the network map engine
//!
//! Console output plus JSON lines in a daily rotating file.
//! Logs are written to: `<config dir>/netmap/logs/` unless overridden.

#[macro_use]
pub mod macros;

use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::log_dir_override;

const LOG_FILE_PREFIX: &str = "netmap.log";

/// Initialize the logging system
///
/// `dir` wins over `NETWORK_MAP_LOG_DIR`, which wins over the platform
/// default. `RUST_LOG` controls the level (default `info`). Calling this a
/// second time, or after another subscriber was installed, is not an error.
pub fn init_logging(dir: Option<PathBuf>) -> Result<PathBuf> {
    let log_dir = match dir {
        Some(dir) => dir,
        None => get_log_directory()?,
    };

    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, LOG_FILE_PREFIX);

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .compact();

    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_file(true)
        .json();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .context("Invalid log filter")?;

    let init_result = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();

    if let Err(e) = init_result {
        // Another subscriber or logger was installed first (tests, embedding apps).
        if e.to_string().contains("already") {
            return Ok(log_dir);
        }
        return Err(anyhow!(e));
    }

    log_info!("Logging initialized. Log directory: {}", log_dir.display());

    Ok(log_dir)
}

/// Log directory path
///
/// `NETWORK_MAP_LOG_DIR` if set, else `<config dir>/netmap/logs`
/// (`~/.config/netmap/logs` on Linux).
pub fn get_log_directory() -> Result<PathBuf> {
    if let Some(dir) = log_dir_override() {
        return Ok(dir);
    }
    let base_dir = dirs::config_dir()
        .ok_or_else(|| anyhow!("Could not find config directory"))?
        .join("netmap");
    Ok(base_dir.join("logs"))
}

/// Current log file path
pub fn get_current_log_file() -> Result<PathBuf> {
    let log_dir = get_log_directory()?;
    let today = chrono::Local::now().format("%Y-%m-%d").to_string();
    Ok(log_dir.join(format!("{}.{}", LOG_FILE_PREFIX, today)))
}
