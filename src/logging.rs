//! Diagnostic log file.
//!
//! Everything the bot traces goes to `{dir}/log.log`, recreated on every
//! start.  The terminal belongs to the status display, so nothing is ever
//! traced to stdout or stderr.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::EnvFilter;

use crate::config::LogConfig;

const LOG_FILE: &str = "log.log";
const TIMESTAMP: &str = "%Y/%m/%d %H:%M:%S";

pub fn log_path(dir: &Path) -> PathBuf {
    dir.join(LOG_FILE)
}

/// `RUST_LOG` wins over the configured level.
fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Install the global subscriber.  Returns the log file path.
pub fn init(config: &LogConfig) -> Result<PathBuf> {
    fs::create_dir_all(&config.dir)
        .with_context(|| format!("failed to create log directory {}", config.dir.display()))?;
    let path = log_path(&config.dir);
    let file = File::create(&path).with_context(|| format!("failed to create {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_timer(ChronoLocal::new(TIMESTAMP.to_string()))
        .with_target(false)
        .with_env_filter(filter(&config.level))
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install the log subscriber: {e}"))?;

    tracing::info!(
        "{} v{} starting, logging to {}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        path.display()
    );
    Ok(path)
}
