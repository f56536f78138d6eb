//! Log file setup
//!
//! The terminal belongs to the device screen while the loop runs, so logs go
//! to a file. `RUST_LOG` overrides the default `info` filter.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

pub const LOG_FILE: &str = "pocketpet.log";

/// Where to log: the explicit path, else the data directory, else the
/// working directory.
pub fn log_path(explicit: Option<&Path>, data_dir: Option<PathBuf>) -> PathBuf {
    match (explicit, data_dir) {
        (Some(path), _) => path.to_path_buf(),
        (None, Some(dir)) => dir.join(LOG_FILE),
        (None, None) => PathBuf::from(LOG_FILE),
    }
}

/// Install the global subscriber, appending to `path`.
pub fn init(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create log directory {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install logger: {e}"))?;

    Ok(())
}
