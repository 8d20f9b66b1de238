//! File logging for the binary. The terminal belongs to the UI, so log lines go to
//! `<cache dir>/csvflow.log`.

use color_eyre::eyre::eyre;
use color_eyre::Result;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

use crate::cache::CacheManager;

/// Environment variable holding the log filter (e.g. `csvflow=debug`).
pub const LOG_ENV: &str = "CSVFLOW_LOG";

pub fn default_filter(debug: bool) -> &'static str {
    if debug {
        "debug"
    } else {
        "info"
    }
}

/// Install the global subscriber writing to the cache log file. Returns the log path.
pub fn init(cache: &CacheManager, debug: bool) -> Result<PathBuf> {
    cache.ensure_cache_dir()?;
    let path = cache.log_path();
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| eyre!("Could not open log file {}: {}", path.display(), e))?;

    tracing_subscriber::fmt()
        .with_ansi(false)
        .with_target(false)
        .with_writer(Mutex::new(file))
        .with_env_filter(
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| default_filter(debug).into()),
        )
        .try_init()
        .map_err(|e| eyre!("Could not initialise logging: {}", e))?;
    Ok(path)
}
