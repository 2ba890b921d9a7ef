use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::Config;
use crate::constants::LOG_FILENAME;

/// Sends tracing output to `entity-chat.log` in the cache dir, filtered by
/// `RUST_LOG`. The terminal is left to the renderer.
pub fn init_logging() -> Result<PathBuf> {
    let dir = Config::cache_dir()?;
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create cache dir: {}", dir.display()))?;
    let path = dir.join(LOG_FILENAME);
    let log_file = Arc::new(
        std::fs::File::create(&path)
            .with_context(|| format!("Failed to create log file: {}", path.display()))?,
    );

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_ansi(false)
        .with_file(true)
        .with_line_number(true)
        .with_writer(log_file)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    info!(path = %path.display(), "logging initialized");
    Ok(path)
}
