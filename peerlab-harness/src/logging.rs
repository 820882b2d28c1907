//! Logging initialization for peerlab.
//!
//! Configures `tracing-subscriber` from the `[general]` section of
//! `HarnessConfig`. Console output is JSON or pretty; when a log file is
//! given, a second plain-text layer writes every event to it as well.

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use peerlab_core::config::GeneralConfig;

/// Initialize the global tracing subscriber.
///
/// Must be called once, before any tracing macros are used.
///
/// # Arguments
///
/// * `config` - General configuration (log_level, log_format)
/// * `log_file` - Optional file receiving a plain-text copy of every event;
///   parent directories are created
///
/// # Formats
///
/// * `"json"` - Machine-parseable JSON lines
/// * `"pretty"` - Human-readable colored output
pub fn init_tracing(config: &GeneralConfig, log_file: Option<&Path>) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let file_writer = log_file.map(open_log_file).transpose()?.map(Mutex::new);

    match config.log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .with(file_writer.map(|w| {
                    tracing_subscriber::fmt::layer().with_ansi(false).with_writer(w)
                }))
                .try_init()
                .map_err(|e| {
                    anyhow::anyhow!("failed to initialize JSON tracing subscriber: {}", e)
                })?;
        }
        "pretty" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .with(file_writer.map(|w| {
                    tracing_subscriber::fmt::layer().with_ansi(false).with_writer(w)
                }))
                .try_init()
                .map_err(|e| {
                    anyhow::anyhow!("failed to initialize pretty tracing subscriber: {}", e)
                })?;
        }
        _ => {
            return Err(anyhow::anyhow!(
                "unknown log format '{}', expected 'json' or 'pretty'",
                config.log_format
            ));
        }
    }

    Ok(())
}

fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create log directory {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))
}
