//! Logging setup
//!
//! Logs go to stderr and to `~/.parley/logs/parley-debug.log`, with local
//! timestamps. `RUST_LOG` overrides the default `info` filter.

use std::path::{Path, PathBuf};
use tracing_subscriber::prelude::*;

/// Format timestamps using the system's local time via chrono
struct LocalTimer;

impl tracing_subscriber::fmt::time::FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"))
    }
}

/// Directory holding the debug log
pub fn log_dir() -> PathBuf {
    crate::config::get_config_dir().join("logs")
}

const LOG_FILE_NAME: &str = "parley-debug.log";

/// Open the debug log in `dir` for appending, creating the directory
fn open_log_file(dir: &Path) -> std::io::Result<std::fs::File> {
    std::fs::create_dir_all(dir)?;
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(LOG_FILE_NAME))
}

fn env_filter() -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
}

/// Install the global subscriber; later calls are ignored
///
/// Falls back to stderr only when the log file cannot be opened.
pub fn init() {
    let log_dir = log_dir();
    let log_path = log_dir.join(LOG_FILE_NAME);
    let log_file = open_log_file(&log_dir);

    // Prompts and transcripts share stdout, so console logs go to stderr
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_timer(LocalTimer);

    let (result, file_error) = match log_file {
        Ok(file) => {
            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(std::sync::Mutex::new(file))
                .with_timer(LocalTimer)
                .with_ansi(false);
            let result = tracing_subscriber::registry()
                .with(env_filter())
                .with(stderr_layer)
                .with(file_layer)
                .try_init();
            (result, None)
        }
        Err(e) => {
            let result = tracing_subscriber::registry()
                .with(env_filter())
                .with(stderr_layer)
                .try_init();
            (result, Some(e))
        }
    };

    if result.is_err() {
        tracing::debug!("Logging already initialised");
    }
    if let Some(e) = file_error {
        tracing::debug!(
            "Debug log {:?} unavailable, logging to stderr only: {}",
            log_path,
            e
        );
    }
}
