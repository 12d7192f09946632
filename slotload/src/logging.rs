//! Logging setup for applications embedding the loader.
//!
//! The library itself only emits `tracing` events. Hosts that do not bring
//! their own subscriber can call [`init_logging`], which:
//! - writes to `<dir>/<file>` (cleared at session start) through a
//!   non-blocking writer
//! - also prints to stdout
//! - honours `RUST_LOG`, defaulting to `info`

use std::fs;
use std::io;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Keeps the background file writer alive. Dropping it flushes the file.
#[must_use = "logging to the file stops when the guard is dropped"]
pub struct LoggingGuard {
    _writer: WorkerGuard,
}

/// Installs the global subscriber.
///
/// # Errors
///
/// Fails if the log directory cannot be created, the log file cannot be
/// cleared, or a global subscriber is already installed.
pub fn init_logging(log_dir: impl AsRef<Path>, log_file: &str) -> io::Result<LoggingGuard> {
    let log_dir = log_dir.as_ref();
    let log_path = prepare_log_file(log_dir, log_file)?;

    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(log_dir, log_file));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_thread_names(true)
        .with_target(true);

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stdout)
        .with_ansi(true)
        .with_thread_names(true);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .try_init()
        .map_err(io::Error::other)?;

    tracing::info!(path = %log_path.display(), "Logging initialized");

    Ok(LoggingGuard { _writer: guard })
}

/// Creates the directory and truncates the log file.
fn prepare_log_file(log_dir: &Path, log_file: &str) -> io::Result<std::path::PathBuf> {
    fs::create_dir_all(log_dir)?;
    let log_path = log_dir.join(log_file);
    fs::write(&log_path, "")?;
    Ok(log_path)
}

pub const DEFAULT_LOG_DIR: &str = "logs";
pub const DEFAULT_LOG_FILE: &str = "slotload.log";

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "info";
