//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber (stdout, optional log file)
//! - Reset the log file at startup
//!
//! # Design Decisions
//! - Filter from `RUST_LOG`, falling back to `DEFAULT_FILTER`
//! - The file layer writes through a non-blocking worker; the returned
//!   guard must live as long as the process logs

use std::io;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{Result, RunnerError};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "webapp_runner=info,tower_http=info";

/// Keeps the file writer flushing. Drop it last.
#[must_use]
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

/// Delete the log file so each run starts fresh.
///
/// Returns whether a file was removed. Callers log the error once logging
/// is up and carry on.
pub fn reset_log_file(path: &Path) -> io::Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Install the global subscriber.
///
/// A second call keeps the first subscriber.
pub fn init_logging(log_file: Option<&Path>) -> Result<LogGuard> {
    let (file_layer, guard) = match log_file {
        Some(path) => {
            let appender = file_appender(path)?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let installed = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into()))
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .try_init();
    if installed.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }

    Ok(LogGuard { _file: guard })
}

fn file_appender(path: &Path) -> Result<RollingFileAppender> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            RunnerError::invalid(format!("log file '{}' has no file name", path.display()))
        })?;
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(directory)
        .map_err(|e| RunnerError::invalid(format!("log file '{}': {}", path.display(), e)))
}
