use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::error::{DaError, Result};

pub const LOG_ENV: &str = "DA_LOG";

fn filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default))
}

/// Controller diagnostics go to stderr; stdout is reserved for command output.
pub fn init_controller() {
    let _ = tracing_subscriber::registry()
        .with(filter("warn"))
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
}

/// Workers run detached, so they log into their own file.
///
/// The returned guard flushes buffered lines when dropped and must be held
/// for the worker's lifetime.
pub fn init_worker(log_path: &Path) -> Result<WorkerGuard> {
    let dir = log_path.parent().ok_or(DaError::NoStateDir)?;
    let file_name = log_path.file_name().ok_or(DaError::NoStateDir)?;
    std::fs::create_dir_all(dir)?;

    let file_appender = tracing_appender::rolling::never(dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let _ = tracing_subscriber::registry()
        .with(filter("info"))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .try_init();

    Ok(guard)
}
