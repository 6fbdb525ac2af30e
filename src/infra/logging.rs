use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::infra::{config::LogConfig, error::AppError};

/// Installs the global subscriber. `RUST_LOG` wins over the configured level.
///
/// With `file` set, output goes through a non-blocking daily-rolling appender
/// and the returned guard must outlive the app so buffered lines get flushed.
pub fn init(config: &LogConfig) -> Result<Option<WorkerGuard>, AppError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let Some(path) = config.file.as_deref() else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .try_init()
            .map_err(AppError::LoggingInit)?;
        return Ok(None);
    };

    let (directory, file_name) = split_log_path(path)?;
    let appender = tracing_appender::rolling::daily(directory, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_ansi(false)
        .with_writer(writer)
        .try_init()
        .map_err(AppError::LoggingInit)?;

    Ok(Some(guard))
}

fn split_log_path(path: &Path) -> Result<(PathBuf, PathBuf), AppError> {
    let file_name = path
        .file_name()
        .map(PathBuf::from)
        .ok_or_else(|| AppError::LogFilePath {
            path: path.to_path_buf(),
        })?;

    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    Ok((directory, file_name))
}
