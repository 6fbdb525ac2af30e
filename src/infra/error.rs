use std::path::PathBuf;

use thiserror::Error;

use crate::api::ApiError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to read config file at {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file at {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to initialize logging: {0}")]
    LoggingInit(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
    #[error("invalid log file path {path}")]
    LogFilePath { path: PathBuf },
    #[error("failed to set up http client: {0}")]
    HttpClient(#[from] ApiError),
}
