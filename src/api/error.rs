use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid api base url {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),
}
