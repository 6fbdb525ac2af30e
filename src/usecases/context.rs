use reqwest::Client;
use tracing_appender::non_blocking::WorkerGuard;

use crate::{infra::config::AppConfig, usecases::sync_session::SyncSession};

/// Everything a command needs once config and logging are set up.
#[derive(Debug)]
pub struct AppContext {
    pub config: AppConfig,
    pub session: SyncSession,
    /// Client for the long-lived push stream. It has no overall request
    /// timeout, unlike the REST client inside `session`.
    pub stream_client: Client,
    pub log_guard: Option<WorkerGuard>,
}

impl AppContext {
    pub fn new(config: AppConfig, session: SyncSession, stream_client: Client) -> Self {
        Self {
            config,
            session,
            stream_client,
            log_guard: None,
        }
    }
}
