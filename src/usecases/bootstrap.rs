use std::{path::Path, sync::Arc, time::Duration};

use reqwest::Client;

use crate::{
    api::{ApiError, HttpConversationApi},
    infra::{
        self, config::FileConfigAdapter, contracts::ConfigAdapter, error::AppError,
        notifier::NotificationRouter,
    },
    usecases::{context::AppContext, contracts::SystemClock, sync_session::SyncSession},
};

const STREAM_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub fn bootstrap(config_path: Option<&Path>) -> anyhow::Result<AppContext> {
    let mut context = build_context(config_path)?;
    context.log_guard = infra::logging::init(&context.config.logging)?;

    tracing::debug!(
        config = ?context.config,
        "bootstrap complete"
    );

    Ok(context)
}

fn build_context(config_path: Option<&Path>) -> anyhow::Result<AppContext> {
    let config_adapter = FileConfigAdapter::new(config_path);
    let config = config_adapter.load()?;

    let api = HttpConversationApi::new(&config.api).map_err(AppError::HttpClient)?;
    let notifier = NotificationRouter::from_config(&config.notifications);
    let session = SyncSession::new(Arc::new(api), Arc::new(notifier), Arc::new(SystemClock));
    session.set_notifications_enabled(config.notifications.enabled);

    let stream_client = Client::builder()
        .connect_timeout(STREAM_CONNECT_TIMEOUT)
        .build()
        .map_err(|error| AppError::HttpClient(ApiError::Client(error)))?;

    Ok(AppContext::new(config, session, stream_client))
}
