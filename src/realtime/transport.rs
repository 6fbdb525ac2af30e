//! Persistent SSE connection to the push endpoint.
//!
//! The transport owns one task per started connection. It decodes frames,
//! filters control frames and hands typed events to a callback. On failure it
//! reconnects with exponential backoff until the attempt cap is reached.

use std::time::Duration;

use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::{header::ACCEPT, Client, Url};
use thiserror::Error;
use tokio::{runtime::Handle, sync::watch};

use crate::{
    domain::events::{ConnectivityStatus, RealtimeEvent},
    infra::{
        config::{ApiConfig, RealtimeConfig},
        secrets::{redact_text, redact_url},
    },
    realtime::{
        connectivity::ConnectivityTracker,
        frame::{decode_frame, Frame},
    },
};

const REALTIME_PATH: &str = "api/v1/realtime";
const EVENT_STREAM: &str = "text/event-stream";

const REALTIME_STARTED: &str = "REALTIME_STARTED";
const REALTIME_CONNECTED: &str = "REALTIME_CONNECTED";
const REALTIME_CONNECTION_LOST: &str = "REALTIME_CONNECTION_LOST";
const REALTIME_RECONNECT_SCHEDULED: &str = "REALTIME_RECONNECT_SCHEDULED";
const REALTIME_GAVE_UP: &str = "REALTIME_GAVE_UP";
const REALTIME_FRAME_MALFORMED: &str = "REALTIME_FRAME_MALFORMED";
const REALTIME_STOPPED: &str = "REALTIME_STOPPED";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportSettings {
    pub base_url: String,
    pub token: String,
    pub conversation_id: Option<i64>,
    pub max_reconnect_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl TransportSettings {
    pub fn from_config(api: &ApiConfig, realtime: &RealtimeConfig) -> Self {
        Self {
            base_url: api.base_url.clone(),
            token: api.token.clone(),
            conversation_id: realtime.conversation_id,
            max_reconnect_attempts: realtime.max_reconnect_attempts,
            base_delay: Duration::from_millis(realtime.base_delay_ms),
            max_delay: Duration::from_millis(realtime.max_delay_ms),
        }
    }

    /// `{base_url}/api/v1/realtime?token=..[&conversation_id=..]`
    pub fn endpoint(&self) -> Result<Url, TransportError> {
        let raw = format!("{}/{REALTIME_PATH}", self.base_url.trim_end_matches('/'));
        let mut url = Url::parse(&raw).map_err(|error| TransportError::InvalidUrl {
            url: raw.clone(),
            reason: error.to_string(),
        })?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("token", &self.token);
            if let Some(conversation_id) = self.conversation_id {
                query.append_pair("conversation_id", &conversation_id.to_string());
            }
        }

        Ok(url)
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid realtime url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("connection failed: {0}")]
    Connect(#[source] reqwest::Error),
    #[error("server answered with HTTP {0}")]
    Status(u16),
    #[error("stream read failed: {0}")]
    Stream(String),
    #[error("server closed the stream")]
    Ended,
}

impl TransportError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidUrl { .. } => "REALTIME_INVALID_URL",
            Self::Connect(_) => "REALTIME_CONNECT_FAILED",
            Self::Status(_) => "REALTIME_HTTP_STATUS",
            Self::Stream(_) => "REALTIME_STREAM_FAILED",
            Self::Ended => "REALTIME_STREAM_ENDED",
        }
    }
}

/// `min(base * 2^attempt, max)`
pub fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt)).min(max)
}

#[derive(Debug)]
pub struct RealtimeTransport {
    stop_tx: Option<watch::Sender<bool>>,
}

impl RealtimeTransport {
    /// Spawns the connection task on `runtime` and returns its handle.
    pub fn start<F>(
        runtime: &Handle,
        client: Client,
        settings: TransportSettings,
        tracker: ConnectivityTracker,
        on_event: F,
    ) -> Result<Self, TransportError>
    where
        F: Fn(RealtimeEvent) + Send + Sync + 'static,
    {
        let url = settings.endpoint()?;
        let (stop_tx, stop_rx) = watch::channel(false);

        tracing::info!(
            code = REALTIME_STARTED,
            url = %redact_url(&url),
            max_attempts = settings.max_reconnect_attempts,
            "realtime transport started"
        );

        runtime.spawn(run_transport(
            client, url, settings, tracker, on_event, stop_rx,
        ));

        Ok(Self {
            stop_tx: Some(stop_tx),
        })
    }

    /// Stops the connection task. Idempotent; no callback runs afterwards.
    pub fn close(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(true);
        }
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn is_closed(&self) -> bool {
        self.stop_tx.is_none()
    }
}

impl Drop for RealtimeTransport {
    fn drop(&mut self) {
        self.close();
    }
}

async fn run_transport<F>(
    client: Client,
    url: Url,
    settings: TransportSettings,
    tracker: ConnectivityTracker,
    on_event: F,
    mut stop_rx: watch::Receiver<bool>,
) where
    F: Fn(RealtimeEvent) + Send + Sync + 'static,
{
    let mut attempt: u32 = 0;
    tracker.on_status(ConnectivityStatus::Connecting);

    loop {
        let gate = stop_rx.clone();
        let error = tokio::select! {
            _ = wait_for_stop(&mut stop_rx) => break,
            error = run_connection(&client, &url, &tracker, &on_event, &mut attempt, gate) => error,
        };

        tracker.on_error(error.code());
        tracing::warn!(
            code = REALTIME_CONNECTION_LOST,
            reason = error.code(),
            error = %redact_text(&error.to_string()),
            attempt,
            "realtime connection lost"
        );

        if attempt >= settings.max_reconnect_attempts {
            tracker.on_status(ConnectivityStatus::GaveUp);
            tracing::warn!(
                code = REALTIME_GAVE_UP,
                attempts = attempt,
                "realtime transport gave up reconnecting"
            );
            return;
        }

        let delay = backoff_delay(attempt, settings.base_delay, settings.max_delay);
        attempt += 1;
        let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        tracker.on_status(ConnectivityStatus::Reconnecting { attempt, delay_ms });
        tracing::info!(
            code = REALTIME_RECONNECT_SCHEDULED,
            attempt,
            delay_ms,
            "realtime reconnect scheduled"
        );

        tokio::select! {
            _ = wait_for_stop(&mut stop_rx) => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    tracker.on_status(ConnectivityStatus::Closed);
    tracing::info!(code = REALTIME_STOPPED, "realtime transport stopped");
}

/// Runs one connection until it fails or ends and returns the reason.
async fn run_connection<F>(
    client: &Client,
    url: &Url,
    tracker: &ConnectivityTracker,
    on_event: &F,
    attempt: &mut u32,
    stop_rx: watch::Receiver<bool>,
) -> TransportError
where
    F: Fn(RealtimeEvent),
{
    let response = match client
        .get(url.clone())
        .header(ACCEPT, EVENT_STREAM)
        .send()
        .await
    {
        Ok(response) => response,
        Err(error) => return TransportError::Connect(error.without_url()),
    };

    let status = response.status();
    if !status.is_success() {
        return TransportError::Status(status.as_u16());
    }

    *attempt = 0;
    tracker.on_status(ConnectivityStatus::Connected);
    tracing::info!(
        code = REALTIME_CONNECTED,
        url = %redact_url(url),
        "realtime connection open"
    );

    let mut events = Box::pin(response.bytes_stream().eventsource());
    while let Some(item) = events.next().await {
        let event = match item {
            Ok(event) => event,
            Err(error) => return TransportError::Stream(redact_text(&error.to_string())),
        };

        match decode_frame(&event.data) {
            Ok(Frame::Event(realtime_event)) => {
                if *stop_rx.borrow() {
                    continue;
                }
                tracing::debug!(
                    event_type = %realtime_event.event_type(),
                    "realtime event received"
                );
                on_event(realtime_event);
            }
            Ok(Frame::Control(control)) => {
                tracing::trace!(frame = ?control, "realtime control frame");
            }
            Ok(Frame::Unknown(kind)) => {
                tracing::debug!(event_type = %kind, "skipping unknown realtime event type");
            }
            Err(error) => {
                tracing::warn!(
                    code = REALTIME_FRAME_MALFORMED,
                    error = %error,
                    "skipping malformed realtime frame"
                );
            }
        }
    }

    TransportError::Ended
}

async fn wait_for_stop(stop_rx: &mut watch::Receiver<bool>) {
    loop {
        if *stop_rx.borrow() {
            return;
        }
        if stop_rx.changed().await.is_err() {
            return;
        }
    }
}
