use serde::Deserialize;
use thiserror::Error;

use crate::domain::events::{EventType, RealtimeEvent};

const HEARTBEAT: &str = "heartbeat";
const CONNECTION_ESTABLISHED: &str = "connection.established";

/// Transport-level frames that never reach the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlFrame {
    Heartbeat,
    ConnectionEstablished,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Control(ControlFrame),
    Event(RealtimeEvent),
    /// A well-formed frame whose type this client does not handle.
    Unknown(String),
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame is not valid JSON: {0}")]
    Json(#[source] serde_json::Error),
    #[error("payload of {event_type} does not decode: {source}")]
    Payload {
        event_type: EventType,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: serde_json::Value,
}

/// Decodes one SSE `data` field (`{"type": ..., "payload": ...}`).
///
/// Blank data is treated as a keep-alive.
pub fn decode_frame(data: &str) -> Result<Frame, FrameError> {
    if data.trim().is_empty() {
        return Ok(Frame::Control(ControlFrame::Heartbeat));
    }

    let raw: RawFrame = serde_json::from_str(data).map_err(FrameError::Json)?;

    match raw.kind.as_str() {
        HEARTBEAT => return Ok(Frame::Control(ControlFrame::Heartbeat)),
        CONNECTION_ESTABLISHED => return Ok(Frame::Control(ControlFrame::ConnectionEstablished)),
        _ => {}
    }

    let Ok(event_type) = raw.kind.parse::<EventType>() else {
        return Ok(Frame::Unknown(raw.kind));
    };

    RealtimeEvent::from_parts(event_type, raw.payload)
        .map(Frame::Event)
        .map_err(|source| FrameError::Payload { event_type, source })
}
