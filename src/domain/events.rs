use std::{fmt, str::FromStr};

use serde::Deserialize;

use super::{
    conversation::ConversationSummary,
    message::{Message, MessageUpdate},
};

/// Dispatchable push event types.
///
/// Transport-level frames (`heartbeat`, `connection.established`) are not
/// part of this set; the transport filters them before dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventType {
    MessageNew,
    MessageUpdated,
    ConversationNew,
    ConversationUpdated,
    ConversationDeleted,
    InboxCleared,
}

impl EventType {
    pub const ALL: [EventType; 6] = [
        EventType::MessageNew,
        EventType::MessageUpdated,
        EventType::ConversationNew,
        EventType::ConversationUpdated,
        EventType::ConversationDeleted,
        EventType::InboxCleared,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::MessageNew => "message.new",
            Self::MessageUpdated => "message.updated",
            Self::ConversationNew => "conversation.new",
            Self::ConversationUpdated => "conversation.updated",
            Self::ConversationDeleted => "conversation.deleted",
            Self::InboxCleared => "inbox.cleared",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEventType(pub String);

impl fmt::Display for UnknownEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown event type {:?}", self.0)
    }
}

impl std::error::Error for UnknownEventType {}

impl FromStr for EventType {
    type Err = UnknownEventType;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|event_type| event_type.as_str() == value)
            .ok_or_else(|| UnknownEventType(value.to_owned()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ConversationDeleted {
    pub id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct InboxCleared {
    pub inbox_id: i64,
    #[serde(default)]
    pub count: u64,
}

/// A typed push event, one variant per [`EventType`].
#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeEvent {
    MessageNew(Message),
    MessageUpdated(MessageUpdate),
    ConversationNew(ConversationSummary),
    ConversationUpdated(ConversationSummary),
    ConversationDeleted(ConversationDeleted),
    InboxCleared(InboxCleared),
}

impl RealtimeEvent {
    pub fn event_type(&self) -> EventType {
        match self {
            Self::MessageNew(_) => EventType::MessageNew,
            Self::MessageUpdated(_) => EventType::MessageUpdated,
            Self::ConversationNew(_) => EventType::ConversationNew,
            Self::ConversationUpdated(_) => EventType::ConversationUpdated,
            Self::ConversationDeleted(_) => EventType::ConversationDeleted,
            Self::InboxCleared(_) => EventType::InboxCleared,
        }
    }

    /// Builds the typed envelope from an event type and its raw JSON payload.
    pub fn from_parts(
        event_type: EventType,
        payload: serde_json::Value,
    ) -> Result<Self, serde_json::Error> {
        Ok(match event_type {
            EventType::MessageNew => Self::MessageNew(serde_json::from_value(payload)?),
            EventType::MessageUpdated => Self::MessageUpdated(serde_json::from_value(payload)?),
            EventType::ConversationNew => Self::ConversationNew(serde_json::from_value(payload)?),
            EventType::ConversationUpdated => {
                Self::ConversationUpdated(serde_json::from_value(payload)?)
            }
            EventType::ConversationDeleted => {
                Self::ConversationDeleted(serde_json::from_value(payload)?)
            }
            EventType::InboxCleared => Self::InboxCleared(serde_json::from_value(payload)?),
        })
    }
}

/// State of the push connection as seen by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityStatus {
    Connecting,
    Connected,
    Reconnecting { attempt: u32, delay_ms: u64 },
    GaveUp,
    Closed,
}
