use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::timestamp;

/// Direction/kind column of a message (`0=incoming, 1=outgoing, 2=activity, 3=template`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum MessageType {
    #[default]
    Incoming,
    Outgoing,
    Activity,
    Template,
    Other(u8),
}

impl From<u8> for MessageType {
    fn from(code: u8) -> Self {
        match code {
            0 => Self::Incoming,
            1 => Self::Outgoing,
            2 => Self::Activity,
            3 => Self::Template,
            other => Self::Other(other),
        }
    }
}

impl From<MessageType> for u8 {
    fn from(kind: MessageType) -> Self {
        match kind {
            MessageType::Incoming => 0,
            MessageType::Outgoing => 1,
            MessageType::Activity => 2,
            MessageType::Template => 3,
            MessageType::Other(code) => code,
        }
    }
}

impl MessageType {
    /// System-generated timeline markers never raise notifications.
    pub fn is_system(self) -> bool {
        matches!(self, Self::Activity)
    }
}

/// Delivery status of a message as reported by the messaging provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Pending,
    #[default]
    Sent,
    Delivered,
    Read,
    Failed,
}

impl MessageStatus {
    fn rank(self) -> Option<u8> {
        match self {
            Self::Pending => Some(0),
            Self::Sent => Some(1),
            Self::Delivered => Some(2),
            Self::Read => Some(3),
            Self::Failed => None,
        }
    }

    /// Whether moving from `self` to `next` is a forward transition.
    ///
    /// Statuses only advance (`pending → sent → delivered → read`), so a late
    /// `delivered` push cannot undo a `read`. `failed` is accepted from any
    /// state that has not been read yet.
    pub fn can_advance_to(self, next: MessageStatus) -> bool {
        match (self.rank(), next.rank()) {
            (Some(current), Some(next)) => next > current,
            (Some(current), None) => current < 3,
            (None, Some(_)) => true,
            (None, None) => false,
        }
    }
}

/// Type of media attached to a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageMedia {
    #[default]
    None,
    Image,
    Video,
    Audio,
    Document,
    Location,
    Contact,
    Sticker,
    Other,
}

impl MessageMedia {
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        match content_type.map(str::to_ascii_lowercase).as_deref() {
            None | Some("") | Some("text") => Self::None,
            Some("image") => Self::Image,
            Some("video") => Self::Video,
            Some("audio") | Some("voice") | Some("ptt") => Self::Audio,
            Some("document") | Some("file") => Self::Document,
            Some("location") => Self::Location,
            Some("contact") => Self::Contact,
            Some("sticker") => Self::Sticker,
            Some(_) => Self::Other,
        }
    }

    /// Returns a display label for the media type, or None if no media.
    pub fn display_label(&self) -> Option<&'static str> {
        match self {
            MessageMedia::None => None,
            MessageMedia::Image => Some("[Image]"),
            MessageMedia::Video => Some("[Video]"),
            MessageMedia::Audio => Some("[Audio]"),
            MessageMedia::Document => Some("[Document]"),
            MessageMedia::Location => Some("[Location]"),
            MessageMedia::Contact => Some("[Contact]"),
            MessageMedia::Sticker => Some("[Sticker]"),
            MessageMedia::Other => Some("[Media]"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub conversation_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inbox_id: Option<i64>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub message_type: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default)]
    pub status: MessageStatus,
    #[serde(default)]
    pub is_from_me: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<i64>,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    /// Correlation id assigned by the messaging provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whatsapp_message_id: Option<String>,
}

impl Message {
    pub fn media(&self) -> MessageMedia {
        MessageMedia::from_content_type(self.content_type.as_deref())
    }

    /// Returns the display content: media label + text, or just text if no media.
    pub fn display_content(&self) -> String {
        match (self.media().display_label(), self.content.is_empty()) {
            (Some(label), true) => label.to_owned(),
            (Some(label), false) => format!("{} {}", label, self.content),
            (None, _) => self.content.clone(),
        }
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.whatsapp_message_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    /// Two records describe the same logical message when their ids match or
    /// when both carry the same non-empty correlation id.
    pub fn is_same_logical_message(&self, other: &Message) -> bool {
        if self.id == other.id {
            return true;
        }

        matches!(
            (self.correlation_id(), other.correlation_id()),
            (Some(left), Some(right)) if left == right
        )
    }

    /// Inbound messages from someone else count towards the unread badge.
    pub fn counts_as_unread(&self) -> bool {
        !self.is_from_me && self.message_type != MessageType::Outgoing
    }

    pub fn is_notifiable(&self) -> bool {
        self.counts_as_unread() && !self.message_type.is_system()
    }
}

/// Partial message record carried by `message.updated`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MessageUpdate {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<MessageStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whatsapp_message_id: Option<String>,
}

impl MessageUpdate {
    pub fn correlation_id(&self) -> Option<&str> {
        self.whatsapp_message_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    pub fn targets(&self, message: &Message) -> bool {
        if message.id == self.id {
            return true;
        }

        matches!(
            (self.correlation_id(), message.correlation_id()),
            (Some(left), Some(right)) if left == right
        )
    }
}
