use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::timestamp;

const GROUP_IDENTIFIER_SUFFIX: &str = "@g.us";

/// Lifecycle state of a conversation.
///
/// The API sends it either as a lowercase name or as the numeric column value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "StatusRepr")]
pub enum ConversationStatus {
    #[default]
    Open,
    Resolved,
    Pending,
    Snoozed,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StatusRepr {
    Code(u8),
    Name(String),
}

impl TryFrom<StatusRepr> for ConversationStatus {
    type Error = String;

    fn try_from(value: StatusRepr) -> Result<Self, Self::Error> {
        match value {
            StatusRepr::Code(0) => Ok(Self::Open),
            StatusRepr::Code(1) => Ok(Self::Resolved),
            StatusRepr::Code(2) => Ok(Self::Pending),
            StatusRepr::Code(3) => Ok(Self::Snoozed),
            StatusRepr::Code(code) => Err(format!("unknown conversation status code {code}")),
            StatusRepr::Name(name) => match name.to_ascii_lowercase().as_str() {
                "open" => Ok(Self::Open),
                "resolved" => Ok(Self::Resolved),
                "pending" => Ok(Self::Pending),
                "snoozed" => Ok(Self::Snoozed),
                other => Err(format!("unknown conversation status {other:?}")),
            },
        }
    }
}

impl ConversationStatus {
    pub fn as_label(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Resolved => "resolved",
            Self::Pending => "pending",
            Self::Snoozed => "snoozed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Contact {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    /// Provider-side identifier, e.g. `5511999999999@s.whatsapp.net`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl Contact {
    pub fn is_group(&self) -> bool {
        self.identifier
            .as_deref()
            .is_some_and(|identifier| identifier.ends_with(GROUP_IDENTIFIER_SUFFIX))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_id: Option<i64>,
    #[serde(default)]
    pub status: ConversationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<Contact>,
    #[serde(default)]
    pub inbox_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message_content: Option<String>,
    #[serde(default, deserialize_with = "timestamp::deserialize_optional")]
    pub last_activity_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "timestamp::deserialize_optional")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub unread_count: u32,
}

impl ConversationSummary {
    /// Sort key of the conversation list: last activity, else creation time.
    pub fn effective_timestamp(&self) -> Option<DateTime<Utc>> {
        self.last_activity_at.or(self.created_at)
    }

    pub fn contact_name(&self) -> Option<&str> {
        self.contact
            .as_ref()
            .map(|contact| contact.name.as_str())
            .filter(|name| !name.trim().is_empty())
    }

    pub fn is_group(&self) -> bool {
        self.contact.as_ref().is_some_and(Contact::is_group)
    }
}
