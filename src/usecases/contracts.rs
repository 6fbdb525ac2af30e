use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    activity::Activity, conversation::ConversationSummary, message::Message,
    notification::Notification,
};

/// Errors reported by the REST collaborator, independent of HTTP details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiSourceError {
    Unauthorized,
    NotFound,
    Unavailable,
    InvalidData,
}

#[async_trait]
pub trait ConversationApi: Send + Sync {
    async fn list_conversations(
        &self,
        inbox_id: Option<i64>,
    ) -> Result<Vec<ConversationSummary>, ApiSourceError>;

    async fn list_messages(&self, conversation_id: i64) -> Result<Vec<Message>, ApiSourceError>;

    async fn list_activities(&self, conversation_id: i64)
        -> Result<Vec<Activity>, ApiSourceError>;

    async fn send_message(
        &self,
        conversation_id: i64,
        content: &str,
    ) -> Result<Message, ApiSourceError>;

    async fn mark_read(&self, conversation_id: i64) -> Result<(), ApiSourceError>;

    async fn delete_conversation(&self, conversation_id: i64) -> Result<(), ApiSourceError>;

    async fn clear_inbox(&self, inbox_id: i64) -> Result<(), ApiSourceError>;
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &Notification);

    /// User-visible notice for an operation that did not go through.
    fn notify_failure(&self, title: &str, detail: &str);
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
