use std::{
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use crate::{
    domain::{
        activity::Activity,
        conversation::{Contact, ConversationStatus, ConversationSummary},
        message::{Message, MessageStatus, MessageType},
        notification::Notification,
    },
    usecases::contracts::{ApiSourceError, Clock, ConversationApi, Notifier},
};

static ENV_LOCK: Mutex<()> = Mutex::new(());

pub fn env_lock() -> MutexGuard<'static, ()> {
    ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

pub fn at(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + seconds, 0)
        .single()
        .expect("fixture timestamp should be valid")
}

pub fn conversation(id: i64, last_activity_at: Option<DateTime<Utc>>) -> ConversationSummary {
    ConversationSummary {
        id,
        display_id: Some(id),
        status: ConversationStatus::Open,
        contact: Some(Contact {
            id: id * 10,
            name: format!("Contact {id}"),
            ..Contact::default()
        }),
        inbox_id: 1,
        assignee_id: None,
        last_message_content: None,
        last_activity_at,
        created_at: None,
        unread_count: 0,
    }
}

/// Incoming message from a contact, plain text `hello`.
pub fn message(id: i64, conversation_id: i64) -> Message {
    Message {
        id,
        conversation_id,
        inbox_id: Some(1),
        content: "hello".to_owned(),
        message_type: MessageType::Incoming,
        content_type: None,
        status: MessageStatus::Sent,
        is_from_me: false,
        sender_id: None,
        created_at: at(0),
        media_url: None,
        file_name: None,
        file_size: None,
        mime_type: None,
        caption: None,
        whatsapp_message_id: None,
    }
}

pub fn activity(id: i64, created_at: DateTime<Utc>) -> Activity {
    Activity {
        id,
        activity_type: "status_changed".to_owned(),
        user: None,
        created_at,
        metadata: None,
    }
}

/// Scripted [`ConversationApi`] that records every call as `name:args`.
#[derive(Debug, Default)]
pub struct FakeApi {
    pub conversations: Mutex<Vec<ConversationSummary>>,
    pub messages: Mutex<Vec<Message>>,
    pub activities: Mutex<Vec<Activity>>,
    pub sent: Mutex<Option<Message>>,
    pub failure: Mutex<Option<ApiSourceError>>,
    calls: Mutex<Vec<String>>,
}

impl FakeApi {
    pub fn failing(error: ApiSourceError) -> Self {
        Self {
            failure: Mutex::new(Some(error)),
            ..Self::default()
        }
    }

    pub fn with_conversations(conversations: Vec<ConversationSummary>) -> Self {
        Self {
            conversations: Mutex::new(conversations),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn record(&self, call: String) -> Result<(), ApiSourceError> {
        self.calls.lock().expect("calls lock").push(call);
        match self.failure.lock().expect("failure lock").clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ConversationApi for FakeApi {
    async fn list_conversations(
        &self,
        inbox_id: Option<i64>,
    ) -> Result<Vec<ConversationSummary>, ApiSourceError> {
        self.record(format!("list_conversations:{inbox_id:?}"))?;
        Ok(self.conversations.lock().expect("lock").clone())
    }

    async fn list_messages(&self, conversation_id: i64) -> Result<Vec<Message>, ApiSourceError> {
        self.record(format!("list_messages:{conversation_id}"))?;
        Ok(self.messages.lock().expect("lock").clone())
    }

    async fn list_activities(
        &self,
        conversation_id: i64,
    ) -> Result<Vec<Activity>, ApiSourceError> {
        self.record(format!("list_activities:{conversation_id}"))?;
        Ok(self.activities.lock().expect("lock").clone())
    }

    async fn send_message(
        &self,
        conversation_id: i64,
        content: &str,
    ) -> Result<Message, ApiSourceError> {
        self.record(format!("send_message:{conversation_id}:{content}"))?;
        let scripted = self.sent.lock().expect("lock").clone();
        Ok(scripted.unwrap_or_else(|| Message {
            content: content.to_owned(),
            is_from_me: true,
            message_type: MessageType::Outgoing,
            ..message(1_000, conversation_id)
        }))
    }

    async fn mark_read(&self, conversation_id: i64) -> Result<(), ApiSourceError> {
        self.record(format!("mark_read:{conversation_id}"))
    }

    async fn delete_conversation(&self, conversation_id: i64) -> Result<(), ApiSourceError> {
        self.record(format!("delete_conversation:{conversation_id}"))
    }

    async fn clear_inbox(&self, inbox_id: i64) -> Result<(), ApiSourceError> {
        self.record(format!("clear_inbox:{inbox_id}"))
    }
}

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    pub notifications: Mutex<Vec<Notification>>,
    pub failures: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().expect("lock").clone()
    }

    pub fn failures(&self) -> Vec<(String, String)> {
        self.failures.lock().expect("lock").clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: &Notification) {
        self.notifications
            .lock()
            .expect("lock")
            .push(notification.clone());
    }

    fn notify_failure(&self, title: &str, detail: &str) {
        self.failures
            .lock()
            .expect("lock")
            .push((title.to_owned(), detail.to_owned()));
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Polls `condition` until it holds, failing the test after five seconds.
pub async fn eventually<F>(condition: F)
where
    F: Fn() -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition should hold eventually");
}
