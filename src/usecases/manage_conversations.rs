use std::sync::Mutex;

use crate::{
    domain::conversation_store::{ConversationStore, RemovalOutcome},
    usecases::{
        contracts::{ApiSourceError, ConversationApi, Notifier},
        with_store,
    },
};

const DELETE_FAILED_TITLE: &str = "Could not delete conversation";
const CLEAR_FAILED_TITLE: &str = "Could not clear inbox";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManageConversationError {
    Unauthorized,
    NotFound,
    TemporarilyUnavailable,
    DataContractViolation,
}

impl ManageConversationError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Unauthorized => "You are not allowed to do that.",
            Self::NotFound => "It no longer exists on the server.",
            Self::TemporarilyUnavailable => "The server is unavailable. Try again later.",
            Self::DataContractViolation => "The server sent an unexpected answer.",
        }
    }
}

/// Deletes a conversation server-side, then drops it locally.
///
/// Local state is only touched once the server confirms. Failures are shown
/// to the user through `notifier` and returned.
pub async fn delete_conversation(
    store: &Mutex<ConversationStore>,
    api: &dyn ConversationApi,
    notifier: &dyn Notifier,
    conversation_id: i64,
) -> Result<RemovalOutcome, ManageConversationError> {
    match api.delete_conversation(conversation_id).await {
        Ok(()) => Ok(with_store(store, |store| {
            store.remove_conversation(conversation_id)
        })),
        Err(error) => Err(report_failure(notifier, DELETE_FAILED_TITLE, error)),
    }
}

/// Clears every conversation of an inbox server-side, then drops them locally.
pub async fn clear_inbox(
    store: &Mutex<ConversationStore>,
    api: &dyn ConversationApi,
    notifier: &dyn Notifier,
    inbox_id: i64,
) -> Result<RemovalOutcome, ManageConversationError> {
    match api.clear_inbox(inbox_id).await {
        Ok(()) => Ok(with_store(store, |store| {
            store.remove_conversations_by_inbox(inbox_id)
        })),
        Err(error) => Err(report_failure(notifier, CLEAR_FAILED_TITLE, error)),
    }
}

fn report_failure(
    notifier: &dyn Notifier,
    title: &str,
    error: ApiSourceError,
) -> ManageConversationError {
    let error = map_source_error(error);
    notifier.notify_failure(title, error.user_message());
    error
}

fn map_source_error(error: ApiSourceError) -> ManageConversationError {
    match error {
        ApiSourceError::Unauthorized => ManageConversationError::Unauthorized,
        ApiSourceError::NotFound => ManageConversationError::NotFound,
        ApiSourceError::Unavailable => ManageConversationError::TemporarilyUnavailable,
        ApiSourceError::InvalidData => ManageConversationError::DataContractViolation,
    }
}
