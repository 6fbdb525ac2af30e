//! Use case for sending a text message to a conversation.
//!
//! Sending is optimistic: a pending timeline entry is recorded before the
//! request goes out and is resolved once the server answers.

use std::sync::Mutex;

use crate::{
    domain::{
        conversation_store::{ConfirmOutcome, ConversationStore},
        timeline::LocalMessageId,
    },
    usecases::{
        contracts::{ApiSourceError, Clock, ConversationApi},
        with_store,
    },
};

/// Command to send a message to a specific conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendMessageCommand {
    pub conversation_id: i64,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendMessageOutput {
    pub local_id: LocalMessageId,
    pub outcome: ConfirmOutcome,
}

/// Domain-level errors for the send operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendMessageError {
    /// Message text is empty after trimming whitespace.
    EmptyMessage,
    Unauthorized,
    ConversationNotFound,
    TemporarilyUnavailable,
    /// The server accepted the message but its answer did not decode.
    DataContractViolation,
}

impl SendMessageError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::EmptyMessage => "The message is empty.",
            Self::Unauthorized => "You are not allowed to write here.",
            Self::ConversationNotFound => "The conversation no longer exists.",
            Self::TemporarilyUnavailable => "The server is unavailable. Try again later.",
            Self::DataContractViolation => "The server sent an unexpected answer.",
        }
    }
}

/// Sends a message, keeping the timeline entry visible in every phase.
///
/// On failure the pending entry is marked failed and the error is returned.
pub async fn send_message(
    store: &Mutex<ConversationStore>,
    api: &dyn ConversationApi,
    clock: &dyn Clock,
    command: SendMessageCommand,
) -> Result<SendMessageOutput, SendMessageError> {
    let text = command.text.trim();
    if text.is_empty() {
        return Err(SendMessageError::EmptyMessage);
    }

    let now = clock.now();
    let local_id = with_store(store, |store| {
        store.begin_send(command.conversation_id, text, now)
    });

    match api.send_message(command.conversation_id, text).await {
        Ok(confirmed) => {
            let outcome = with_store(store, |store| store.confirm_send(local_id, confirmed));
            Ok(SendMessageOutput { local_id, outcome })
        }
        Err(error) => {
            with_store(store, |store| store.fail_send(local_id));
            Err(map_source_error(error))
        }
    }
}

fn map_source_error(error: ApiSourceError) -> SendMessageError {
    match error {
        ApiSourceError::Unauthorized => SendMessageError::Unauthorized,
        ApiSourceError::NotFound => SendMessageError::ConversationNotFound,
        ApiSourceError::Unavailable => SendMessageError::TemporarilyUnavailable,
        ApiSourceError::InvalidData => SendMessageError::DataContractViolation,
    }
}
