use std::sync::Mutex;

use crate::{
    domain::conversation_store::ConversationStore,
    usecases::{contracts::ConversationApi, with_store},
};

const READ_PERSIST_FAILED: &str = "READ_PERSIST_FAILED";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkReadOutput {
    /// Unread count before zeroing; `None` when the conversation is not tracked.
    pub previous_unread: Option<u32>,
    pub persisted: bool,
}

/// Persists a read marker server-side. Failures are logged, never returned.
pub async fn persist_read(api: &dyn ConversationApi, conversation_id: i64) -> bool {
    match api.mark_read(conversation_id).await {
        Ok(()) => true,
        Err(error) => {
            tracing::warn!(
                code = READ_PERSIST_FAILED,
                conversation_id,
                error = ?error,
                "failed to persist read marker"
            );
            false
        }
    }
}

/// Zeroes the local badge first, then persists the read marker.
pub async fn mark_conversation_read(
    store: &Mutex<ConversationStore>,
    api: &dyn ConversationApi,
    conversation_id: i64,
) -> MarkReadOutput {
    let previous_unread = with_store(store, |store| store.mark_read(conversation_id));
    let persisted = persist_read(api, conversation_id).await;

    MarkReadOutput {
        previous_unread,
        persisted,
    }
}
