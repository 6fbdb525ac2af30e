use std::sync::Mutex;

use crate::{
    domain::conversation_store::ConversationStore,
    usecases::{
        contracts::{ApiSourceError, ConversationApi},
        with_store,
    },
};

const ACTIVITIES_LOAD_FAILED: &str = "ACTIVITIES_LOAD_FAILED";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenConversationOutput {
    pub messages_loaded: usize,
    pub activities_loaded: usize,
    /// False when another conversation was opened while the history loaded.
    pub applied: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenConversationError {
    Unauthorized,
    ConversationNotFound,
    TemporarilyUnavailable,
    DataContractViolation,
}

/// Makes `conversation_id` the active conversation and loads its history.
///
/// The local unread badge is cleared immediately. Persisting the read marker
/// is left to the caller.
pub async fn open_conversation(
    store: &Mutex<ConversationStore>,
    api: &dyn ConversationApi,
    conversation_id: i64,
) -> Result<OpenConversationOutput, OpenConversationError> {
    with_store(store, |store| store.select_conversation(conversation_id));

    let messages = api
        .list_messages(conversation_id)
        .await
        .map_err(map_source_error)?;
    let messages_loaded = messages.len();

    let activities = match api.list_activities(conversation_id).await {
        Ok(activities) => activities,
        Err(error) => {
            tracing::warn!(
                code = ACTIVITIES_LOAD_FAILED,
                conversation_id,
                error = ?error,
                "activity timeline unavailable; showing messages only"
            );
            Vec::new()
        }
    };
    let activities_loaded = activities.len();

    let applied = with_store(store, |store| {
        let applied = store.load_timeline(conversation_id, messages);
        store.load_activities(conversation_id, activities);
        applied
    });

    Ok(OpenConversationOutput {
        messages_loaded,
        activities_loaded,
        applied,
    })
}

fn map_source_error(error: ApiSourceError) -> OpenConversationError {
    match error {
        ApiSourceError::Unauthorized => OpenConversationError::Unauthorized,
        ApiSourceError::NotFound => OpenConversationError::ConversationNotFound,
        ApiSourceError::Unavailable => OpenConversationError::TemporarilyUnavailable,
        ApiSourceError::InvalidData => OpenConversationError::DataContractViolation,
    }
}
