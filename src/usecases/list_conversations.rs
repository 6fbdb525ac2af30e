use std::sync::Mutex;

use crate::{
    domain::{conversation::ConversationSummary, conversation_store::ConversationStore},
    usecases::{
        contracts::{ApiSourceError, ConversationApi},
        with_store,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ListConversationsQuery {
    pub inbox_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListConversationsOutput {
    pub conversations: Vec<ConversationSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListConversationsError {
    Unauthorized,
    TemporarilyUnavailable,
    DataContractViolation,
}

pub async fn list_conversations(
    api: &dyn ConversationApi,
    query: ListConversationsQuery,
) -> Result<ListConversationsOutput, ListConversationsError> {
    let conversations = api
        .list_conversations(query.inbox_id)
        .await
        .map_err(map_source_error)?;

    Ok(ListConversationsOutput { conversations })
}

/// Fetches the list and installs it in the store. Returns the new list length.
pub async fn refresh_conversations(
    store: &Mutex<ConversationStore>,
    api: &dyn ConversationApi,
    query: ListConversationsQuery,
) -> Result<usize, ListConversationsError> {
    let output = list_conversations(api, query).await?;

    Ok(with_store(store, |store| {
        store.replace_conversations(output.conversations);
        store.conversations().len()
    }))
}

fn map_source_error(error: ApiSourceError) -> ListConversationsError {
    match error {
        ApiSourceError::Unauthorized => ListConversationsError::Unauthorized,
        ApiSourceError::Unavailable | ApiSourceError::NotFound => {
            ListConversationsError::TemporarilyUnavailable
        }
        ApiSourceError::InvalidData => ListConversationsError::DataContractViolation,
    }
}
