//! Use case layer: application workflows and orchestration.

use std::sync::{Mutex, PoisonError};

use crate::domain::conversation_store::ConversationStore;

pub mod bootstrap;
pub mod context;
pub mod contracts;
pub mod list_conversations;
pub mod manage_conversations;
pub mod mark_read;
pub mod open_conversation;
pub mod send_message;
pub mod sync_session;

/// Runs `f` with the store locked. A poisoned lock is recovered since every
/// store mutation leaves the store consistent before it can panic.
pub(crate) fn with_store<R>(
    store: &Mutex<ConversationStore>,
    f: impl FnOnce(&mut ConversationStore) -> R,
) -> R {
    let mut guard = store.lock().unwrap_or_else(PoisonError::into_inner);
    f(&mut guard)
}
