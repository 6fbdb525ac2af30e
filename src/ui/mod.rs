//! Plain-text views over the conversation store.

pub mod conversation_list;
pub mod timeline;
