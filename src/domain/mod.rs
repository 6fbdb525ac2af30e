//! Domain layer: core entities and reconciliation rules.

pub mod activity;
pub mod conversation;
pub mod conversation_store;
pub mod events;
pub mod message;
pub mod notification;
pub mod status;
pub mod timeline;
pub mod timestamp;
