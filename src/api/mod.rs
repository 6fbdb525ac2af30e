pub mod client;
pub mod error;

pub use client::HttpConversationApi;
pub use error::ApiError;
