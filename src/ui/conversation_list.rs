//! Plain-text rendering of the conversation list.
//!
//! One row per conversation: timestamp, contact name, preview and an unread
//! badge, in the order the store keeps them.

use chrono::{DateTime, NaiveDate, Utc};

use crate::domain::conversation::ConversationSummary;

const EMPTY_TIMESTAMP: &str = "     ";
const NO_MESSAGES: &str = "No messages yet";
const UNKNOWN_CONTACT: &str = "New contact";
const PREVIEW_MAX_CHARS: usize = 48;

pub fn render_conversation_list(
    conversations: &[ConversationSummary],
    total_unread: u64,
    today: NaiveDate,
) -> String {
    if conversations.is_empty() {
        return "No conversations".to_owned();
    }

    let mut lines = Vec::with_capacity(conversations.len() + 1);
    lines.push(format!(
        "Conversations: {} ({} unread)",
        conversations.len(),
        total_unread
    ));
    lines.extend(
        conversations
            .iter()
            .map(|conversation| conversation_row(conversation, today)),
    );

    lines.join("\n")
}

pub fn conversation_row(conversation: &ConversationSummary, today: NaiveDate) -> String {
    let timestamp = conversation
        .effective_timestamp()
        .map(|at| format_row_timestamp(at, today))
        .unwrap_or_else(|| EMPTY_TIMESTAMP.to_owned());

    let name = conversation.contact_name().unwrap_or(UNKNOWN_CONTACT);
    let group_marker = if conversation.is_group() { " (group)" } else { "" };

    let preview = conversation
        .last_message_content
        .as_deref()
        .map(normalize_preview)
        .filter(|text| !text.is_empty())
        .map(|text| truncate(&text, PREVIEW_MAX_CHARS))
        .unwrap_or_else(|| NO_MESSAGES.to_owned());

    let unread_badge = if conversation.unread_count > 0 {
        format!(" [{}]", conversation.unread_count)
    } else {
        String::new()
    };

    format!(
        "{timestamp:>5} | #{id} {name}{group_marker} [{status}] {preview}{unread_badge}",
        id = conversation.id,
        status = conversation.status.as_label(),
    )
}

/// `HH:MM` for today, `DD.MM` otherwise.
fn format_row_timestamp(at: DateTime<Utc>, today: NaiveDate) -> String {
    if at.date_naive() == today {
        at.format("%H:%M").to_string()
    } else {
        at.format("%d.%m").to_string()
    }
}

fn normalize_preview(preview: &str) -> String {
    preview.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_owned();
    }

    let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{kept}...")
}
