use super::{conversation::ConversationSummary, message::Message};

const UNKNOWN_SENDER: &str = "New contact";
const MEDIA_ONLY_BODY: &str = "Media received";

/// A "new message" alert, independent of how it is shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub conversation_id: i64,
    pub title: String,
    pub body: String,
}

impl Notification {
    pub fn for_message(conversation: Option<&ConversationSummary>, message: &Message) -> Self {
        let sender = conversation
            .and_then(ConversationSummary::contact_name)
            .unwrap_or(UNKNOWN_SENDER);

        let body = if message.content.trim().is_empty() {
            MEDIA_ONLY_BODY.to_owned()
        } else {
            message.content.clone()
        };

        Self {
            conversation_id: message.conversation_id,
            title: format!("New message from {sender}"),
            body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{conversation, message};

    #[test]
    fn title_uses_contact_name() {
        let notification = Notification::for_message(Some(&conversation(3, None)), &message(1, 3));

        assert_eq!(notification.title, "New message from Contact 3");
        assert_eq!(notification.body, "hello");
        assert_eq!(notification.conversation_id, 3);
    }

    #[test]
    fn unknown_conversation_falls_back_to_new_contact() {
        let notification = Notification::for_message(None, &message(1, 3));

        assert_eq!(notification.title, "New message from New contact");
    }

    #[test]
    fn empty_media_message_has_media_body() {
        let photo = Message {
            content: String::new(),
            content_type: Some("image".to_owned()),
            ..message(1, 3)
        };

        let notification = Notification::for_message(None, &photo);

        assert_eq!(notification.body, "Media received");
    }
}
