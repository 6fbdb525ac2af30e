use super::message::{Message, MessageStatus};

/// Locally assigned handle for a message that has not been confirmed by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalMessageId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Server-confirmed record.
    Confirmed,
    /// Optimistic record waiting for the send request to complete.
    Pending(LocalMessageId),
    /// Optimistic record whose send request failed.
    Failed(LocalMessageId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineEntry {
    pub message: Message,
    pub delivery: Delivery,
}

impl TimelineEntry {
    pub fn confirmed(message: Message) -> Self {
        Self {
            message,
            delivery: Delivery::Confirmed,
        }
    }

    pub fn pending(local_id: LocalMessageId, mut message: Message) -> Self {
        message.status = MessageStatus::Pending;
        Self {
            message,
            delivery: Delivery::Pending(local_id),
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self.delivery, Delivery::Confirmed)
    }

    pub fn local_id(&self) -> Option<LocalMessageId> {
        match self.delivery {
            Delivery::Confirmed => None,
            Delivery::Pending(local_id) | Delivery::Failed(local_id) => Some(local_id),
        }
    }

    /// Optimistic records have no server identity yet, so only confirmed
    /// entries take part in id/correlation matching.
    pub fn matches(&self, message: &Message) -> bool {
        self.is_confirmed() && self.message.is_same_logical_message(message)
    }
}
