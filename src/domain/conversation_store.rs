//! In-memory reconciliation state: the conversation list, the active
//! conversation and its timeline.
//!
//! Every mutation is synchronous and takes the current time as an argument
//! where it needs one, so the store itself never reads a clock. Side effects
//! (notifications, refetches, read persistence) are reported through outcome
//! values and executed by the caller.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::{
    activity::Activity,
    conversation::ConversationSummary,
    message::{Message, MessageStatus, MessageType, MessageUpdate},
    timeline::{Delivery, LocalMessageId, TimelineEntry},
};

const OUTGOING_CONTENT_TYPE: &str = "text";

/// Confirmed entries kept per conversation that is not the active one. They
/// only serve duplicate detection until the conversation is opened.
const INACTIVE_TIMELINE_CAP: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AddMessageOutcome {
    /// False when the message duplicated an existing timeline entry.
    pub inserted: bool,
    /// Whether the message's conversation is tracked in the list.
    pub conversation_known: bool,
    /// Whether the message belongs to the active conversation.
    pub is_active: bool,
    pub unread_incremented: bool,
    /// Exactly one notification is due for this message.
    pub notify: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RemovalOutcome {
    pub removed: usize,
    pub cleared_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmOutcome {
    /// The optimistic entry was replaced by the server record.
    Replaced,
    /// The push echo arrived first and already took the optimistic entry's place.
    CollapsedIntoEcho,
    /// No optimistic entry was found; the server record was added if new.
    Inserted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConversationStore {
    conversations: Vec<ConversationSummary>,
    active_conversation_id: Option<i64>,
    timeline: Vec<TimelineEntry>,
    activities: Vec<Activity>,
    notifications_enabled: bool,
    next_local_id: u64,
    /// Optimistic sends whose push echo replaced the pending entry before the
    /// send request completed, keyed to the server id of the echo.
    echoed: HashMap<LocalMessageId, i64>,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self {
            conversations: Vec::new(),
            active_conversation_id: None,
            timeline: Vec::new(),
            activities: Vec::new(),
            notifications_enabled: true,
            next_local_id: 1,
            echoed: HashMap::new(),
        }
    }
}

impl ConversationStore {
    pub fn conversations(&self) -> &[ConversationSummary] {
        &self.conversations
    }

    pub fn conversation(&self, id: i64) -> Option<&ConversationSummary> {
        self.conversations.iter().find(|conversation| conversation.id == id)
    }

    pub fn active_conversation_id(&self) -> Option<i64> {
        self.active_conversation_id
    }

    pub fn active_conversation(&self) -> Option<&ConversationSummary> {
        self.active_conversation_id.and_then(|id| self.conversation(id))
    }

    pub fn messages(&self) -> &[TimelineEntry] {
        &self.timeline
    }

    /// Timeline entries of the active conversation, oldest first.
    pub fn active_messages(&self) -> impl Iterator<Item = &TimelineEntry> {
        let active = self.active_conversation_id;
        self.timeline
            .iter()
            .filter(move |entry| Some(entry.message.conversation_id) == active)
    }

    pub fn activities(&self) -> &[Activity] {
        &self.activities
    }

    pub fn total_unread(&self) -> u64 {
        self.conversations
            .iter()
            .map(|conversation| u64::from(conversation.unread_count))
            .sum()
    }

    pub fn notifications_enabled(&self) -> bool {
        self.notifications_enabled
    }

    pub fn set_notifications_enabled(&mut self, enabled: bool) {
        self.notifications_enabled = enabled;
    }

    /// Installs the result of a full conversation fetch.
    ///
    /// Later duplicates of an id win. If the active conversation is no longer
    /// part of the list, the selection and its timeline are cleared.
    pub fn replace_conversations(&mut self, conversations: Vec<ConversationSummary>) {
        let mut positions: HashMap<i64, usize> = HashMap::with_capacity(conversations.len());
        let mut deduped: Vec<ConversationSummary> = Vec::with_capacity(conversations.len());

        for conversation in conversations {
            match positions.get(&conversation.id) {
                Some(&index) => deduped[index] = conversation,
                None => {
                    positions.insert(conversation.id, deduped.len());
                    deduped.push(conversation);
                }
            }
        }

        self.conversations = deduped;
        self.sort_conversations();

        if let Some(active) = self.active_conversation_id {
            if self.conversation(active).is_none() {
                self.clear_active();
            }
        }
    }

    /// Applies a `message.new` event.
    ///
    /// A self-authored or outgoing message takes the place of the oldest
    /// pending entry of its conversation with the same trimmed content.
    pub fn add_message(&mut self, message: Message, now: DateTime<Utc>) -> AddMessageOutcome {
        let conversation_id = message.conversation_id;
        let is_active = self.active_conversation_id == Some(conversation_id);
        let conversation_known = self.conversation(conversation_id).is_some();

        if self.timeline.iter().any(|entry| entry.matches(&message)) {
            return AddMessageOutcome {
                inserted: false,
                conversation_known,
                is_active,
                unread_incremented: false,
                notify: false,
            };
        }

        let counts_as_unread = message.counts_as_unread();
        let notify = message.is_notifiable() && self.notifications_enabled && !is_active;
        let preview = message.display_content();
        if counts_as_unread || !self.collapse_echo_into_pending(&message) {
            self.timeline.push(TimelineEntry::confirmed(message));
            self.trim_inactive_timeline(conversation_id);
        }

        let mut unread_incremented = false;
        if let Some(conversation) = self
            .conversations
            .iter_mut()
            .find(|conversation| conversation.id == conversation_id)
        {
            conversation.last_activity_at = Some(now);
            conversation.last_message_content = Some(preview);
            if counts_as_unread && !is_active {
                conversation.unread_count = conversation.unread_count.saturating_add(1);
                unread_incremented = true;
            }
            self.sort_conversations();
        }

        AddMessageOutcome {
            inserted: true,
            conversation_known,
            is_active,
            unread_incremented,
            notify,
        }
    }

    /// Applies a `message.updated` event. Returns whether an entry changed.
    pub fn apply_message_update(&mut self, update: &MessageUpdate) -> bool {
        let Some(entry) = self
            .timeline
            .iter_mut()
            .find(|entry| entry.is_confirmed() && update.targets(&entry.message))
        else {
            return false;
        };

        let message = &mut entry.message;
        let mut changed = false;

        if let Some(status) = update.status {
            if message.status.can_advance_to(status) {
                message.status = status;
                changed = true;
            }
        }

        if let Some(content) = &update.content {
            if &message.content != content {
                message.content = content.clone();
                changed = true;
            }
        }

        if let Some(media_url) = &update.media_url {
            if message.media_url.as_ref() != Some(media_url) {
                message.media_url = Some(media_url.clone());
                changed = true;
            }
        }

        if message.correlation_id().is_none() {
            if let Some(correlation_id) = update.correlation_id() {
                message.whatsapp_message_id = Some(correlation_id.to_owned());
                changed = true;
            }
        }

        changed
    }

    /// Applies a `conversation.updated` event: full replace of a tracked entry.
    pub fn update_conversation(&mut self, conversation: ConversationSummary) -> bool {
        let Some(existing) = self
            .conversations
            .iter_mut()
            .find(|existing| existing.id == conversation.id)
        else {
            return false;
        };

        *existing = conversation;
        self.sort_conversations();
        true
    }

    /// Applies a `conversation.new` event. Returns false for a known id.
    pub fn add_conversation(&mut self, conversation: ConversationSummary) -> bool {
        if self.conversation(conversation.id).is_some() {
            return false;
        }

        self.conversations.insert(0, conversation);
        self.sort_conversations();
        true
    }

    /// Applies a `conversation.deleted` event.
    pub fn remove_conversation(&mut self, id: i64) -> RemovalOutcome {
        let before = self.conversations.len();
        self.conversations.retain(|conversation| conversation.id != id);
        let removed = before - self.conversations.len();

        let cleared_active = self.drop_conversation_state(|conversation_id| conversation_id == id);

        RemovalOutcome {
            removed,
            cleared_active,
        }
    }

    /// Applies an `inbox.cleared` event.
    pub fn remove_conversations_by_inbox(&mut self, inbox_id: i64) -> RemovalOutcome {
        let removed_ids: Vec<i64> = self
            .conversations
            .iter()
            .filter(|conversation| conversation.inbox_id == inbox_id)
            .map(|conversation| conversation.id)
            .collect();

        self.conversations
            .retain(|conversation| conversation.inbox_id != inbox_id);

        let cleared_active = self.drop_conversation_state(|conversation_id| {
            removed_ids.contains(&conversation_id)
        });

        RemovalOutcome {
            removed: removed_ids.len(),
            cleared_active,
        }
    }

    /// Zeroes the unread badge of a conversation. Returns the previous count.
    pub fn mark_read(&mut self, conversation_id: i64) -> Option<u32> {
        self.conversations
            .iter_mut()
            .find(|conversation| conversation.id == conversation_id)
            .map(|conversation| std::mem::take(&mut conversation.unread_count))
    }

    /// Opens a conversation: resets the timelines and clears its unread badge.
    pub fn select_conversation(&mut self, conversation_id: i64) -> bool {
        self.active_conversation_id = Some(conversation_id);
        self.timeline.clear();
        self.activities.clear();
        self.mark_read(conversation_id).is_some()
    }

    /// Installs fetched history for `conversation_id` if it is still active.
    ///
    /// Entries received through push while the fetch was in flight, and
    /// optimistic entries, are kept after the history.
    pub fn load_timeline(&mut self, conversation_id: i64, mut history: Vec<Message>) -> bool {
        if self.active_conversation_id != Some(conversation_id) {
            return false;
        }

        history.retain(|message| message.conversation_id == conversation_id);
        history.sort_by_key(|message| message.created_at);

        let mut timeline: Vec<TimelineEntry> = Vec::with_capacity(history.len());
        for message in history {
            if !timeline.iter().any(|entry| entry.matches(&message)) {
                timeline.push(TimelineEntry::confirmed(message));
            }
        }

        for entry in self.timeline.drain(..) {
            if entry.message.conversation_id != conversation_id {
                continue;
            }
            if entry.is_confirmed() && timeline.iter().any(|kept| kept.matches(&entry.message)) {
                continue;
            }
            timeline.push(entry);
        }

        self.timeline = timeline;
        true
    }

    /// Installs fetched activities for `conversation_id` if it is still active.
    pub fn load_activities(&mut self, conversation_id: i64, activities: Vec<Activity>) -> bool {
        if self.active_conversation_id != Some(conversation_id) {
            return false;
        }

        self.activities.clear();
        for activity in activities {
            self.record_activity(activity);
        }
        self.activities.sort_by_key(|activity| activity.created_at);
        true
    }

    /// Appends an activity unless one with the same id is already recorded.
    pub fn record_activity(&mut self, activity: Activity) -> bool {
        if self.activities.iter().any(|existing| existing.id == activity.id) {
            return false;
        }

        self.activities.push(activity);
        true
    }

    /// First phase of an optimistic send: appends a pending entry.
    pub fn begin_send(
        &mut self,
        conversation_id: i64,
        content: &str,
        now: DateTime<Utc>,
    ) -> LocalMessageId {
        let local_id = LocalMessageId(self.next_local_id);
        self.next_local_id += 1;

        let message = Message {
            id: -(local_id.0 as i64),
            conversation_id,
            inbox_id: self.conversation(conversation_id).map(|c| c.inbox_id),
            content: content.to_owned(),
            message_type: MessageType::Outgoing,
            content_type: Some(OUTGOING_CONTENT_TYPE.to_owned()),
            status: MessageStatus::Pending,
            is_from_me: true,
            sender_id: None,
            created_at: now,
            media_url: None,
            file_name: None,
            file_size: None,
            mime_type: None,
            caption: None,
            whatsapp_message_id: None,
        };
        self.timeline.push(TimelineEntry::pending(local_id, message));

        if let Some(conversation) = self
            .conversations
            .iter_mut()
            .find(|conversation| conversation.id == conversation_id)
        {
            conversation.last_activity_at = Some(now);
            conversation.last_message_content = Some(content.to_owned());
            self.sort_conversations();
        }

        local_id
    }

    /// Second phase of an optimistic send: the server accepted the message.
    pub fn confirm_send(&mut self, local_id: LocalMessageId, confirmed: Message) -> ConfirmOutcome {
        if let Some(echo_id) = self.echoed.remove(&local_id) {
            if confirmed.id == echo_id
                || self.timeline.iter().any(|entry| entry.matches(&confirmed))
            {
                return ConfirmOutcome::CollapsedIntoEcho;
            }
        }

        let pending_index = self
            .timeline
            .iter()
            .position(|entry| entry.local_id() == Some(local_id));

        let Some(pending_index) = pending_index else {
            if !self.timeline.iter().any(|entry| entry.matches(&confirmed)) {
                self.timeline.push(TimelineEntry::confirmed(confirmed));
            }
            return ConfirmOutcome::Inserted;
        };

        if self.timeline.iter().any(|entry| entry.matches(&confirmed)) {
            self.timeline.remove(pending_index);
            return ConfirmOutcome::CollapsedIntoEcho;
        }

        self.timeline[pending_index] = TimelineEntry::confirmed(confirmed);
        ConfirmOutcome::Replaced
    }

    /// The send request failed; the optimistic entry stays visible as failed.
    ///
    /// Returns false when the server echo already confirmed the message.
    pub fn fail_send(&mut self, local_id: LocalMessageId) -> bool {
        if self.echoed.remove(&local_id).is_some() {
            return false;
        }

        let Some(entry) = self
            .timeline
            .iter_mut()
            .find(|entry| entry.local_id() == Some(local_id))
        else {
            return false;
        };

        entry.delivery = Delivery::Failed(local_id);
        entry.message.status = MessageStatus::Failed;
        true
    }

    fn collapse_echo_into_pending(&mut self, echo: &Message) -> bool {
        let content = echo.content.trim();
        let Some(entry) = self.timeline.iter_mut().find(|entry| {
            matches!(entry.delivery, Delivery::Pending(_))
                && entry.message.conversation_id == echo.conversation_id
                && entry.message.content.trim() == content
        }) else {
            return false;
        };

        if let Some(local_id) = entry.local_id() {
            self.echoed.insert(local_id, echo.id);
        }
        *entry = TimelineEntry::confirmed(echo.clone());
        true
    }

    fn trim_inactive_timeline(&mut self, conversation_id: i64) {
        if self.active_conversation_id == Some(conversation_id) {
            return;
        }

        let is_cached = |entry: &TimelineEntry| {
            entry.is_confirmed() && entry.message.conversation_id == conversation_id
        };
        let cached = self.timeline.iter().filter(|entry| is_cached(*entry)).count();
        let mut excess = cached.saturating_sub(INACTIVE_TIMELINE_CAP);
        if excess == 0 {
            return;
        }

        // Oldest arrivals go first.
        self.timeline.retain(|entry| {
            if excess > 0 && is_cached(entry) {
                excess -= 1;
                return false;
            }
            true
        });
    }

    fn drop_conversation_state<F>(&mut self, is_removed: F) -> bool
    where
        F: Fn(i64) -> bool,
    {
        if self.active_conversation_id.is_some_and(&is_removed) {
            self.clear_active();
            return true;
        }

        self.timeline
            .retain(|entry| !is_removed(entry.message.conversation_id));
        false
    }

    fn clear_active(&mut self) {
        self.active_conversation_id = None;
        self.timeline.clear();
        self.activities.clear();
    }

    fn sort_conversations(&mut self) {
        // `sort_by` is stable, so ties keep their previous relative order.
        self.conversations
            .sort_by(|left, right| right.effective_timestamp().cmp(&left.effective_timestamp()));
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::test_support::{at, conversation, message};

    fn ids(store: &ConversationStore) -> Vec<i64> {
        store.conversations().iter().map(|c| c.id).collect()
    }

    fn assert_sorted(store: &ConversationStore) {
        let keys: Vec<_> = store
            .conversations()
            .iter()
            .map(ConversationSummary::effective_timestamp)
            .collect();
        assert!(
            keys.windows(2).all(|pair| pair[0] >= pair[1]),
            "conversation list must be sorted newest first: {keys:?}"
        );
    }

    fn correlated(id: i64, conversation_id: i64, correlation_id: &str) -> Message {
        Message {
            whatsapp_message_id: Some(correlation_id.to_owned()),
            ..message(id, conversation_id)
        }
    }

    fn store_with(conversations: Vec<ConversationSummary>) -> ConversationStore {
        let mut store = ConversationStore::default();
        store.replace_conversations(conversations);
        store
    }

    #[test]
    fn default_store_is_empty_with_notifications_enabled() {
        let store = ConversationStore::default();

        assert!(store.conversations().is_empty());
        assert!(store.messages().is_empty());
        assert_eq!(store.active_conversation_id(), None);
        assert!(store.notifications_enabled());
    }

    #[test]
    fn message_for_inactive_conversation_moves_it_to_top_and_increments_unread() {
        let t0 = at(1_000);
        let mut store = store_with(vec![
            conversation(1, Some(t0)),
            conversation(2, Some(t0 - Duration::seconds(10))),
        ]);
        assert_eq!(ids(&store), vec![1, 2]);

        let outcome = store.add_message(message(70, 2), t0 + Duration::seconds(5));

        assert_eq!(ids(&store), vec![2, 1]);
        assert_eq!(store.conversation(2).map(|c| c.unread_count), Some(1));
        assert!(outcome.inserted);
        assert!(outcome.unread_incremented);
        assert!(outcome.notify);
        assert_sorted(&store);
    }

    #[test]
    fn duplicate_correlation_id_collapses_to_one_entry() {
        let mut store = store_with(vec![conversation(10, Some(at(0)))]);

        store.add_message(correlated(55, 10, "wamid.ABC"), at(1));
        let second = store.add_message(correlated(9001, 10, "wamid.ABC"), at(2));

        assert_eq!(store.messages().len(), 1);
        assert_eq!(store.messages()[0].message.id, 55);
        assert!(!second.inserted);
        assert!(!second.notify);
    }

    #[test]
    fn duplicate_id_collapses_and_does_not_double_count_unread() {
        let mut store = store_with(vec![conversation(10, Some(at(0)))]);

        store.add_message(message(5, 10), at(1));
        store.add_message(message(5, 10), at(2));

        assert_eq!(store.messages().len(), 1);
        assert_eq!(store.conversation(10).map(|c| c.unread_count), Some(1));
    }

    #[test]
    fn message_for_active_conversation_never_increments_unread_or_notifies() {
        let mut store = store_with(vec![conversation(1, Some(at(0)))]);
        store.select_conversation(1);

        let outcome = store.add_message(message(3, 1), at(5));

        assert_eq!(store.conversation(1).map(|c| c.unread_count), Some(0));
        assert!(outcome.is_active);
        assert!(!outcome.notify);
        assert_eq!(store.active_messages().count(), 1);
    }

    #[test]
    fn self_authored_message_updates_activity_without_unread() {
        let mut store = store_with(vec![
            conversation(1, Some(at(10))),
            conversation(2, Some(at(0))),
        ]);
        let own = Message {
            is_from_me: true,
            message_type: MessageType::Outgoing,
            ..message(8, 2)
        };

        let outcome = store.add_message(own, at(20));

        assert_eq!(ids(&store), vec![2, 1]);
        assert_eq!(store.conversation(2).map(|c| c.unread_count), Some(0));
        assert!(!outcome.notify);
    }

    #[test]
    fn disabled_notifications_suppress_notify_but_not_unread() {
        let mut store = store_with(vec![conversation(1, Some(at(0)))]);
        store.set_notifications_enabled(false);

        let outcome = store.add_message(message(3, 1), at(5));

        assert!(!outcome.notify);
        assert!(outcome.unread_incremented);
    }

    #[test]
    fn message_for_unknown_conversation_is_kept_without_fabricating_conversation() {
        let mut store = store_with(vec![conversation(1, Some(at(0)))]);

        let outcome = store.add_message(message(3, 99), at(5));

        assert!(outcome.inserted);
        assert!(!outcome.conversation_known);
        assert_eq!(ids(&store), vec![1]);
        assert_eq!(store.messages().len(), 1);
    }

    #[test]
    fn update_conversation_replaces_by_value_and_resorts() {
        let mut store = store_with(vec![
            conversation(1, Some(at(10))),
            conversation(2, Some(at(5))),
        ]);
        let server_copy = ConversationSummary {
            unread_count: 4,
            ..conversation(2, Some(at(30)))
        };

        assert!(store.update_conversation(server_copy.clone()));

        assert_eq!(ids(&store), vec![2, 1]);
        assert_eq!(store.conversation(2), Some(&server_copy));
    }

    #[test]
    fn update_of_untracked_conversation_is_noop() {
        let mut store = store_with(vec![conversation(1, Some(at(10)))]);
        let before = store.clone();

        assert!(!store.update_conversation(conversation(5, Some(at(50)))));
        assert_eq!(store, before);
    }

    #[test]
    fn add_conversation_dedups_by_id_and_inserts_newest_first() {
        let mut store = store_with(vec![conversation(1, Some(at(10)))]);

        assert!(store.add_conversation(conversation(2, Some(at(20)))));
        assert!(!store.add_conversation(conversation(2, Some(at(99)))));

        assert_eq!(ids(&store), vec![2, 1]);
        assert_eq!(
            store.conversation(2).and_then(|c| c.last_activity_at),
            Some(at(20))
        );
    }

    #[test]
    fn added_conversation_with_older_timestamp_is_sorted_into_place() {
        let mut store = store_with(vec![conversation(1, Some(at(10)))]);

        store.add_conversation(conversation(2, Some(at(1))));

        assert_eq!(ids(&store), vec![1, 2]);
        assert_sorted(&store);
    }

    #[test]
    fn removing_active_conversation_clears_selection_and_messages() {
        let mut store = store_with(vec![
            conversation(1, Some(at(10))),
            conversation(2, Some(at(5))),
        ]);
        store.select_conversation(1);
        store.add_message(message(3, 1), at(11));

        let outcome = store.remove_conversation(1);

        assert_eq!(outcome.removed, 1);
        assert!(outcome.cleared_active);
        assert_eq!(store.active_conversation_id(), None);
        assert!(store.messages().is_empty());
        assert_eq!(ids(&store), vec![2]);
    }

    #[test]
    fn removing_inactive_conversation_keeps_selection() {
        let mut store = store_with(vec![
            conversation(1, Some(at(10))),
            conversation(2, Some(at(5))),
        ]);
        store.select_conversation(1);
        store.add_message(message(3, 1), at(11));
        store.add_message(message(4, 2), at(12));

        let outcome = store.remove_conversation(2);

        assert!(!outcome.cleared_active);
        assert_eq!(store.active_conversation_id(), Some(1));
        assert_eq!(store.messages().len(), 1);
    }

    #[test]
    fn inbox_cleared_removes_all_its_conversations_and_active_selection() {
        let mut store = store_with(vec![
            ConversationSummary {
                inbox_id: 7,
                ..conversation(1, Some(at(10)))
            },
            ConversationSummary {
                inbox_id: 8,
                ..conversation(2, Some(at(9)))
            },
            ConversationSummary {
                inbox_id: 7,
                ..conversation(3, Some(at(8)))
            },
        ]);
        store.select_conversation(3);
        store.add_message(message(30, 3), at(11));

        let outcome = store.remove_conversations_by_inbox(7);

        assert_eq!(outcome.removed, 2);
        assert!(outcome.cleared_active);
        assert_eq!(ids(&store), vec![2]);
        assert!(store.messages().is_empty());
        assert_eq!(store.active_conversation(), None);
    }

    #[test]
    fn mark_read_zeroes_unread_synchronously() {
        let mut store = store_with(vec![ConversationSummary {
            unread_count: 6,
            ..conversation(1, Some(at(0)))
        }]);

        assert_eq!(store.mark_read(1), Some(6));
        assert_eq!(store.conversation(1).map(|c| c.unread_count), Some(0));
        assert_eq!(store.mark_read(404), None);
    }

    #[test]
    fn ties_keep_previous_relative_order() {
        let same = at(100);
        let mut store = store_with(vec![
            conversation(1, Some(same)),
            conversation(2, Some(same)),
            conversation(3, Some(same)),
        ]);

        store.update_conversation(ConversationSummary {
            unread_count: 1,
            ..conversation(2, Some(same))
        });
        store.mark_read(3);

        assert_eq!(ids(&store), vec![1, 2, 3]);
    }

    #[test]
    fn conversations_without_timestamps_sort_last() {
        let store = store_with(vec![
            conversation(1, None),
            conversation(2, Some(at(5))),
            ConversationSummary {
                created_at: Some(at(7)),
                ..conversation(3, None)
            },
        ]);

        assert_eq!(ids(&store), vec![3, 2, 1]);
    }

    #[test]
    fn replace_conversations_dedups_last_wins_and_drops_vanished_selection() {
        let mut store = store_with(vec![conversation(1, Some(at(1)))]);
        store.select_conversation(1);
        store.add_message(message(3, 1), at(2));

        store.replace_conversations(vec![
            conversation(2, Some(at(5))),
            ConversationSummary {
                unread_count: 9,
                ..conversation(2, Some(at(6)))
            },
        ]);

        assert_eq!(ids(&store), vec![2]);
        assert_eq!(store.conversation(2).map(|c| c.unread_count), Some(9));
        assert_eq!(store.active_conversation_id(), None);
        assert!(store.messages().is_empty());
    }

    #[test]
    fn list_stays_sorted_across_mixed_operations() {
        let mut store = store_with(vec![
            conversation(1, Some(at(30))),
            conversation(2, Some(at(20))),
            conversation(3, Some(at(10))),
        ]);

        store.add_message(message(1, 3), at(40));
        assert_sorted(&store);
        store.add_conversation(conversation(4, Some(at(35))));
        assert_sorted(&store);
        store.update_conversation(conversation(1, Some(at(50))));
        assert_sorted(&store);
        store.begin_send(2, "hi", at(60));
        assert_sorted(&store);
        store.remove_conversation(4);
        assert_sorted(&store);
        store.remove_conversations_by_inbox(99);
        assert_sorted(&store);
        store.mark_read(3);
        assert_sorted(&store);

        assert_eq!(ids(&store), vec![2, 1, 3]);
    }

    #[test]
    fn select_conversation_resets_timelines_and_clears_badge() {
        let mut store = store_with(vec![ConversationSummary {
            unread_count: 2,
            ..conversation(1, Some(at(0)))
        }]);
        store.add_message(message(9, 1), at(1));

        assert!(store.select_conversation(1));

        assert!(store.messages().is_empty());
        assert_eq!(store.conversation(1).map(|c| c.unread_count), Some(0));
        assert_eq!(store.active_conversation().map(|c| c.id), Some(1));
    }

    #[test]
    fn load_timeline_ignores_late_response_for_previous_conversation() {
        let mut store = store_with(vec![
            conversation(1, Some(at(0))),
            conversation(2, Some(at(0))),
        ]);
        store.select_conversation(1);
        store.select_conversation(2);

        assert!(!store.load_timeline(1, vec![message(1, 1)]));
        assert!(store.messages().is_empty());
    }

    #[test]
    fn load_timeline_merges_history_with_push_and_pending_entries() {
        let mut store = store_with(vec![conversation(1, Some(at(0)))]);
        store.select_conversation(1);
        store.add_message(message(3, 1), at(5));
        let local_id = store.begin_send(1, "draft", at(6));

        let history = vec![
            Message {
                created_at: at(2),
                ..message(2, 1)
            },
            Message {
                created_at: at(1),
                ..message(1, 1)
            },
            Message {
                created_at: at(3),
                ..message(3, 1)
            },
        ];
        assert!(store.load_timeline(1, history));

        let ids: Vec<i64> = store.messages().iter().map(|e| e.message.id).collect();
        assert_eq!(ids, vec![1, 2, 3, -(local_id.0 as i64)]);
    }

    #[test]
    fn message_update_only_advances_status() {
        let mut store = ConversationStore::default();
        store.add_message(message(1, 1), at(0));

        let read = MessageUpdate {
            id: 1,
            status: Some(MessageStatus::Read),
            ..MessageUpdate::default()
        };
        let late_delivered = MessageUpdate {
            id: 1,
            status: Some(MessageStatus::Delivered),
            ..MessageUpdate::default()
        };

        assert!(store.apply_message_update(&read));
        assert!(!store.apply_message_update(&late_delivered));
        assert_eq!(store.messages()[0].message.status, MessageStatus::Read);
    }

    #[test]
    fn message_update_can_target_by_correlation_id() {
        let mut store = ConversationStore::default();
        store.add_message(correlated(1, 1, "wamid.X"), at(0));

        let update = MessageUpdate {
            id: 777,
            status: Some(MessageStatus::Delivered),
            whatsapp_message_id: Some("wamid.X".to_owned()),
            ..MessageUpdate::default()
        };

        assert!(store.apply_message_update(&update));
        assert_eq!(store.messages()[0].message.status, MessageStatus::Delivered);
    }

    #[test]
    fn message_update_for_unknown_message_is_ignored() {
        let mut store = ConversationStore::default();

        assert!(!store.apply_message_update(&MessageUpdate {
            id: 1,
            status: Some(MessageStatus::Read),
            ..MessageUpdate::default()
        }));
    }

    #[test]
    fn confirm_send_replaces_pending_entry() {
        let mut store = store_with(vec![conversation(1, Some(at(0)))]);
        store.select_conversation(1);
        let local_id = store.begin_send(1, "hello", at(1));
        assert_eq!(store.messages()[0].message.status, MessageStatus::Pending);

        let server = Message {
            is_from_me: true,
            message_type: MessageType::Outgoing,
            ..correlated(500, 1, "wamid.S")
        };
        let outcome = store.confirm_send(local_id, server.clone());

        assert_eq!(outcome, ConfirmOutcome::Replaced);
        assert_eq!(store.messages().len(), 1);
        assert!(store.messages()[0].is_confirmed());

        let echo = store.add_message(server, at(2));
        assert!(!echo.inserted);
        assert_eq!(store.messages().len(), 1);
    }

    #[test]
    fn confirm_send_after_push_echo_collapses_to_one_entry() {
        let mut store = store_with(vec![conversation(1, Some(at(0)))]);
        store.select_conversation(1);
        let local_id = store.begin_send(1, "hello", at(1));
        let server = Message {
            is_from_me: true,
            message_type: MessageType::Outgoing,
            ..correlated(500, 1, "wamid.S")
        };

        let echo = store.add_message(server.clone(), at(2));
        assert!(echo.inserted);
        assert!(!echo.unread_incremented);
        assert_eq!(store.messages().len(), 1);
        assert!(store.messages()[0].is_confirmed());

        let outcome = store.confirm_send(local_id, server);

        assert_eq!(outcome, ConfirmOutcome::CollapsedIntoEcho);
        assert_eq!(store.messages().len(), 1);
        assert_eq!(store.messages()[0].message.id, 500);
    }

    #[test]
    fn failed_request_after_push_echo_keeps_the_confirmed_entry() {
        let mut store = store_with(vec![conversation(1, Some(at(0)))]);
        store.select_conversation(1);
        let local_id = store.begin_send(1, "hello", at(1));
        let echo = Message {
            is_from_me: true,
            message_type: MessageType::Outgoing,
            content: " hello ".to_owned(),
            ..correlated(500, 1, "wamid.S")
        };

        store.add_message(echo, at(2));

        assert!(!store.fail_send(local_id));
        assert_eq!(store.messages().len(), 1);
        assert_eq!(store.messages()[0].delivery, Delivery::Confirmed);
        assert_eq!(store.messages()[0].message.id, 500);
    }

    #[test]
    fn push_echo_replaces_oldest_matching_pending_entry_only() {
        let mut store = store_with(vec![
            conversation(1, Some(at(0))),
            conversation(2, Some(at(0))),
        ]);
        store.select_conversation(1);
        let first = store.begin_send(1, "hello", at(1));
        let other_text = store.begin_send(1, "bye", at(2));
        let second = store.begin_send(1, "hello", at(3));
        let other_conversation = store.begin_send(2, "hello", at(4));

        store.add_message(
            Message {
                is_from_me: true,
                message_type: MessageType::Outgoing,
                ..message(500, 1)
            },
            at(5),
        );

        let deliveries: Vec<Delivery> = store.messages().iter().map(|e| e.delivery).collect();
        assert_eq!(
            deliveries,
            vec![
                Delivery::Confirmed,
                Delivery::Pending(other_text),
                Delivery::Pending(second),
                Delivery::Pending(other_conversation),
            ]
        );
        assert_eq!(store.messages()[0].message.id, 500);
        assert!(store.fail_send(second));
        assert!(!store.fail_send(first));
    }

    #[test]
    fn inbound_message_with_same_text_does_not_replace_pending_entry() {
        let mut store = store_with(vec![conversation(1, Some(at(0)))]);
        store.select_conversation(1);
        let local_id = store.begin_send(1, "hello", at(1));

        store.add_message(message(500, 1), at(2));

        assert_eq!(store.messages().len(), 2);
        assert_eq!(store.messages()[0].delivery, Delivery::Pending(local_id));
    }

    #[test]
    fn inactive_conversation_cache_keeps_only_newest_entries() {
        let mut store = store_with(vec![
            conversation(1, Some(at(0))),
            conversation(2, Some(at(0))),
        ]);
        store.select_conversation(2);
        let cap = INACTIVE_TIMELINE_CAP as i64;
        for id in 1..=cap + 5 {
            store.add_message(message(id, 1), at(id));
        }
        for id in 1..=cap + 5 {
            store.add_message(message(10_000 + id, 2), at(id));
        }

        let cached: Vec<i64> = store
            .messages()
            .iter()
            .filter(|e| e.message.conversation_id == 1)
            .map(|e| e.message.id)
            .collect();
        assert_eq!(cached.len(), INACTIVE_TIMELINE_CAP);
        assert_eq!(cached.first(), Some(&6));
        assert_eq!(store.active_messages().count(), INACTIVE_TIMELINE_CAP + 5);

        let replay = store.add_message(message(cap + 5, 1), at(999));
        assert!(!replay.inserted);
    }

    #[test]
    fn fail_send_marks_entry_failed() {
        let mut store = ConversationStore::default();
        let local_id = store.begin_send(1, "hello", at(1));

        assert!(store.fail_send(local_id));

        let entry = &store.messages()[0];
        assert_eq!(entry.delivery, Delivery::Failed(local_id));
        assert_eq!(entry.message.status, MessageStatus::Failed);
        assert!(!store.fail_send(LocalMessageId(999)));
    }

    #[test]
    fn begin_send_moves_conversation_to_top() {
        let mut store = store_with(vec![
            conversation(1, Some(at(10))),
            conversation(2, Some(at(5))),
        ]);

        store.begin_send(2, "ping", at(20));

        assert_eq!(ids(&store), vec![2, 1]);
        assert_eq!(
            store.conversation(2).and_then(|c| c.last_message_content.clone()),
            Some("ping".to_owned())
        );
    }

    #[test]
    fn activities_are_append_only_and_deduped() {
        let mut store = store_with(vec![conversation(1, Some(at(0)))]);
        store.select_conversation(1);
        let activity = crate::test_support::activity(1, at(3));

        assert!(store.load_activities(
            1,
            vec![crate::test_support::activity(2, at(5)), activity.clone()]
        ));
        assert!(!store.record_activity(activity));

        let ids: Vec<i64> = store.activities().iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn total_unread_sums_badges() {
        let store = store_with(vec![
            ConversationSummary {
                unread_count: 2,
                ..conversation(1, Some(at(0)))
            },
            ConversationSummary {
                unread_count: 3,
                ..conversation(2, Some(at(0)))
            },
        ]);

        assert_eq!(store.total_unread(), 5);
    }
}
