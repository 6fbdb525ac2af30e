//! Binds dispatched push events to the conversation store and runs the side
//! effects the store asks for: notifications, read persistence and the
//! conversation refetch for messages of unknown conversations.
//!
//! Store mutations happen synchronously under the store lock. Network calls
//! run on spawned tasks so the event loop is never blocked by them.

use std::{
    collections::HashSet,
    sync::{Arc, Mutex, PoisonError},
};

use crate::{
    domain::{
        conversation_store::{ConversationStore, RemovalOutcome},
        events::{EventType, RealtimeEvent},
        message::Message,
        notification::Notification,
    },
    realtime::dispatcher::{handler, EventDispatcher, Subscription},
    usecases::{
        contracts::{Clock, ConversationApi, Notifier},
        list_conversations::{
            refresh_conversations, ListConversationsError, ListConversationsQuery,
        },
        manage_conversations::{self, ManageConversationError},
        mark_read::{mark_conversation_read, persist_read, MarkReadOutput},
        open_conversation::{open_conversation, OpenConversationError, OpenConversationOutput},
        send_message::{send_message, SendMessageCommand, SendMessageError, SendMessageOutput},
        with_store,
    },
};

const CONVERSATIONS_REFETCHED: &str = "CONVERSATIONS_REFETCHED";
const CONVERSATIONS_REFETCH_FAILED: &str = "CONVERSATIONS_REFETCH_FAILED";

#[derive(Clone)]
pub struct SyncSession {
    store: Arc<Mutex<ConversationStore>>,
    api: Arc<dyn ConversationApi>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    refetching: Arc<Mutex<HashSet<i64>>>,
}

impl std::fmt::Debug for SyncSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncSession")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl SyncSession {
    pub fn new(
        api: Arc<dyn ConversationApi>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store: Arc::new(Mutex::new(ConversationStore::default())),
            api,
            notifier,
            clock,
            refetching: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Runs `reader` against the current store state.
    pub fn read<R>(&self, reader: impl FnOnce(&ConversationStore) -> R) -> R {
        with_store(&self.store, |store| reader(store))
    }

    pub fn set_notifications_enabled(&self, enabled: bool) {
        with_store(&self.store, |store| store.set_notifications_enabled(enabled));
    }

    /// Subscribes this session to every dispatchable event type.
    pub fn register(&self, dispatcher: &EventDispatcher) -> Subscription {
        let session = self.clone();
        let apply = handler(move |event| {
            let session = session.clone();
            async move { session.apply(event).await }
        });

        dispatcher.subscribe_many(
            EventType::ALL
                .into_iter()
                .map(|event_type| (event_type, Arc::clone(&apply))),
        )
    }

    pub async fn apply(&self, event: RealtimeEvent) -> anyhow::Result<()> {
        match event {
            RealtimeEvent::MessageNew(message) => self.on_message_new(message),
            RealtimeEvent::MessageUpdated(update) => {
                let applied = with_store(&self.store, |store| store.apply_message_update(&update));
                if !applied {
                    tracing::debug!(message_id = update.id, "message update had no effect");
                }
            }
            RealtimeEvent::ConversationNew(conversation) => {
                with_store(&self.store, |store| store.add_conversation(conversation));
            }
            RealtimeEvent::ConversationUpdated(conversation) => {
                with_store(&self.store, |store| store.update_conversation(conversation));
            }
            RealtimeEvent::ConversationDeleted(deleted) => {
                let outcome =
                    with_store(&self.store, |store| store.remove_conversation(deleted.id));
                log_removal("conversation deleted remotely", outcome);
            }
            RealtimeEvent::InboxCleared(cleared) => {
                let outcome = with_store(&self.store, |store| {
                    store.remove_conversations_by_inbox(cleared.inbox_id)
                });
                log_removal("inbox cleared remotely", outcome);
            }
        }

        Ok(())
    }

    pub async fn refresh(&self, query: ListConversationsQuery) -> Result<usize, ListConversationsError> {
        refresh_conversations(&self.store, self.api.as_ref(), query).await
    }

    /// Opens a conversation and persists the read marker in the background.
    #[cfg_attr(not(test), allow(dead_code))]
    pub async fn open(
        &self,
        conversation_id: i64,
    ) -> Result<OpenConversationOutput, OpenConversationError> {
        self.spawn_persist_read(conversation_id);
        self.load(conversation_id).await
    }

    /// Selects a conversation and loads its history without touching the
    /// server-side read marker.
    pub async fn load(
        &self,
        conversation_id: i64,
    ) -> Result<OpenConversationOutput, OpenConversationError> {
        open_conversation(&self.store, self.api.as_ref(), conversation_id).await
    }

    /// Zeroes the badge and waits for the read marker to be persisted.
    pub async fn mark_read_and_wait(&self, conversation_id: i64) -> MarkReadOutput {
        mark_conversation_read(&self.store, self.api.as_ref(), conversation_id).await
    }

    pub async fn send(
        &self,
        conversation_id: i64,
        text: impl Into<String>,
    ) -> Result<SendMessageOutput, SendMessageError> {
        let command = SendMessageCommand {
            conversation_id,
            text: text.into(),
        };
        send_message(&self.store, self.api.as_ref(), self.clock.as_ref(), command).await
    }

    pub async fn delete_conversation(
        &self,
        conversation_id: i64,
    ) -> Result<RemovalOutcome, ManageConversationError> {
        manage_conversations::delete_conversation(
            &self.store,
            self.api.as_ref(),
            self.notifier.as_ref(),
            conversation_id,
        )
        .await
    }

    pub async fn clear_inbox(&self, inbox_id: i64) -> Result<RemovalOutcome, ManageConversationError> {
        manage_conversations::clear_inbox(
            &self.store,
            self.api.as_ref(),
            self.notifier.as_ref(),
            inbox_id,
        )
        .await
    }

    fn on_message_new(&self, message: Message) {
        let conversation_id = message.conversation_id;
        let now = self.clock.now();

        let (outcome, conversation) = with_store(&self.store, |store| {
            let outcome = store.add_message(message.clone(), now);
            (outcome, store.conversation(conversation_id).cloned())
        });

        if !outcome.inserted {
            tracing::debug!(
                message_id = message.id,
                conversation_id,
                "duplicate message ignored"
            );
            return;
        }
        tracing::trace!(
            message_id = message.id,
            conversation_id,
            unread_incremented = outcome.unread_incremented,
            "message applied"
        );

        if outcome.notify {
            self.notifier
                .notify(&Notification::for_message(conversation.as_ref(), &message));
        }

        if outcome.is_active && message.counts_as_unread() {
            self.spawn_persist_read(conversation_id);
        }

        if !outcome.conversation_known {
            self.spawn_refetch(conversation_id);
        }
    }

    fn spawn_persist_read(&self, conversation_id: i64) {
        let api = Arc::clone(&self.api);
        tokio::spawn(async move {
            persist_read(api.as_ref(), conversation_id).await;
        });
    }

    /// At most one refetch per unknown conversation is in flight.
    fn spawn_refetch(&self, conversation_id: i64) {
        let started = self
            .refetching
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(conversation_id);
        if !started {
            tracing::debug!(conversation_id, "conversation refetch already in flight");
            return;
        }

        let session = self.clone();
        tokio::spawn(async move {
            match session.refresh(ListConversationsQuery::default()).await {
                Ok(count) => tracing::info!(
                    code = CONVERSATIONS_REFETCHED,
                    conversation_id,
                    count,
                    "conversation list refetched for unknown conversation"
                ),
                Err(error) => tracing::warn!(
                    code = CONVERSATIONS_REFETCH_FAILED,
                    conversation_id,
                    error = ?error,
                    "conversation refetch failed"
                ),
            }

            session
                .refetching
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&conversation_id);
        });
    }
}

fn log_removal(reason: &'static str, outcome: RemovalOutcome) {
    tracing::info!(
        removed = outcome.removed,
        cleared_active = outcome.cleared_active,
        "{reason}"
    );
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        domain::{
            conversation::ConversationSummary,
            message::{MessageStatus, MessageType},
        },
        test_support::{at, conversation, eventually, message, FakeApi, FixedClock, RecordingNotifier},
    };

    struct Harness {
        session: SyncSession,
        api: Arc<FakeApi>,
        notifier: Arc<RecordingNotifier>,
    }

    fn harness(conversations: Vec<ConversationSummary>) -> Harness {
        let api = Arc::new(FakeApi::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let session = SyncSession::new(
            Arc::clone(&api) as Arc<dyn ConversationApi>,
            Arc::clone(&notifier) as Arc<dyn Notifier>,
            Arc::new(FixedClock(at(100))),
        );
        with_store(&session.store, |store| store.replace_conversations(conversations));

        Harness {
            session,
            api,
            notifier,
        }
    }

    fn ids(session: &SyncSession) -> Vec<i64> {
        session.read(|store| store.conversations().iter().map(|c| c.id).collect())
    }

    #[tokio::test]
    async fn message_on_inactive_conversation_notifies_once_and_reorders() {
        let h = harness(vec![
            conversation(1, Some(at(0))),
            conversation(2, Some(at(-10))),
        ]);

        h.session
            .apply(RealtimeEvent::MessageNew(message(5, 2)))
            .await
            .expect("apply should succeed");
        h.session
            .apply(RealtimeEvent::MessageNew(message(5, 2)))
            .await
            .expect("apply should succeed");

        assert_eq!(ids(&h.session), vec![2, 1]);
        assert_eq!(
            h.session.read(|store| store.conversation(2).map(|c| c.unread_count)),
            Some(1)
        );
        let notifications = h.notifier.notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].title, "New message from Contact 2");
    }

    #[tokio::test]
    async fn message_on_active_conversation_persists_read_without_notifying() {
        let h = harness(vec![conversation(1, Some(at(0)))]);
        with_store(&h.session.store, |store| store.select_conversation(1));

        h.session
            .apply(RealtimeEvent::MessageNew(message(5, 1)))
            .await
            .expect("apply should succeed");

        assert!(h.notifier.notifications().is_empty());
        let api = Arc::clone(&h.api);
        eventually(move || api.calls().contains(&"mark_read:1".to_owned())).await;
    }

    #[tokio::test]
    async fn own_message_on_active_conversation_does_not_persist_read() {
        let h = harness(vec![conversation(1, Some(at(0)))]);
        with_store(&h.session.store, |store| store.select_conversation(1));
        let own = Message {
            is_from_me: true,
            message_type: MessageType::Outgoing,
            ..message(5, 1)
        };

        h.session
            .apply(RealtimeEvent::MessageNew(own))
            .await
            .expect("apply should succeed");
        tokio::task::yield_now().await;

        assert!(h.api.calls().is_empty());
    }

    #[tokio::test]
    async fn unknown_conversation_triggers_single_refetch() {
        let h = harness(vec![conversation(1, Some(at(0)))]);
        *h.api.conversations.lock().expect("lock") =
            vec![conversation(1, Some(at(0))), conversation(9, Some(at(50)))];

        h.session
            .apply(RealtimeEvent::MessageNew(message(5, 9)))
            .await
            .expect("apply should succeed");
        h.session
            .apply(RealtimeEvent::MessageNew(message(6, 9)))
            .await
            .expect("apply should succeed");

        let session = h.session.clone();
        eventually(move || session.read(|store| store.conversation(9).is_some())).await;
        assert_eq!(
            h.api
                .calls()
                .iter()
                .filter(|call| call.starts_with("list_conversations"))
                .count(),
            1
        );
        assert_eq!(h.notifier.notifications()[0].title, "New message from New contact");
    }

    #[tokio::test]
    async fn disabled_notifications_still_track_unread() {
        let h = harness(vec![conversation(1, Some(at(0)))]);
        h.session.set_notifications_enabled(false);

        h.session
            .apply(RealtimeEvent::MessageNew(message(5, 1)))
            .await
            .expect("apply should succeed");

        assert!(h.notifier.notifications().is_empty());
        assert_eq!(h.session.read(ConversationStore::total_unread), 1);
    }

    #[tokio::test]
    async fn registered_session_reconciles_dispatched_events() {
        let h = harness(vec![
            conversation(1, Some(at(0))),
            ConversationSummary {
                inbox_id: 4,
                ..conversation(2, Some(at(-5)))
            },
        ]);
        let dispatcher = EventDispatcher::new();
        let _subscription = h.session.register(&dispatcher);
        assert_eq!(dispatcher.registered_event_types(), EventType::ALL.to_vec());

        dispatcher
            .emit(
                EventType::ConversationNew,
                json!({"id": 3, "inbox_id": 1, "status": "open", "last_activity_at": 1700000050}),
            )
            .await
            .expect("conversation.new should emit");
        assert_eq!(ids(&h.session), vec![3, 1, 2]);

        dispatcher
            .emit(
                EventType::ConversationUpdated,
                json!({"id": 1, "inbox_id": 1, "status": "resolved", "last_activity_at": 1700000090, "unread_count": 0}),
            )
            .await
            .expect("conversation.updated should emit");
        assert_eq!(ids(&h.session), vec![1, 3, 2]);

        dispatcher
            .emit(EventType::InboxCleared, json!({"inbox_id": 4, "count": 1}))
            .await
            .expect("inbox.cleared should emit");
        dispatcher
            .emit(EventType::ConversationDeleted, json!({"id": 3}))
            .await
            .expect("conversation.deleted should emit");
        assert_eq!(ids(&h.session), vec![1]);
    }

    #[tokio::test]
    async fn message_updates_advance_status() {
        let h = harness(vec![conversation(1, Some(at(0)))]);
        h.session
            .apply(RealtimeEvent::MessageNew(message(5, 1)))
            .await
            .expect("apply should succeed");

        h.session
            .apply(RealtimeEvent::from_parts(
                EventType::MessageUpdated,
                json!({"id": 5, "status": "read"}),
            )
            .expect("update should decode"))
            .await
            .expect("apply should succeed");

        assert_eq!(
            h.session.read(|store| store.messages()[0].message.status),
            MessageStatus::Read
        );
    }

    #[tokio::test]
    async fn mark_read_and_wait_returns_after_persistence() {
        let h = harness(vec![ConversationSummary {
            unread_count: 2,
            ..conversation(1, Some(at(0)))
        }]);

        let output = h.session.mark_read_and_wait(1).await;

        assert_eq!(output.previous_unread, Some(2));
        assert!(output.persisted);
        assert_eq!(h.api.calls(), vec!["mark_read:1".to_owned()]);
    }

    #[tokio::test]
    async fn open_loads_history_and_persists_read() {
        let h = harness(vec![ConversationSummary {
            unread_count: 4,
            ..conversation(1, Some(at(0)))
        }]);
        *h.api.messages.lock().expect("lock") = vec![message(1, 1)];

        h.session.open(1).await.expect("open should succeed");

        assert_eq!(h.session.read(ConversationStore::total_unread), 0);
        assert_eq!(h.session.read(|store| store.active_messages().count()), 1);
        let api = Arc::clone(&h.api);
        eventually(move || api.calls().contains(&"mark_read:1".to_owned())).await;
    }
}
