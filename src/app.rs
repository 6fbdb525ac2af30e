use std::future::Future;

use anyhow::{anyhow, Result};
use chrono::Utc;
use reqwest::Client;
use tokio::{runtime::Handle, sync::mpsc};

use crate::{
    cli::{Cli, Command},
    domain::conversation_store::ConversationStore,
    realtime::{
        connectivity::ConnectivityTracker,
        dispatcher::EventDispatcher,
        transport::{RealtimeTransport, TransportSettings},
    },
    ui::{conversation_list::render_conversation_list, timeline::render_timeline},
    usecases::{
        bootstrap, context::AppContext, list_conversations::ListConversationsQuery,
        sync_session::SyncSession,
    },
};

const LISTEN_STARTED: &str = "LISTEN_STARTED";
const LISTEN_STOPPED: &str = "LISTEN_STOPPED";
const INITIAL_REFRESH_FAILED: &str = "INITIAL_REFRESH_FAILED";
const HISTORY_LOAD_FAILED: &str = "HISTORY_LOAD_FAILED";

pub fn run(cli: Cli) -> Result<()> {
    let context = bootstrap::bootstrap(cli.config.as_deref())?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let result = runtime.block_on(execute(cli.command_or_default(), &context));
    drop(runtime);
    drop(context);
    result
}

async fn execute(command: Command, context: &AppContext) -> Result<()> {
    match command {
        Command::Listen => {
            let settings =
                TransportSettings::from_config(&context.config.api, &context.config.realtime);
            let summary = listen(
                &context.session,
                context.stream_client.clone(),
                settings,
                shutdown_signal(),
            )
            .await?;

            println!(
                "Stopped after {} events. {} conversations, {} unread.",
                summary.events, summary.conversations, summary.total_unread
            );
        }
        Command::List { inbox } => {
            context
                .session
                .refresh(ListConversationsQuery { inbox_id: inbox })
                .await
                .map_err(|error| anyhow!("failed to load conversations: {error:?}"))?;

            let rendered = context.session.read(|store| {
                render_conversation_list(
                    store.conversations(),
                    store.total_unread(),
                    Utc::now().date_naive(),
                )
            });
            println!("{rendered}");
        }
        Command::Read { conversation_id } => {
            println!("{}", read_conversation(&context.session, conversation_id).await?);
        }
        Command::Send {
            conversation_id,
            text,
        } => {
            println!(
                "{}",
                send_to_conversation(&context.session, conversation_id, &text).await?
            );
        }
        Command::Delete { conversation_id } => {
            println!("{}", delete_conversation(&context.session, conversation_id).await?);
        }
        Command::ClearInbox { inbox_id } => {
            println!("{}", clear_inbox(&context.session, inbox_id).await?);
        }
    }

    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenSummary {
    pub events: u64,
    pub conversations: usize,
    pub total_unread: u64,
}

/// Runs the push pipeline until `shutdown` resolves or the transport gives up.
///
/// Events travel transport → channel → dispatcher → session handlers, and
/// are dispatched one at a time in arrival order.
pub async fn listen<S>(
    session: &SyncSession,
    client: Client,
    settings: TransportSettings,
    shutdown: S,
) -> Result<ListenSummary>
where
    S: Future<Output = ()>,
{
    if let Err(error) = session.refresh(ListConversationsQuery::default()).await {
        tracing::warn!(
            code = INITIAL_REFRESH_FAILED,
            error = ?error,
            "initial conversation list unavailable; continuing with push events only"
        );
    }

    let dispatcher = EventDispatcher::new();
    let mut subscription = session.register(&dispatcher);
    let tracker = ConnectivityTracker::new();

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let mut transport = RealtimeTransport::start(
        &Handle::current(),
        client,
        settings,
        tracker.clone(),
        move |event| {
            let _ = event_tx.send(event);
        },
    )?;

    tracing::info!(
        code = LISTEN_STARTED,
        event_types = ?dispatcher.registered_event_types(),
        "listening for realtime events"
    );

    let mut events: u64 = 0;
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            event = event_rx.recv() => match event {
                Some(event) => {
                    dispatcher.dispatch(event).await;
                    events += 1;
                }
                None => break,
            },
        }
    }

    transport.close();
    subscription.unsubscribe();

    let summary = session.read(|store| ListenSummary {
        events,
        conversations: store.conversations().len(),
        total_unread: store.total_unread(),
    });
    let connectivity = tracker.snapshot();
    tracing::info!(
        code = LISTEN_STOPPED,
        events = summary.events,
        health = connectivity.health.as_label(),
        status = ?connectivity.status,
        connections = connectivity.connections,
        last_error = connectivity.last_error.as_ref().map(|error| error.code.as_str()),
        "listener stopped"
    );

    Ok(summary)
}

/// Loads a conversation, persists its read marker and renders its timeline.
pub async fn read_conversation(session: &SyncSession, conversation_id: i64) -> Result<String> {
    if let Err(error) = session.refresh(ListConversationsQuery::default()).await {
        tracing::warn!(
            code = INITIAL_REFRESH_FAILED,
            error = ?error,
            "conversation list unavailable; contact name will be missing"
        );
    }

    let (opened, read) = tokio::join!(
        session.load(conversation_id),
        session.mark_read_and_wait(conversation_id)
    );
    let opened = opened
        .map_err(|error| anyhow!("failed to open conversation {conversation_id}: {error:?}"))?;
    tracing::debug!(
        conversation_id,
        messages = opened.messages_loaded,
        activities = opened.activities_loaded,
        previous_unread = ?read.previous_unread,
        "conversation loaded"
    );

    let mut rendered = session.read(|store| render_active(store, conversation_id));
    if !read.persisted {
        rendered.push_str("\n(read marker could not be saved)");
    }

    Ok(rendered)
}

/// Sends `text` to a conversation and renders its timeline with the result.
///
/// History is loaded first so the sent message shows up in context. A failed
/// history load is logged and the send goes ahead.
pub async fn send_to_conversation(
    session: &SyncSession,
    conversation_id: i64,
    text: &str,
) -> Result<String> {
    refresh_or_warn(session, ListConversationsQuery::default()).await;

    match session.load(conversation_id).await {
        Ok(opened) => tracing::debug!(
            conversation_id,
            messages = opened.messages_loaded,
            activities = opened.activities_loaded,
            applied = opened.applied,
            "conversation loaded"
        ),
        Err(error) => tracing::warn!(
            code = HISTORY_LOAD_FAILED,
            conversation_id,
            error = ?error,
            "conversation history unavailable; sending without it"
        ),
    }

    let output = session
        .send(conversation_id, text)
        .await
        .map_err(|error| anyhow!("message not sent: {}", error.user_message()))?;
    tracing::debug!(
        conversation_id,
        local_id = output.local_id.0,
        outcome = ?output.outcome,
        "message sent"
    );

    Ok(session.read(|store| render_active(store, conversation_id)))
}

pub async fn delete_conversation(session: &SyncSession, conversation_id: i64) -> Result<String> {
    session
        .delete_conversation(conversation_id)
        .await
        .map_err(|error| {
            anyhow!(
                "failed to delete conversation {conversation_id}: {}",
                error.user_message()
            )
        })?;

    Ok(format!("Deleted conversation {conversation_id}."))
}

/// Clears an inbox and reports how many of its conversations were known.
pub async fn clear_inbox(session: &SyncSession, inbox_id: i64) -> Result<String> {
    refresh_or_warn(
        session,
        ListConversationsQuery {
            inbox_id: Some(inbox_id),
        },
    )
    .await;

    let outcome = session
        .clear_inbox(inbox_id)
        .await
        .map_err(|error| anyhow!("failed to clear inbox {inbox_id}: {}", error.user_message()))?;

    Ok(format!(
        "Cleared inbox {inbox_id} ({} conversations removed).",
        outcome.removed
    ))
}

async fn refresh_or_warn(session: &SyncSession, query: ListConversationsQuery) {
    if let Err(error) = session.refresh(query).await {
        tracing::warn!(
            code = INITIAL_REFRESH_FAILED,
            error = ?error,
            "conversation list unavailable; continuing without it"
        );
    }
}

fn render_active(store: &ConversationStore, conversation_id: i64) -> String {
    let name = store
        .active_conversation()
        .and_then(|conversation| conversation.contact_name())
        .unwrap_or("Contact")
        .to_owned();
    let entries: Vec<_> = store.active_messages().cloned().collect();

    format!(
        "#{conversation_id} {name}\n{}",
        render_timeline(&entries, &name)
    )
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %error, "ctrl-c handler unavailable; stopping listener");
    }
}
