//! Typed publish/subscribe registry for push events.
//!
//! Handlers are keyed by [`EventType`] with set semantics: registering the
//! same handler instance twice for one type keeps a single entry. Dispatch
//! runs every handler for the event's type concurrently and waits for all of
//! them; a failing or panicking handler is logged and never affects the
//! caller or the other handlers.

use std::{
    collections::HashMap,
    future::Future,
    panic::AssertUnwindSafe,
    sync::{Arc, Mutex, Weak},
};

use futures::{
    future::{join_all, BoxFuture},
    FutureExt,
};

use crate::domain::events::{EventType, RealtimeEvent};

const DISPATCH_HANDLER_FAILED: &str = "DISPATCH_HANDLER_FAILED";
const DISPATCH_HANDLER_PANICKED: &str = "DISPATCH_HANDLER_PANICKED";

pub type HandlerFuture = BoxFuture<'static, anyhow::Result<()>>;
pub type EventHandler = Arc<dyn Fn(RealtimeEvent) -> HandlerFuture + Send + Sync>;

/// Wraps an async closure into a shareable [`EventHandler`].
pub fn handler<F, Fut>(callback: F) -> EventHandler
where
    F: Fn(RealtimeEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move |event| callback(event).boxed())
}

type Registry = HashMap<EventType, Vec<EventHandler>>;

#[derive(Clone, Default)]
pub struct EventDispatcher {
    inner: Arc<Mutex<Registry>>,
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("registered", &self.registered_event_types())
            .finish()
    }
}

/// Handle returned by [`EventDispatcher::subscribe`].
///
/// Dropping it does not unsubscribe.
#[must_use = "keep the subscription to be able to unsubscribe"]
pub struct Subscription {
    registry: Weak<Mutex<Registry>>,
    entries: Vec<(EventType, EventHandler)>,
}

impl Subscription {
    /// Removes every registration made by this subscription. Idempotent.
    pub fn unsubscribe(&mut self) {
        let entries = std::mem::take(&mut self.entries);
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        let Ok(mut registry) = registry.lock() else {
            return;
        };

        for (event_type, handler) in entries {
            if let Some(handlers) = registry.get_mut(&event_type) {
                handlers.retain(|registered| !same_handler(registered, &handler));
                if handlers.is_empty() {
                    registry.remove(&event_type);
                }
            }
        }
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn is_active(&self) -> bool {
        !self.entries.is_empty()
    }
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn subscribe(&self, event_type: EventType, handler: EventHandler) -> Subscription {
        self.subscribe_many([(event_type, handler)])
    }

    /// Registers several pairs at once; the returned subscription removes all of them.
    pub fn subscribe_many<I>(&self, pairs: I) -> Subscription
    where
        I: IntoIterator<Item = (EventType, EventHandler)>,
    {
        let entries: Vec<(EventType, EventHandler)> = pairs.into_iter().collect();

        if let Ok(mut registry) = self.inner.lock() {
            for (event_type, handler) in &entries {
                let handlers = registry.entry(*event_type).or_default();
                if !handlers
                    .iter()
                    .any(|registered| same_handler(registered, handler))
                {
                    handlers.push(Arc::clone(handler));
                }
            }
        }

        Subscription {
            registry: Arc::downgrade(&self.inner),
            entries,
        }
    }

    /// Runs all handlers registered for the event's type and waits for them.
    pub async fn dispatch(&self, event: RealtimeEvent) {
        let event_type = event.event_type();
        let handlers = self.handlers_for(event_type);

        if handlers.is_empty() {
            tracing::trace!(event_type = %event_type, "no handlers registered for event");
            return;
        }

        let runs = handlers.into_iter().map(|handler| {
            let event = event.clone();
            async move {
                let outcome = AssertUnwindSafe(async move { handler(event).await })
                    .catch_unwind()
                    .await;

                match outcome {
                    Ok(Ok(())) => {}
                    Ok(Err(error)) => tracing::error!(
                        code = DISPATCH_HANDLER_FAILED,
                        event_type = %event_type,
                        error = %format!("{error:#}"),
                        "event handler failed"
                    ),
                    Err(_) => tracing::error!(
                        code = DISPATCH_HANDLER_PANICKED,
                        event_type = %event_type,
                        "event handler panicked"
                    ),
                }
            }
        });

        join_all(runs).await;
    }

    /// Builds the typed envelope from a raw payload and dispatches it.
    #[cfg_attr(not(test), allow(dead_code))]
    pub async fn emit(
        &self,
        event_type: EventType,
        payload: serde_json::Value,
    ) -> Result<(), serde_json::Error> {
        let event = RealtimeEvent::from_parts(event_type, payload)?;
        self.dispatch(event).await;
        Ok(())
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn clear(&self) {
        if let Ok(mut registry) = self.inner.lock() {
            registry.clear();
        }
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn handler_count(&self, event_type: EventType) -> usize {
        self.inner
            .lock()
            .map(|registry| registry.get(&event_type).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    pub fn registered_event_types(&self) -> Vec<EventType> {
        let mut event_types: Vec<EventType> = self
            .inner
            .lock()
            .map(|registry| {
                registry
                    .iter()
                    .filter(|(_, handlers)| !handlers.is_empty())
                    .map(|(event_type, _)| *event_type)
                    .collect()
            })
            .unwrap_or_default();
        event_types.sort();
        event_types
    }

    fn handlers_for(&self, event_type: EventType) -> Vec<EventHandler> {
        self.inner
            .lock()
            .map(|registry| registry.get(&event_type).cloned().unwrap_or_default())
            .unwrap_or_default()
    }
}

fn same_handler(left: &EventHandler, right: &EventHandler) -> bool {
    std::ptr::eq(
        Arc::as_ptr(left) as *const (),
        Arc::as_ptr(right) as *const (),
    )
}
