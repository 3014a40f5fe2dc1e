//! In-process event bus
//!
//! Synchronous publish/subscribe: `publish` invokes every handler that was
//! registered when the call started, in registration order, before returning.

use super::ChatEvent;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::mpsc;

type Handler = Arc<dyn Fn(&ChatEvent) + Send + Sync>;

#[derive(Default)]
struct BusInner {
    handlers: Mutex<Vec<(u64, Handler)>>,
    next_id: AtomicU64,
    published: AtomicU64,
}

impl BusInner {
    fn remove(&self, id: u64) -> bool {
        let mut handlers = match self.handlers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let before = handlers.len();
        handlers.retain(|(handler_id, _)| *handler_id != id);
        handlers.len() != before
    }
}

/// Event bus shared between the sync core and its consumers
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

/// Handle returned by [`EventBus::subscribe`].
///
/// Dropping the handle leaves the handler registered; call
/// [`Subscription::unsubscribe`] to remove it.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    bus: Weak<BusInner>,
}

impl Subscription {
    /// Remove the handler. Safe to call more than once, from inside a handler,
    /// or after the bus is gone. Returns whether a handler was removed.
    pub fn unsubscribe(&self) -> bool {
        match self.bus.upgrade() {
            Some(inner) => inner.remove(self.id),
            None => false,
        }
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for all subsequent events
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&ChatEvent) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock_handlers().push((id, Arc::new(handler)));

        Subscription {
            id,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Forward events into an unbounded channel for async consumers
    pub fn subscribe_channel(&self) -> (Subscription, mpsc::UnboundedReceiver<ChatEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = self.subscribe(move |event| {
            if tx.send(event.clone()).is_err() {
                tracing::trace!("Event receiver dropped");
            }
        });
        (subscription, rx)
    }

    /// Deliver an event to every currently registered handler.
    ///
    /// Returns the number of handlers invoked.
    pub fn publish(&self, event: ChatEvent) -> usize {
        // Handlers run without the lock held so they may subscribe/unsubscribe.
        let handlers: Vec<Handler> = self
            .lock_handlers()
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();

        self.inner.published.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(
            event = event.event_type(),
            handlers = handlers.len(),
            "Publishing event"
        );

        for handler in &handlers {
            handler(&event);
        }
        handlers.len()
    }

    pub fn handler_count(&self) -> usize {
        self.lock_handlers().len()
    }

    /// Total number of events published
    pub fn published_count(&self) -> u64 {
        self.inner.published.load(Ordering::Relaxed)
    }

    /// Remove every handler
    pub fn clear(&self) {
        self.lock_handlers().clear();
    }

    fn lock_handlers(&self) -> std::sync::MutexGuard<'_, Vec<(u64, Handler)>> {
        match self.inner.handlers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("handlers", &self.handler_count())
            .field("published", &self.published_count())
            .finish()
    }
}
