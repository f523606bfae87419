use parking_lot::RwLock;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::warn;

use super::types::OrchestratorEvent;

/// Callback invoked synchronously for every published event.
pub type EventListener = Arc<dyn Fn(&OrchestratorEvent) + Send + Sync>;

/// Handle returned by [`EventBus::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Fan-out channel for orchestrator events.
///
/// Listeners run synchronously on the publishing task, in subscription order.
/// A panicking listener is isolated: the remaining listeners still receive the
/// event and the publisher never observes the panic. Every event is also sent
/// to a broadcast channel for async consumers that prefer a receiver.
pub struct EventBus {
    listeners: RwLock<Vec<(SubscriptionId, EventListener)>>,
    next_id: AtomicU64,
    sender: broadcast::Sender<OrchestratorEvent>,
}

impl EventBus {
    /// Create a bus whose broadcast tap buffers `capacity` events per receiver.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            listeners: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            sender,
        }
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&OrchestratorEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, Arc::new(listener)));
        id
    }

    /// Returns `false` when the subscription was already removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Async receiver of every event published after this call.
    pub fn receiver(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.sender.subscribe()
    }

    /// Deliver `event` to all listeners, then to broadcast receivers.
    ///
    /// Listener panics are logged when `log_failures` is set.
    pub fn publish(&self, event: OrchestratorEvent, log_failures: bool) {
        // Snapshot so listeners may (un)subscribe while being called.
        let listeners: Vec<(SubscriptionId, EventListener)> = self.listeners.read().clone();

        for (id, listener) in listeners {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| listener(&event))) {
                if log_failures {
                    warn!(
                        subscription = id.0,
                        event_type = event.kind().as_str(),
                        error = %panic_message(panic.as_ref()),
                        "Event listener panicked"
                    );
                }
            }
        }

        // No receivers is fine: the tap is optional.
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .field("receivers", &self.sender.receiver_count())
            .finish()
    }
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
