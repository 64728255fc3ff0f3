use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::protocol::{EventKind, MonitorEvent};

/// One attached consumer: its channel plus the event kinds it wants.
/// `kinds: None` means the full stream.
struct Subscription {
    tx: flume::Sender<MonitorEvent>,
    kinds: Option<Vec<EventKind>>,
}

impl Subscription {
    fn wants(&self, kind: EventKind) -> bool {
        self.kinds.as_ref().is_none_or(|kinds| kinds.contains(&kind))
    }
}

/// Fan-out bus for monitor events.
///
/// Components publish their lifecycle events here; consumers attach either to
/// the whole stream ([`subscribe`](EventBus::subscribe)) or to just the kinds
/// they act on ([`subscribe_to`](EventBus::subscribe_to)). Filtered-out
/// events are dropped at publish time, never queued. The bus is thread-safe
/// and clones cheaply; there is no process-wide instance: every monitoring
/// stack constructs its own and hands clones to its components.
#[derive(Clone)]
pub struct EventBus {
    subscriptions: Arc<Mutex<Vec<Subscription>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscriptions: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Attach a consumer receiving every event published from now on.
    pub fn subscribe(&self) -> flume::Receiver<MonitorEvent> {
        self.attach(None)
    }

    /// Attach a consumer receiving only events of the listed kinds.
    pub fn subscribe_to(&self, kinds: &[EventKind]) -> flume::Receiver<MonitorEvent> {
        self.attach(Some(kinds.to_vec()))
    }

    fn attach(&self, kinds: Option<Vec<EventKind>>) -> flume::Receiver<MonitorEvent> {
        let (tx, rx) = flume::unbounded();
        self.subscriptions
            .lock()
            .expect("EventBus lock poisoned")
            .push(Subscription { tx, kinds });
        rx
    }

    /// Deliver `event` to every subscription interested in its kind.
    ///
    /// Subscriptions whose receiver has been dropped are pruned, whether or
    /// not they matched this event.
    pub fn publish(&self, event: MonitorEvent) {
        let kind = event.kind();
        let mut subscriptions = self.subscriptions.lock().expect("EventBus lock poisoned");
        let before = subscriptions.len();
        subscriptions.retain(|sub| {
            if sub.tx.is_disconnected() {
                return false;
            }
            !sub.wants(kind) || sub.tx.send(event.clone()).is_ok()
        });
        let pruned = before - subscriptions.len();
        if pruned > 0 {
            debug!(pruned, "dead bus subscriptions removed");
        }
    }

    /// Return the number of currently attached subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscriptions
            .lock()
            .expect("EventBus lock poisoned")
            .len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
