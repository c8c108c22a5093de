use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::debug;

/// "Authentication required" notification emitted by the request pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRequired {
    /// API path of the request the server rejected.
    pub path: String,
    /// Credential epoch the rejected request was sent with.
    pub epoch: u64,
}

/// Explicit subscriber list for [`AuthRequired`] notifications.
///
/// Every subscriber that is live when an event fires gets its own copy,
/// however far behind it is. Order across subscribers is unspecified and
/// a subscriber that registers late never sees earlier events. Listeners
/// must tolerate the same failure being reported more than once.
#[derive(Clone, Default)]
pub struct AuthEvents {
    subscribers: Arc<Mutex<Vec<mpsc::UnboundedSender<AuthRequired>>>>,
}

impl AuthEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<AuthRequired> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(tx);
        rx
    }

    /// Fire and forget. Returns how many subscribers accepted the event.
    pub fn notify(&self, event: AuthRequired) -> usize {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subscribers.retain(|tx| !tx.is_closed());

        let mut delivered = 0;
        for tx in subscribers.iter() {
            // Fails only if the receiver was dropped since the prune.
            if tx.send(event.clone()).is_ok() {
                delivered += 1;
            }
        }
        debug!(path = %event.path, delivered, "Broadcast authentication required");
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subscribers.retain(|tx| !tx.is_closed());
        subscribers.len()
    }
}
