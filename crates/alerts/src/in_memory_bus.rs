//! In-memory alert bus for tests/dev and single-process deployments.

use std::sync::{Mutex, mpsc};

use crate::alert::AlertEvent;
use crate::bus::{AlertBus, AlertBusError, Subscription};

/// In-memory pub/sub bus.
///
/// - No IO / no async
/// - Best-effort fan-out
/// - At-least-once acceptable (subscribers must be idempotent per key)
#[derive(Debug, Default)]
pub struct InMemoryAlertBus {
    subscribers: Mutex<Vec<mpsc::Sender<AlertEvent>>>,
}

impl InMemoryAlertBus {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AlertBus for InMemoryAlertBus {
    fn publish(&self, alert: AlertEvent) -> Result<(), AlertBusError> {
        let mut subs = self
            .subscribers
            .lock()
            .map_err(|_| AlertBusError::Poisoned)?;

        // Drop any dead subscribers while publishing.
        subs.retain(|tx| tx.send(alert.clone()).is_ok());

        Ok(())
    }

    fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel();

        // If the lock is poisoned, we still return a subscription;
        // it just won't receive alerts until the process restarts.
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push(tx);
        }

        Subscription::new(rx)
    }
}
