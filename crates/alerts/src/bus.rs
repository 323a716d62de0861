//! Alert publishing/subscription abstraction (mechanics only).
//!
//! The bus is the **transport layer** for alerts after the monitor decides
//! to raise them. It is intentionally lightweight:
//!
//! - **Transport-agnostic**: in-memory channels here; a broker elsewhere.
//! - **At-least-once delivery**: the same de-duplication key may be
//!   redelivered; notifiers must be idempotent per key.
//! - **No persistence**: the bus distributes, it does not store. Alert
//!   history, if wanted, is a downstream consumer's concern.
//!
//! Emission is fire-and-forget relative to the mutation that triggered it:
//! a mutation's success never waits on alert delivery.

use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::time::Duration;

use crate::alert::AlertEvent;

/// A subscription to the alert stream.
///
/// Each subscription gets a copy of every alert published after it was
/// created (broadcast semantics). Designed for single-threaded consumption:
/// one notifier task per subscription.
#[derive(Debug)]
pub struct Subscription {
    receiver: Receiver<AlertEvent>,
}

impl Subscription {
    pub fn new(receiver: Receiver<AlertEvent>) -> Self {
        Self { receiver }
    }

    /// Block until the next alert is available.
    pub fn recv(&self) -> Result<AlertEvent, std::sync::mpsc::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an alert without blocking.
    pub fn try_recv(&self) -> Result<AlertEvent, std::sync::mpsc::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for an alert.
    pub fn recv_timeout(
        &self,
        timeout: Duration,
    ) -> Result<AlertEvent, std::sync::mpsc::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Drain everything currently queued without blocking.
    pub fn drain(&self) -> Vec<AlertEvent> {
        let mut out = Vec::new();
        while let Ok(alert) = self.receiver.try_recv() {
            out.push(alert);
        }
        out
    }
}

#[derive(Debug)]
pub enum AlertBusError {
    /// Publish failed due to internal lock poisoning.
    Poisoned,
}

impl core::fmt::Display for AlertBusError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            AlertBusError::Poisoned => f.write_str("alert bus lock poisoned"),
        }
    }
}

impl std::error::Error for AlertBusError {}

/// Alert pub/sub contract.
///
/// Implementations must be safe to share across threads; mutations on many
/// inventories publish concurrently.
pub trait AlertBus: Send + Sync {
    fn publish(&self, alert: AlertEvent) -> Result<(), AlertBusError>;

    fn subscribe(&self) -> Subscription;
}

impl<B> AlertBus for Arc<B>
where
    B: AlertBus + ?Sized,
{
    fn publish(&self, alert: AlertEvent) -> Result<(), AlertBusError> {
        (**self).publish(alert)
    }

    fn subscribe(&self) -> Subscription {
        (**self).subscribe()
    }
}
