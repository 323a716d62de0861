//! `depot-alerts` — threshold alert events and their delivery channel.
//!
//! Alerts are plain tagged-variant messages pushed onto an explicit bus
//! consumed by a notifier task; emission is decoupled from delivery
//! technology.

pub mod alert;
pub mod bus;
pub mod in_memory_bus;

pub use alert::{AlertEvent, AlertKey, AlertKind};
pub use bus::{AlertBus, AlertBusError, Subscription};
pub use in_memory_bus::InMemoryAlertBus;
