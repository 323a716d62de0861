//! `depot-ledger` — unit lifecycle and inventory capacity domain types.
//!
//! Pure domain: no locking, no IO. The engine crate owns serialization
//! boundaries; these types own the invariants.

pub mod inventory;
pub mod status;
pub mod supplier;
pub mod unit;

pub use inventory::{Inventory, ThresholdConfig};
pub use status::UnitStatus;
pub use supplier::Supplier;
pub use unit::Unit;
