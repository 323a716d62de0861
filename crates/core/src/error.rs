//! Engine error model.

use thiserror::Error;

use crate::id::UnitId;

/// Result type used across the engine.
pub type EngineResult<T> = Result<T, EngineError>;

/// Engine-level error.
///
/// Keep this focused on deterministic, business/domain failures (capacity,
/// lifecycle, allocation, validation). Transport concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Admitting the unit(s) would push used space past the inventory ceiling.
    /// The operation is fully rejected; no partial state change.
    #[error("capacity exceeded: requested {requested} space, {available} available")]
    CapacityExceeded { requested: u64, available: u64 },

    /// A unit status change not in the allowed transition table, or whose
    /// `from` status no longer matches (optimistic check failed).
    #[error("invalid transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    /// An order line could not be fully satisfied. The whole line is
    /// rejected; nothing is reserved.
    #[error("insufficient stock: requested {requested} unit(s), {available} free")]
    InsufficientStock { requested: u32, available: u32 },

    /// Malformed or ambiguous order addressing.
    #[error("invalid order request: {0}")]
    InvalidOrderRequest(String),

    /// A referenced unit does not exist.
    #[error("unit not found: {0}")]
    UnitNotFound(UnitId),

    /// A referenced entity (schema, supplier, inventory) is absent.
    #[error("not found")]
    NotFound,

    /// Bounded lock wait expired. Retryable: callers are expected to
    /// resubmit.
    #[error("contention: {0}")]
    Contention(String),

    /// Referential corruption detected during a read. Fatal to the
    /// operation; surfaced, never silently repaired.
    #[error("data integrity: {0}")]
    DataIntegrity(String),

    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A conflict occurred (e.g. duplicate registration, live dependents).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Principal lacks the permission this entry point requires.
    #[error("unauthorized")]
    Unauthorized,
}

impl EngineError {
    pub fn capacity_exceeded(requested: u64, available: u64) -> Self {
        Self::CapacityExceeded {
            requested,
            available,
        }
    }

    pub fn invalid_transition(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::InvalidTransition {
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn insufficient_stock(requested: u32, available: u32) -> Self {
        Self::InsufficientStock {
            requested,
            available,
        }
    }

    pub fn invalid_order(msg: impl Into<String>) -> Self {
        Self::InvalidOrderRequest(msg.into())
    }

    pub fn contention(msg: impl Into<String>) -> Self {
        Self::Contention(msg.into())
    }

    pub fn integrity(msg: impl Into<String>) -> Self {
        Self::DataIntegrity(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }

    /// Whether a caller should retry the operation as-is.
    ///
    /// Only lock contention qualifies; every other kind needs corrected
    /// input or operator intervention.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Contention(_))
    }
}
