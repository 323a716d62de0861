use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use depot_core::{InventoryId, SchemaId, UnitId};

/// Alert classification. Part of the de-duplication identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    LowStock,
    Reorder,
    Expiring,
}

/// De-duplication identity of an alert condition.
///
/// One alert per key is outstanding at a time; the key clears once the
/// underlying condition resolves, re-arming emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlertKey {
    pub inventory_id: InventoryId,
    pub schema_id: SchemaId,
    pub kind: AlertKind,
}

/// Threshold alert event.
///
/// Ephemeral: produced by the monitor, consumed once by the notifier, not
/// persisted by the engine. Delivery is at-least-once; consumers treat
/// redelivery of the same key as idempotent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertEvent {
    /// FREE count of a schema in an inventory dropped below the configured
    /// low-stock threshold.
    LowStock {
        inventory_id: InventoryId,
        schema_id: SchemaId,
        free_count: u32,
        threshold: u32,
        occurred_at: DateTime<Utc>,
    },
    /// FREE count dropped below the reorder point; carries the configured
    /// replenishment suggestion.
    Reorder {
        inventory_id: InventoryId,
        schema_id: SchemaId,
        free_count: u32,
        threshold: u32,
        reorder_quantity: u32,
        occurred_at: DateTime<Utc>,
    },
    /// Live units in an inventory approach expiry. Batched per inventory,
    /// one event carrying every affected unit.
    Expiring {
        inventory_id: InventoryId,
        unit_ids: Vec<UnitId>,
        window_days: i64,
        occurred_at: DateTime<Utc>,
    },
}

impl AlertEvent {
    pub fn kind(&self) -> AlertKind {
        match self {
            AlertEvent::LowStock { .. } => AlertKind::LowStock,
            AlertEvent::Reorder { .. } => AlertKind::Reorder,
            AlertEvent::Expiring { .. } => AlertKind::Expiring,
        }
    }

    pub fn inventory_id(&self) -> InventoryId {
        match self {
            AlertEvent::LowStock { inventory_id, .. }
            | AlertEvent::Reorder { inventory_id, .. }
            | AlertEvent::Expiring { inventory_id, .. } => *inventory_id,
        }
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            AlertEvent::LowStock { occurred_at, .. }
            | AlertEvent::Reorder { occurred_at, .. }
            | AlertEvent::Expiring { occurred_at, .. } => *occurred_at,
        }
    }
}
