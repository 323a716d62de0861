use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use depot_core::{EngineError, EngineResult, InventoryId, SchemaId, UnitId};

use crate::status::UnitStatus;

/// One physical, individually trackable item of a product schema.
///
/// A unit belongs to exactly one inventory at a time; status and inventory
/// membership change together under the owning inventory's serialization
/// boundary (enforced by the engine, not here).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    id: UnitId,
    schema_id: SchemaId,
    inventory_id: InventoryId,
    status: UnitStatus,
    expiry: Option<DateTime<Utc>>,
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Unit {
    /// Create a unit in the initial `Free` status.
    pub fn new(
        id: UnitId,
        schema_id: SchemaId,
        inventory_id: InventoryId,
        expiry: Option<DateTime<Utc>>,
        description: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            schema_id,
            inventory_id,
            status: UnitStatus::Free,
            expiry,
            description,
            created_at,
            updated_at: created_at,
        }
    }

    pub fn id(&self) -> UnitId {
        self.id
    }

    pub fn schema_id(&self) -> SchemaId {
        self.schema_id
    }

    pub fn inventory_id(&self) -> InventoryId {
        self.inventory_id
    }

    pub fn status(&self) -> UnitStatus {
        self.status
    }

    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        self.expiry
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Whether the expiry timestamp is strictly in the past at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry.is_some_and(|e| e < now)
    }

    /// Whether the expiry timestamp falls within `window_days` of `now`
    /// (including already past) while the unit is still live.
    pub fn expires_within(&self, now: DateTime<Utc>, window_days: i64) -> bool {
        if !self.status.counts_against_capacity() {
            return false;
        }
        self.expiry
            .is_some_and(|e| e <= now + chrono::Duration::days(window_days))
    }

    /// Guarded status change.
    ///
    /// `from` must match the current status (optimistic check against lost
    /// updates under concurrent access) and the `from -> to` edge must be in
    /// the allowed table.
    pub fn transition(
        &mut self,
        from: UnitStatus,
        to: UnitStatus,
        at: DateTime<Utc>,
    ) -> EngineResult<()> {
        if self.status != from {
            return Err(EngineError::invalid_transition(
                self.status.as_str(),
                to.as_str(),
            ));
        }
        if !from.can_transition_to(to) {
            return Err(EngineError::invalid_transition(from.as_str(), to.as_str()));
        }

        self.status = to;
        self.updated_at = at;
        Ok(())
    }
}
