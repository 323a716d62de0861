//! Read-only roll-up of capacity and stock state across the depot.
//!
//! Pure read path: takes each inventory's snapshot under the same lock the
//! mutation paths use, produces no state. An unresolvable schema reference
//! is referential corruption and fails the whole report; rows are never
//! silently skipped.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use depot_core::{EngineError, EngineResult, InventoryId, SchemaId, SupplierId};
use depot_ledger::UnitStatus;

use crate::store::DepotStore;

/// Per-schema unit counts grouped by status within one inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaStockReport {
    pub schema_id: SchemaId,
    pub schema_name: String,
    pub free: u32,
    pub reserved: u32,
    pub consumed: u32,
    pub expired: u32,
}

/// One inventory's capacity and stock state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryReport {
    pub inventory_id: InventoryId,
    pub supplier_id: SupplierId,
    pub supplier_name: String,
    pub used_space: u64,
    pub max_available_space: u64,
    pub schemas: Vec<SchemaStockReport>,
}

/// Depot-wide snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryStateReport {
    pub generated_at: DateTime<Utc>,
    pub total_used_space: u64,
    pub total_max_available_space: u64,
    pub inventories: Vec<InventoryReport>,
}

/// Builds `InventoryStateReport` snapshots.
pub struct ReportAggregator {
    store: Arc<DepotStore>,
}

impl ReportAggregator {
    pub fn new(store: Arc<DepotStore>) -> Self {
        Self { store }
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> EngineResult<InventoryStateReport> {
        let mut report = InventoryStateReport {
            generated_at: now,
            total_used_space: 0,
            total_max_available_space: 0,
            inventories: Vec::new(),
        };

        for (inventory_id, cell) in self.store.cells_snapshot()? {
            // One consistent snapshot per inventory; never unit-by-unit.
            let state = self.store.lock_cell(&cell)?;

            let supplier = self.store.supplier(state.inventory.supplier_id())?;

            let mut counts: BTreeMap<SchemaId, (u32, u32, u32, u32)> = BTreeMap::new();
            for unit in state.units.values() {
                let entry = counts.entry(unit.schema_id()).or_default();
                match unit.status() {
                    UnitStatus::Free => entry.0 += 1,
                    UnitStatus::Reserved => entry.1 += 1,
                    UnitStatus::Consumed => entry.2 += 1,
                    UnitStatus::Expired => entry.3 += 1,
                }
            }

            let mut schemas = Vec::with_capacity(counts.len());
            for (schema_id, (free, reserved, consumed, expired)) in counts {
                let schema = self.store.catalog().schema(schema_id).map_err(|_| {
                    EngineError::integrity(format!(
                        "inventory {inventory_id} holds units of unresolvable schema {schema_id}"
                    ))
                })?;
                schemas.push(SchemaStockReport {
                    schema_id,
                    schema_name: schema.name().to_string(),
                    free,
                    reserved,
                    consumed,
                    expired,
                });
            }

            report.total_used_space += state.inventory.used_space();
            report.total_max_available_space += state.inventory.max_available_space();
            report.inventories.push(InventoryReport {
                inventory_id,
                supplier_id: supplier.id(),
                supplier_name: supplier.name().to_string(),
                used_space: state.inventory.used_space(),
                max_available_space: state.inventory.max_available_space(),
                schemas,
            });
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use depot_catalog::{InMemoryCatalog, ProductSchema};
    use depot_ledger::ThresholdConfig;

    use crate::store::EngineConfig;

    use super::*;

    #[test]
    fn snapshot_rolls_up_totals_and_per_schema_counts() {
        let catalog = Arc::new(InMemoryCatalog::new());
        let bolts = ProductSchema::new(SchemaId::new(), "Pallet of bolts", 2, []).unwrap();
        let apples = ProductSchema::new(SchemaId::new(), "Crate of apples", 1, []).unwrap();
        let bolts_id = bolts.id();
        let apples_id = apples.id();
        catalog.register_schema(bolts).unwrap();
        catalog.register_schema(apples).unwrap();

        let store = Arc::new(DepotStore::new(catalog, EngineConfig::default()));
        let acme = store
            .register_supplier("Acme", "ops@acme.example", 20, ThresholdConfig::default())
            .unwrap();
        let globex = store
            .register_supplier("Globex", "ops@globex.example", 30, ThresholdConfig::default())
            .unwrap();

        let now = Utc::now();
        let bolt_ids = store
            .stock_units(bolts_id, acme.inventory_id(), 3, None, now)
            .unwrap();
        store
            .stock_units(apples_id, acme.inventory_id(), 2, None, now)
            .unwrap();
        store
            .stock_units(apples_id, globex.inventory_id(), 4, None, now)
            .unwrap();

        store
            .transition_unit(bolt_ids[0], UnitStatus::Free, UnitStatus::Reserved, now)
            .unwrap();
        store
            .transition_unit(bolt_ids[0], UnitStatus::Reserved, UnitStatus::Consumed, now)
            .unwrap();

        let aggregator = ReportAggregator::new(store.clone());
        let report = aggregator.snapshot(now).unwrap();

        // Acme: 2 live bolts (4) + 2 apples (2) = 6. Globex: 4 apples = 4.
        assert_eq!(report.total_used_space, 10);
        assert_eq!(report.total_max_available_space, 50);
        assert_eq!(report.inventories.len(), 2);

        let acme_report = report
            .inventories
            .iter()
            .find(|r| r.inventory_id == acme.inventory_id())
            .unwrap();
        assert_eq!(acme_report.supplier_name, "Acme");
        assert_eq!(acme_report.used_space, 6);

        let bolts_row = acme_report
            .schemas
            .iter()
            .find(|s| s.schema_id == bolts_id)
            .unwrap();
        assert_eq!(bolts_row.free, 2);
        assert_eq!(bolts_row.reserved, 0);
        assert_eq!(bolts_row.consumed, 1);
        assert_eq!(bolts_row.expired, 0);
    }

    #[test]
    fn empty_depot_produces_an_empty_report() {
        let catalog = Arc::new(InMemoryCatalog::new());
        let store = Arc::new(DepotStore::new(catalog, EngineConfig::default()));
        let report = ReportAggregator::new(store).snapshot(Utc::now()).unwrap();

        assert_eq!(report.total_used_space, 0);
        assert_eq!(report.total_max_available_space, 0);
        assert!(report.inventories.is_empty());
    }
}
