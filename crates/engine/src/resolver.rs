//! Order resolution: one order line in, a reservation of exactly
//! `quantity` FREE units out, or a failure with no state change.
//!
//! Selection and reservation happen under the candidate inventories' locks
//! (read-then-act inside one isolation boundary), so two concurrent orders
//! can never both believe the same unit is available.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use depot_core::{EngineError, EngineResult, InventoryId, SchemaId, UnitId};
use depot_ledger::UnitStatus;

use crate::store::{DepotStore, InventoryCell};

/// Which identifying fields an order line populates selects the strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderAddress {
    /// One specific unit. Quantity must be 1.
    Unit { unit_id: UnitId },
    /// Any FREE units of the named schema, across all inventories,
    /// oldest-created first.
    Schema { schema_name: String },
    /// As `Schema`, constrained to the named supplier's inventory.
    SupplierSchema {
        supplier_name: String,
        schema_name: String,
    },
}

/// One line of a fulfillment request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub address: OrderAddress,
    pub quantity: u32,
}

/// Successful submission: the concrete units now RESERVED for the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderResult {
    pub reserved_unit_ids: Vec<UnitId>,
}

/// Translates order lines into concrete unit reservations.
pub struct OrderResolver {
    store: Arc<DepotStore>,
}

impl OrderResolver {
    pub fn new(store: Arc<DepotStore>) -> Self {
        Self { store }
    }

    /// Reserve every line of a submission, or nothing.
    ///
    /// Lines reserve one at a time; when a later line fails, earlier lines
    /// are rolled back before the error returns.
    pub fn submit(&self, lines: &[OrderLine], now: DateTime<Utc>) -> EngineResult<OrderResult> {
        if lines.is_empty() {
            return Err(EngineError::invalid_order("order has no lines"));
        }

        let mut reserved_unit_ids: Vec<UnitId> = Vec::new();
        for line in lines {
            match self.resolve_line(line, now) {
                Ok(ids) => reserved_unit_ids.extend(ids),
                Err(err) => {
                    self.rollback(&reserved_unit_ids, now);
                    return Err(err);
                }
            }
        }

        debug!(units = reserved_unit_ids.len(), lines = lines.len(), "order reserved");
        Ok(OrderResult { reserved_unit_ids })
    }

    /// Release reserved units back to stock (order cancellation). Released
    /// units re-enter FIFO eligibility with their original creation time.
    pub fn release(&self, unit_ids: &[UnitId], now: DateTime<Utc>) -> EngineResult<()> {
        for unit_id in unit_ids {
            self.store
                .transition_unit(*unit_id, UnitStatus::Reserved, UnitStatus::Free, now)?;
        }
        Ok(())
    }

    /// Resolve one line atomically: exactly `quantity` units move
    /// FREE -> RESERVED, or the line fails with no state change.
    pub fn resolve_line(&self, line: &OrderLine, now: DateTime<Utc>) -> EngineResult<Vec<UnitId>> {
        if line.quantity == 0 {
            return Err(EngineError::invalid_order("quantity must be at least 1"));
        }

        match &line.address {
            OrderAddress::Unit { unit_id } => {
                if line.quantity != 1 {
                    return Err(EngineError::invalid_order(
                        "a single unit id cannot yield more than one unit",
                    ));
                }
                self.reserve_by_unit_id(*unit_id, now)
            }
            OrderAddress::Schema { schema_name } => {
                let schema = self.store.catalog().schema_by_name(schema_name)?;
                let cells = self.store.cells_snapshot()?;
                self.reserve_from_cells(&cells, schema.id(), line.quantity, now)
            }
            OrderAddress::SupplierSchema {
                supplier_name,
                schema_name,
            } => {
                let schema = self.store.catalog().schema_by_name(schema_name)?;
                let supplier = self.store.supplier_by_name(supplier_name)?;
                let inventory_id = supplier.inventory_id();
                let cell = self.store.cell(inventory_id)?;
                self.reserve_from_cells(&[(inventory_id, cell)], schema.id(), line.quantity, now)
            }
        }
    }

    fn reserve_by_unit_id(&self, unit_id: UnitId, now: DateTime<Utc>) -> EngineResult<Vec<UnitId>> {
        let inventory_id = self.store.inventory_of_unit(unit_id)?;
        let cell = self.store.cell(inventory_id)?;
        let mut state = self.store.lock_cell(&cell)?;

        let Some(unit) = state.units.get_mut(&unit_id) else {
            self.store.index_remove(&[unit_id])?;
            return Err(EngineError::UnitNotFound(unit_id));
        };
        if unit.status() != UnitStatus::Free {
            return Err(EngineError::insufficient_stock(1, 0));
        }

        unit.transition(UnitStatus::Free, UnitStatus::Reserved, now)?;
        Ok(vec![unit_id])
    }

    /// Select and reserve FIFO winners with every candidate inventory lock
    /// held. `cells` must already be in canonical id order (see
    /// `DepotStore::cells_snapshot`).
    fn reserve_from_cells(
        &self,
        cells: &[(InventoryId, Arc<InventoryCell>)],
        schema_id: SchemaId,
        quantity: u32,
        now: DateTime<Utc>,
    ) -> EngineResult<Vec<UnitId>> {
        let mut guards = Vec::with_capacity(cells.len());
        for (_, cell) in cells {
            guards.push(self.store.lock_cell(cell)?);
        }

        let mut candidates: Vec<(DateTime<Utc>, UnitId, usize)> = Vec::new();
        for (guard_idx, guard) in guards.iter().enumerate() {
            for unit in guard.units.values() {
                if unit.schema_id() == schema_id && unit.status() == UnitStatus::Free {
                    candidates.push((unit.created_at(), unit.id(), guard_idx));
                }
            }
        }

        let available = candidates.len() as u32;
        if available < quantity {
            return Err(EngineError::insufficient_stock(quantity, available));
        }

        // FIFO tie-break: oldest-created first, unit id for determinism.
        candidates.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));

        let mut reserved: Vec<(UnitId, usize)> = Vec::with_capacity(quantity as usize);
        for (_, unit_id, guard_idx) in candidates.into_iter().take(quantity as usize) {
            let result = guards[guard_idx]
                .units
                .get_mut(&unit_id)
                .ok_or(EngineError::UnitNotFound(unit_id))
                .and_then(|unit| {
                    unit.transition(UnitStatus::Free, UnitStatus::Reserved, now)
                });

            if let Err(err) = result {
                // Candidates were verified FREE under these same locks, so
                // this is unreachable in practice; undo anyway rather than
                // leave a partial line.
                for (prev_id, prev_idx) in &reserved {
                    if let Some(unit) = guards[*prev_idx].units.get_mut(prev_id) {
                        let _ = unit.transition(UnitStatus::Reserved, UnitStatus::Free, now);
                    }
                }
                return Err(err);
            }
            reserved.push((unit_id, guard_idx));
        }

        Ok(reserved.into_iter().map(|(id, _)| id).collect())
    }

    fn rollback(&self, unit_ids: &[UnitId], now: DateTime<Utc>) {
        for unit_id in unit_ids {
            if let Err(err) =
                self.store
                    .transition_unit(*unit_id, UnitStatus::Reserved, UnitStatus::Free, now)
            {
                error!(unit_id = %unit_id, error = %err, "order rollback failed to release unit");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use depot_catalog::{InMemoryCatalog, ProductSchema};
    use depot_core::SchemaId;
    use depot_ledger::ThresholdConfig;

    use crate::store::EngineConfig;

    use super::*;

    struct Fixture {
        store: Arc<DepotStore>,
        resolver: OrderResolver,
        schema_id: SchemaId,
        acme_inventory: InventoryId,
        globex_inventory: InventoryId,
    }

    fn setup() -> Fixture {
        let catalog = Arc::new(InMemoryCatalog::new());
        let schema = ProductSchema::new(SchemaId::new(), "Pallet of bolts", 1, []).unwrap();
        let schema_id = schema.id();
        catalog.register_schema(schema).unwrap();

        let store = Arc::new(DepotStore::new(catalog, EngineConfig::default()));
        let acme = store
            .register_supplier("Acme", "ops@acme.example", 100, ThresholdConfig::default())
            .unwrap();
        let globex = store
            .register_supplier("Globex", "ops@globex.example", 100, ThresholdConfig::default())
            .unwrap();

        Fixture {
            resolver: OrderResolver::new(store.clone()),
            store,
            schema_id,
            acme_inventory: acme.inventory_id(),
            globex_inventory: globex.inventory_id(),
        }
    }

    fn line(address: OrderAddress, quantity: u32) -> OrderLine {
        OrderLine { address, quantity }
    }

    #[test]
    fn by_schema_reserves_oldest_units_first() {
        let f = setup();
        let base = Utc::now();

        let mut staggered = Vec::new();
        for offset in 0..3 {
            let created = base + chrono::Duration::seconds(offset);
            let ids = f
                .store
                .stock_units(f.schema_id, f.acme_inventory, 1, None, created)
                .unwrap();
            staggered.push(ids[0]);
        }

        let result = f
            .resolver
            .submit(
                &[line(
                    OrderAddress::Schema {
                        schema_name: "Pallet of bolts".to_string(),
                    },
                    2,
                )],
                base + chrono::Duration::seconds(10),
            )
            .unwrap();

        // The two oldest-created units win; the newest stays free.
        assert_eq!(result.reserved_unit_ids, staggered[..2].to_vec());
        assert_eq!(
            f.store.unit(staggered[2]).unwrap().status(),
            UnitStatus::Free
        );
    }

    #[test]
    fn by_schema_spans_inventories() {
        let f = setup();
        let now = Utc::now();
        f.store
            .stock_units(f.schema_id, f.acme_inventory, 1, None, now)
            .unwrap();
        f.store
            .stock_units(f.schema_id, f.globex_inventory, 1, None, now)
            .unwrap();

        let result = f
            .resolver
            .submit(
                &[line(
                    OrderAddress::Schema {
                        schema_name: "Pallet of bolts".to_string(),
                    },
                    2,
                )],
                now,
            )
            .unwrap();
        assert_eq!(result.reserved_unit_ids.len(), 2);
    }

    #[test]
    fn insufficient_stock_reserves_nothing() {
        let f = setup();
        let now = Utc::now();
        let ids = f
            .store
            .stock_units(f.schema_id, f.acme_inventory, 2, None, now)
            .unwrap();

        let err = f
            .resolver
            .submit(
                &[line(
                    OrderAddress::Schema {
                        schema_name: "Pallet of bolts".to_string(),
                    },
                    3,
                )],
                now,
            )
            .unwrap_err();
        assert_eq!(err, EngineError::insufficient_stock(3, 2));

        for id in ids {
            assert_eq!(f.store.unit(id).unwrap().status(), UnitStatus::Free);
        }
    }

    #[test]
    fn by_unit_id_requires_quantity_one() {
        let f = setup();
        let now = Utc::now();
        let ids = f
            .store
            .stock_units(f.schema_id, f.acme_inventory, 1, None, now)
            .unwrap();

        let err = f
            .resolver
            .submit(&[line(OrderAddress::Unit { unit_id: ids[0] }, 2)], now)
            .unwrap_err();
        match err {
            EngineError::InvalidOrderRequest(_) => {}
            _ => panic!("Expected InvalidOrderRequest for quantity > 1"),
        }
        assert_eq!(f.store.unit(ids[0]).unwrap().status(), UnitStatus::Free);
    }

    #[test]
    fn by_unit_id_reserves_exactly_that_unit() {
        let f = setup();
        let now = Utc::now();
        let ids = f
            .store
            .stock_units(f.schema_id, f.acme_inventory, 2, None, now)
            .unwrap();

        let result = f
            .resolver
            .submit(&[line(OrderAddress::Unit { unit_id: ids[1] }, 1)], now)
            .unwrap();
        assert_eq!(result.reserved_unit_ids, vec![ids[1]]);
        assert_eq!(f.store.unit(ids[0]).unwrap().status(), UnitStatus::Free);

        // An already-reserved unit is no longer eligible.
        let err = f
            .resolver
            .submit(&[line(OrderAddress::Unit { unit_id: ids[1] }, 1)], now)
            .unwrap_err();
        assert_eq!(err, EngineError::insufficient_stock(1, 0));
    }

    #[test]
    fn by_supplier_and_schema_stays_inside_that_inventory() {
        let f = setup();
        let now = Utc::now();
        f.store
            .stock_units(f.schema_id, f.acme_inventory, 1, None, now)
            .unwrap();
        let globex_ids = f
            .store
            .stock_units(f.schema_id, f.globex_inventory, 3, None, now)
            .unwrap();

        // Acme only holds one free unit: two cannot be served from it even
        // though the depot as a whole has four.
        let err = f
            .resolver
            .submit(
                &[line(
                    OrderAddress::SupplierSchema {
                        supplier_name: "Acme".to_string(),
                        schema_name: "Pallet of bolts".to_string(),
                    },
                    2,
                )],
                now,
            )
            .unwrap_err();
        assert_eq!(err, EngineError::insufficient_stock(2, 1));

        let result = f
            .resolver
            .submit(
                &[line(
                    OrderAddress::SupplierSchema {
                        supplier_name: "Globex".to_string(),
                        schema_name: "Pallet of bolts".to_string(),
                    },
                    2,
                )],
                now,
            )
            .unwrap();
        for id in &result.reserved_unit_ids {
            assert!(globex_ids.contains(id));
        }
    }

    #[test]
    fn unknown_schema_or_supplier_is_not_found() {
        let f = setup();
        let now = Utc::now();

        let err = f
            .resolver
            .submit(
                &[line(
                    OrderAddress::Schema {
                        schema_name: "ghost".to_string(),
                    },
                    1,
                )],
                now,
            )
            .unwrap_err();
        assert_eq!(err, EngineError::NotFound);

        let err = f
            .resolver
            .submit(
                &[line(
                    OrderAddress::SupplierSchema {
                        supplier_name: "Ghost Corp".to_string(),
                        schema_name: "Pallet of bolts".to_string(),
                    },
                    1,
                )],
                now,
            )
            .unwrap_err();
        assert_eq!(err, EngineError::NotFound);
    }

    #[test]
    fn failing_line_rolls_back_earlier_lines() {
        let f = setup();
        let now = Utc::now();
        let ids = f
            .store
            .stock_units(f.schema_id, f.acme_inventory, 2, None, now)
            .unwrap();

        let err = f
            .resolver
            .submit(
                &[
                    line(
                        OrderAddress::Schema {
                            schema_name: "Pallet of bolts".to_string(),
                        },
                        2,
                    ),
                    line(
                        OrderAddress::Schema {
                            schema_name: "Pallet of bolts".to_string(),
                        },
                        1,
                    ),
                ],
                now,
            )
            .unwrap_err();
        assert_eq!(err, EngineError::insufficient_stock(1, 0));

        // The first line's reservations were undone.
        for id in ids {
            assert_eq!(f.store.unit(id).unwrap().status(), UnitStatus::Free);
        }
    }

    #[test]
    fn released_units_rejoin_fifo_eligibility() {
        let f = setup();
        let now = Utc::now();
        let ids = f
            .store
            .stock_units(f.schema_id, f.acme_inventory, 1, None, now)
            .unwrap();

        let result = f
            .resolver
            .submit(&[line(OrderAddress::Unit { unit_id: ids[0] }, 1)], now)
            .unwrap();
        f.resolver.release(&result.reserved_unit_ids, now).unwrap();
        assert_eq!(f.store.unit(ids[0]).unwrap().status(), UnitStatus::Free);

        // Reservable again.
        f.resolver
            .submit(&[line(OrderAddress::Unit { unit_id: ids[0] }, 1)], now)
            .unwrap();
    }

    #[test]
    fn empty_submission_is_invalid() {
        let f = setup();
        let err = f.resolver.submit(&[], Utc::now()).unwrap_err();
        match err {
            EngineError::InvalidOrderRequest(_) => {}
            _ => panic!("Expected InvalidOrderRequest for empty submission"),
        }
    }
}
