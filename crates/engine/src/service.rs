//! `DepotService` — the engine's entry points for external collaborators.
//!
//! Wires the store, resolver, monitor, and aggregator behind one struct,
//! checks one permission per operation, and runs the eager monitor hook
//! after every mutation that can change a schema's FREE count.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use depot_alerts::{AlertBus, Subscription};
use depot_auth::{Principal, permissions};
use depot_catalog::SchemaSource;
use depot_core::{EngineError, EngineResult, InventoryId, SchemaId, UnitId};
use depot_ledger::UnitStatus;

use crate::monitor::{SweepStats, ThresholdMonitor};
use crate::report::{InventoryStateReport, ReportAggregator};
use crate::resolver::{OrderLine, OrderResolver, OrderResult};
use crate::store::{DepotStore, EngineConfig};

pub struct DepotService {
    store: Arc<DepotStore>,
    resolver: OrderResolver,
    monitor: Arc<ThresholdMonitor>,
    aggregator: ReportAggregator,
    bus: Arc<dyn AlertBus>,
}

impl DepotService {
    pub fn new(
        catalog: Arc<dyn SchemaSource>,
        bus: Arc<dyn AlertBus>,
        config: EngineConfig,
    ) -> Self {
        let store = Arc::new(DepotStore::new(catalog, config));
        let monitor = Arc::new(ThresholdMonitor::new(store.clone(), bus.clone()));

        Self {
            resolver: OrderResolver::new(store.clone()),
            aggregator: ReportAggregator::new(store.clone()),
            monitor,
            store,
            bus,
        }
    }

    /// Registry and ledger administration happen directly on the store.
    pub fn store(&self) -> &Arc<DepotStore> {
        &self.store
    }

    pub fn monitor(&self) -> &Arc<ThresholdMonitor> {
        &self.monitor
    }

    /// Subscribe the notifier collaborator to the alert stream.
    pub fn subscribe_alerts(&self) -> Subscription {
        self.bus.subscribe()
    }

    /// Resolve and reserve a fulfillment request.
    pub fn submit_order(
        &self,
        principal: &Principal,
        lines: &[OrderLine],
    ) -> EngineResult<OrderResult> {
        require(principal, permissions::ORDERS_SUBMIT)?;

        let now = Utc::now();
        let result = self.resolver.submit(lines, now)?;
        info!(
            principal = %principal.id,
            units = result.reserved_unit_ids.len(),
            "order reserved"
        );

        self.sweep_for_units(&result.reserved_unit_ids, now);
        Ok(result)
    }

    /// Cancel reservations, returning units to stock.
    pub fn release_units(&self, principal: &Principal, unit_ids: &[UnitId]) -> EngineResult<()> {
        require(principal, permissions::ORDERS_RELEASE)?;

        let now = Utc::now();
        self.resolver.release(unit_ids, now)?;
        self.sweep_for_units(unit_ids, now);
        Ok(())
    }

    /// Consume reserved units (order fulfilled/shipped).
    pub fn consume_units(&self, principal: &Principal, unit_ids: &[UnitId]) -> EngineResult<()> {
        require(principal, permissions::ORDERS_SUBMIT)?;

        let now = Utc::now();
        for unit_id in unit_ids {
            self.store
                .transition_unit(*unit_id, UnitStatus::Reserved, UnitStatus::Consumed, now)?;
        }
        self.sweep_for_units(unit_ids, now);
        Ok(())
    }

    /// Admit `quantity` new units of a schema into an inventory.
    pub fn stock_units(
        &self,
        principal: &Principal,
        schema_id: SchemaId,
        inventory_id: InventoryId,
        quantity: u32,
        expiry: Option<DateTime<Utc>>,
    ) -> EngineResult<Vec<UnitId>> {
        require(principal, permissions::STOCK_RECEIVE)?;

        let now = Utc::now();
        let ids = self
            .store
            .stock_units(schema_id, inventory_id, quantity, expiry, now)?;
        info!(
            principal = %principal.id,
            inventory_id = %inventory_id,
            schema_id = %schema_id,
            quantity,
            "units stocked"
        );

        self.sweep_one(inventory_id, now);
        Ok(ids)
    }

    /// Remove a unit from the ledger entirely (physical disposal).
    pub fn dispose_unit(&self, principal: &Principal, unit_id: UnitId) -> EngineResult<()> {
        require(principal, permissions::STOCK_DISPOSE)?;

        let now = Utc::now();
        let inventory_id = self.store.inventory_of_unit(unit_id)?;
        self.store.remove_unit(unit_id)?;
        self.sweep_one(inventory_id, now);
        Ok(())
    }

    /// Depot-wide capacity and stock-state snapshot.
    pub fn snapshot(&self, principal: &Principal) -> EngineResult<InventoryStateReport> {
        require(principal, permissions::REPORTS_READ)?;
        self.aggregator.snapshot(Utc::now())
    }

    /// Full monitor sweep. Invoked by the scheduler collaborator; not
    /// permission-gated because it carries no caller-visible data.
    pub fn sweep(&self) -> EngineResult<SweepStats> {
        self.monitor.sweep(Utc::now())
    }

    /// Eager monitor hook: sweep every inventory touched by a mutation.
    /// Failures are logged, never propagated — alerting must not fail the
    /// mutation that triggered it.
    fn sweep_for_units(&self, unit_ids: &[UnitId], now: DateTime<Utc>) {
        let mut inventories: BTreeSet<InventoryId> = BTreeSet::new();
        for unit_id in unit_ids {
            match self.store.inventory_of_unit(*unit_id) {
                Ok(inventory_id) => {
                    inventories.insert(inventory_id);
                }
                Err(err) => {
                    warn!(unit_id = %unit_id, error = %err, "eager sweep could not locate unit")
                }
            }
        }
        for inventory_id in inventories {
            self.sweep_one(inventory_id, now);
        }
    }

    fn sweep_one(&self, inventory_id: InventoryId, now: DateTime<Utc>) {
        if let Err(err) = self.monitor.sweep_inventory(inventory_id, now) {
            warn!(inventory_id = %inventory_id, error = %err, "eager sweep failed");
        }
    }
}

fn require(principal: &Principal, permission: &'static str) -> EngineResult<()> {
    if principal.can_str(permission) {
        Ok(())
    } else {
        Err(EngineError::Unauthorized)
    }
}
