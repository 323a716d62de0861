//! Depot state and the per-inventory serialization boundary.
//!
//! Each inventory is the unit of mutual exclusion: capacity mutation, unit
//! status transition, and order-line resolution against one inventory are
//! serialized on that inventory's cell lock. Lock waits are bounded; expiry
//! surfaces as a retryable `Contention` error instead of blocking callers
//! indefinitely.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, TryLockError};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::debug;

use depot_catalog::SchemaSource;
use depot_core::{EngineError, EngineResult, InventoryId, SchemaId, SupplierId, UnitId};
use depot_ledger::{Inventory, Supplier, ThresholdConfig, Unit, UnitStatus};

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Bound on a single inventory lock wait before `Contention` is raised.
    pub lock_timeout: Duration,
    /// Pause between lock attempts while waiting.
    pub lock_retry_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_millis(250),
            lock_retry_interval: Duration::from_millis(1),
        }
    }
}

/// Everything guarded by one inventory's lock: the capacity counters and
/// the unit ledger entries assigned to it.
#[derive(Debug)]
pub(crate) struct InventoryState {
    pub(crate) inventory: Inventory,
    pub(crate) units: BTreeMap<UnitId, Unit>,
}

#[derive(Debug)]
pub(crate) struct InventoryCell {
    pub(crate) state: Mutex<InventoryState>,
}

#[derive(Default)]
struct Registry {
    inventories: BTreeMap<InventoryId, Arc<InventoryCell>>,
    suppliers: HashMap<SupplierId, Supplier>,
    supplier_ids_by_name: HashMap<String, SupplierId>,
}

/// In-memory depot store.
///
/// The per-inventory unit maps are the source of truth; the `UnitId ->
/// InventoryId` index is a cache for locating units and is re-checked under
/// the cell lock before use.
pub struct DepotStore {
    catalog: Arc<dyn SchemaSource>,
    config: EngineConfig,
    registry: RwLock<Registry>,
    unit_index: RwLock<HashMap<UnitId, InventoryId>>,
}

impl DepotStore {
    pub fn new(catalog: Arc<dyn SchemaSource>, config: EngineConfig) -> Self {
        Self {
            catalog,
            config,
            registry: RwLock::new(Registry::default()),
            unit_index: RwLock::new(HashMap::new()),
        }
    }

    pub fn catalog(&self) -> &Arc<dyn SchemaSource> {
        &self.catalog
    }

    // ----- supplier / inventory registry -----

    /// Create a supplier together with its inventory.
    pub fn register_supplier(
        &self,
        name: impl Into<String>,
        contact_email: impl Into<String>,
        max_available_space: u64,
        thresholds: ThresholdConfig,
    ) -> EngineResult<Supplier> {
        let name = name.into();
        let supplier_id = SupplierId::new();
        let inventory_id = InventoryId::new();
        let inventory = Inventory::new(inventory_id, supplier_id, max_available_space, thresholds)?;
        let supplier = Supplier::new(supplier_id, name.clone(), contact_email, inventory_id)?;

        let mut registry = self.registry_write()?;
        if registry.supplier_ids_by_name.contains_key(&name) {
            return Err(EngineError::conflict(format!(
                "supplier name '{name}' already registered"
            )));
        }

        registry.inventories.insert(
            inventory_id,
            Arc::new(InventoryCell {
                state: Mutex::new(InventoryState {
                    inventory,
                    units: BTreeMap::new(),
                }),
            }),
        );
        registry.supplier_ids_by_name.insert(name, supplier_id);
        registry.suppliers.insert(supplier_id, supplier.clone());

        debug!(supplier_id = %supplier_id, inventory_id = %inventory_id, "supplier registered");
        Ok(supplier)
    }

    /// Destroy a supplier together with its inventory.
    ///
    /// Rejected while the inventory still holds units; removal may orphan
    /// nothing. Units must be consumed-and-removed or reassigned first.
    pub fn remove_supplier(&self, supplier_id: SupplierId) -> EngineResult<()> {
        let mut registry = self.registry_write()?;
        let supplier = registry
            .suppliers
            .get(&supplier_id)
            .cloned()
            .ok_or(EngineError::NotFound)?;
        let inventory_id = supplier.inventory_id();

        let cell = registry
            .inventories
            .get(&inventory_id)
            .cloned()
            .ok_or_else(|| {
                EngineError::integrity(format!(
                    "supplier {supplier_id} references missing inventory {inventory_id}"
                ))
            })?;

        {
            let state = self.lock_cell(&cell)?;
            if !state.units.is_empty() {
                return Err(EngineError::conflict(format!(
                    "inventory {inventory_id} still holds {} unit(s)",
                    state.units.len()
                )));
            }
        }

        registry.inventories.remove(&inventory_id);
        registry.suppliers.remove(&supplier_id);
        registry
            .supplier_ids_by_name
            .retain(|_, id| *id != supplier_id);

        debug!(supplier_id = %supplier_id, inventory_id = %inventory_id, "supplier removed");
        Ok(())
    }

    pub fn supplier(&self, supplier_id: SupplierId) -> EngineResult<Supplier> {
        let registry = self.registry_read()?;
        registry
            .suppliers
            .get(&supplier_id)
            .cloned()
            .ok_or(EngineError::NotFound)
    }

    pub fn supplier_by_name(&self, name: &str) -> EngineResult<Supplier> {
        let registry = self.registry_read()?;
        let id = registry
            .supplier_ids_by_name
            .get(name)
            .ok_or(EngineError::NotFound)?;
        registry
            .suppliers
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::integrity(format!("supplier name '{name}' dangles")))
    }

    /// Point-in-time copy of one inventory's counters.
    pub fn inventory(&self, inventory_id: InventoryId) -> EngineResult<Inventory> {
        let cell = self.cell(inventory_id)?;
        let state = self.lock_cell(&cell)?;
        Ok(state.inventory.clone())
    }

    /// Point-in-time copy of one unit.
    pub fn unit(&self, unit_id: UnitId) -> EngineResult<Unit> {
        let inventory_id = self.inventory_of_unit(unit_id)?;
        let cell = self.cell(inventory_id)?;
        let state = self.lock_cell(&cell)?;
        state
            .units
            .get(&unit_id)
            .cloned()
            .ok_or(EngineError::UnitNotFound(unit_id))
    }

    // ----- unit ledger operations -----

    /// Create one FREE unit, claiming its schema footprint from the owning
    /// inventory. Atomic: on `CapacityExceeded` nothing changes.
    pub fn add_unit(
        &self,
        schema_id: SchemaId,
        inventory_id: InventoryId,
        expiry: Option<DateTime<Utc>>,
        description: Option<String>,
        now: DateTime<Utc>,
    ) -> EngineResult<Unit> {
        let mut units =
            self.stock_units_inner(schema_id, inventory_id, 1, expiry, description, now)?;
        units.pop().ok_or_else(|| {
            EngineError::integrity("stocking one unit produced an empty batch")
        })
    }

    /// Create `quantity` FREE units in one atomic operation.
    ///
    /// Capacity for the whole batch is checked up front; either every unit
    /// is admitted or none is.
    pub fn stock_units(
        &self,
        schema_id: SchemaId,
        inventory_id: InventoryId,
        quantity: u32,
        expiry: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> EngineResult<Vec<UnitId>> {
        let units = self.stock_units_inner(schema_id, inventory_id, quantity, expiry, None, now)?;
        Ok(units.into_iter().map(|u| u.id()).collect())
    }

    fn stock_units_inner(
        &self,
        schema_id: SchemaId,
        inventory_id: InventoryId,
        quantity: u32,
        expiry: Option<DateTime<Utc>>,
        description: Option<String>,
        now: DateTime<Utc>,
    ) -> EngineResult<Vec<Unit>> {
        if quantity == 0 {
            return Err(EngineError::validation("quantity must be at least 1"));
        }

        let schema = self.catalog.schema(schema_id)?;
        let total_space = schema.footprint() * u64::from(quantity);

        let cell = self.cell(inventory_id)?;
        let mut state = self.lock_cell(&cell)?;

        // Space for the whole batch is claimed in one step: all-or-nothing.
        state.inventory.reserve_space(total_space)?;

        let mut units = Vec::with_capacity(quantity as usize);
        let mut ids = Vec::with_capacity(quantity as usize);
        for _ in 0..quantity {
            let unit = Unit::new(
                UnitId::new(),
                schema_id,
                inventory_id,
                expiry,
                description.clone(),
                now,
            );
            ids.push(unit.id());
            state.units.insert(unit.id(), unit.clone());
            units.push(unit);
        }

        self.index_insert(&ids, inventory_id)?;

        debug!(
            inventory_id = %inventory_id,
            schema_id = %schema_id,
            quantity,
            used_space = state.inventory.used_space(),
            "units stocked"
        );
        Ok(units)
    }

    /// Guarded status change; capacity is released in the same atomic step
    /// when the unit leaves the live statuses.
    pub fn transition_unit(
        &self,
        unit_id: UnitId,
        from: UnitStatus,
        to: UnitStatus,
        now: DateTime<Utc>,
    ) -> EngineResult<Unit> {
        let inventory_id = self.inventory_of_unit(unit_id)?;
        let cell = self.cell(inventory_id)?;
        let mut state = self.lock_cell(&cell)?;

        // The cell's unit map is the source of truth; a stale index entry
        // means the unit is gone.
        let Some(unit) = state.units.get(&unit_id) else {
            self.index_remove(&[unit_id])?;
            return Err(EngineError::UnitNotFound(unit_id));
        };

        // Footprint resolved before mutating so a catalog failure cannot
        // leave a half-applied transition.
        let footprint = self.catalog.schema(unit.schema_id())?.footprint();
        let was_live = unit.status().counts_against_capacity();

        let unit = state
            .units
            .get_mut(&unit_id)
            .ok_or(EngineError::UnitNotFound(unit_id))?;
        unit.transition(from, to, now)?;
        let snapshot = unit.clone();

        if was_live && !snapshot.status().counts_against_capacity() {
            state.inventory.release_space(footprint)?;
        }

        debug!(
            unit_id = %unit_id,
            inventory_id = %inventory_id,
            from = %from,
            to = %to,
            "unit transitioned"
        );
        Ok(snapshot)
    }

    /// Delete a unit from the ledger, releasing its space when it still
    /// counted against capacity.
    pub fn remove_unit(&self, unit_id: UnitId) -> EngineResult<()> {
        let inventory_id = self.inventory_of_unit(unit_id)?;
        let cell = self.cell(inventory_id)?;
        let mut state = self.lock_cell(&cell)?;

        let Some(unit) = state.units.remove(&unit_id) else {
            self.index_remove(&[unit_id])?;
            return Err(EngineError::UnitNotFound(unit_id));
        };

        if unit.status().counts_against_capacity() {
            let footprint = self.catalog.schema(unit.schema_id())?.footprint();
            state.inventory.release_space(footprint)?;
        }
        self.index_remove(&[unit_id])?;

        debug!(unit_id = %unit_id, inventory_id = %inventory_id, "unit removed");
        Ok(())
    }

    /// Re-derive used space from the ledger and compare it to the stored
    /// counter. Drift is corruption, surfaced as `DataIntegrity`.
    pub fn verify_used_space(&self, inventory_id: InventoryId) -> EngineResult<u64> {
        let cell = self.cell(inventory_id)?;
        let state = self.lock_cell(&cell)?;

        let mut derived = 0u64;
        for unit in state.units.values() {
            if unit.status().counts_against_capacity() {
                derived += self.catalog.schema(unit.schema_id())?.footprint();
            }
        }

        let stored = state.inventory.used_space();
        if derived != stored {
            return Err(EngineError::integrity(format!(
                "used space drift in inventory {inventory_id}: counter {stored}, ledger {derived}"
            )));
        }
        Ok(stored)
    }

    // ----- internals shared with resolver/monitor/report -----

    pub(crate) fn cell(&self, inventory_id: InventoryId) -> EngineResult<Arc<InventoryCell>> {
        let registry = self.registry_read()?;
        registry
            .inventories
            .get(&inventory_id)
            .cloned()
            .ok_or(EngineError::NotFound)
    }

    /// All inventory cells in canonical (ascending id) order. Multi-cell
    /// lock acquisition must follow this order to exclude deadlock.
    pub(crate) fn cells_snapshot(
        &self,
    ) -> EngineResult<Vec<(InventoryId, Arc<InventoryCell>)>> {
        let registry = self.registry_read()?;
        Ok(registry
            .inventories
            .iter()
            .map(|(id, cell)| (*id, Arc::clone(cell)))
            .collect())
    }

    /// Bounded-wait lock acquisition for one inventory cell.
    pub(crate) fn lock_cell<'a>(
        &self,
        cell: &'a InventoryCell,
    ) -> EngineResult<MutexGuard<'a, InventoryState>> {
        let deadline = Instant::now() + self.config.lock_timeout;
        loop {
            match cell.state.try_lock() {
                Ok(guard) => return Ok(guard),
                Err(TryLockError::WouldBlock) => {
                    if Instant::now() >= deadline {
                        return Err(EngineError::contention(format!(
                            "inventory lock wait exceeded {:?}",
                            self.config.lock_timeout
                        )));
                    }
                    thread::sleep(self.config.lock_retry_interval);
                }
                Err(TryLockError::Poisoned(_)) => {
                    return Err(EngineError::integrity("inventory lock poisoned"));
                }
            }
        }
    }

    pub(crate) fn inventory_of_unit(&self, unit_id: UnitId) -> EngineResult<InventoryId> {
        let index = self
            .unit_index
            .read()
            .map_err(|_| EngineError::integrity("unit index lock poisoned"))?;
        index
            .get(&unit_id)
            .copied()
            .ok_or(EngineError::UnitNotFound(unit_id))
    }

    fn index_insert(&self, unit_ids: &[UnitId], inventory_id: InventoryId) -> EngineResult<()> {
        let mut index = self
            .unit_index
            .write()
            .map_err(|_| EngineError::integrity("unit index lock poisoned"))?;
        for id in unit_ids {
            index.insert(*id, inventory_id);
        }
        Ok(())
    }

    pub(crate) fn index_remove(&self, unit_ids: &[UnitId]) -> EngineResult<()> {
        let mut index = self
            .unit_index
            .write()
            .map_err(|_| EngineError::integrity("unit index lock poisoned"))?;
        for id in unit_ids {
            index.remove(id);
        }
        Ok(())
    }

    fn registry_read(&self) -> EngineResult<std::sync::RwLockReadGuard<'_, Registry>> {
        self.registry
            .read()
            .map_err(|_| EngineError::integrity("registry lock poisoned"))
    }

    fn registry_write(&self) -> EngineResult<std::sync::RwLockWriteGuard<'_, Registry>> {
        self.registry
            .write()
            .map_err(|_| EngineError::integrity("registry lock poisoned"))
    }
}
