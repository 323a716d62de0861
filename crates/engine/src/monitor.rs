//! Threshold monitoring: low-stock, reorder, and expiry detection with
//! per-key de-duplication.
//!
//! A sweep takes one consistent snapshot per inventory (the same cell lock
//! every mutation uses), then decides and emits alerts after the lock is
//! released — emission is fire-and-forget relative to the mutation that
//! triggered it. The outstanding-key set serializes raise/clear decisions,
//! so ordering per key is monotonic.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use depot_alerts::{AlertBus, AlertEvent, AlertKey, AlertKind};
use depot_core::{EngineError, EngineResult, InventoryId, SchemaId, UnitId};
use depot_ledger::{ThresholdConfig, UnitStatus};

use crate::store::{DepotStore, InventoryCell};

/// Counters for one sweep invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub inventories_scanned: usize,
    pub units_expired: usize,
    pub alerts_emitted: usize,
}

impl SweepStats {
    fn merge(&mut self, other: SweepStats) {
        self.inventories_scanned += other.inventories_scanned;
        self.units_expired += other.units_expired;
        self.alerts_emitted += other.alerts_emitted;
    }
}

/// Scans inventories for threshold crossings and emits de-duplicated
/// alerts. At-least-once: a key whose emission fails is re-armed and
/// retried by the next sweep.
pub struct ThresholdMonitor {
    store: Arc<DepotStore>,
    bus: Arc<dyn AlertBus>,
    outstanding: Mutex<HashSet<AlertKey>>,
}

impl ThresholdMonitor {
    pub fn new(store: Arc<DepotStore>, bus: Arc<dyn AlertBus>) -> Self {
        Self {
            store,
            bus,
            outstanding: Mutex::new(HashSet::new()),
        }
    }

    /// Full scan across every inventory. Invoked by the scheduler
    /// collaborator (periodically and at startup).
    pub fn sweep(&self, now: DateTime<Utc>) -> EngineResult<SweepStats> {
        let mut stats = SweepStats::default();
        for (inventory_id, cell) in self.store.cells_snapshot()? {
            stats.merge(self.sweep_cell(inventory_id, &cell, now)?);
        }
        debug!(
            inventories = stats.inventories_scanned,
            expired = stats.units_expired,
            alerts = stats.alerts_emitted,
            "sweep complete"
        );
        Ok(stats)
    }

    /// Eager scan of one inventory, run immediately after a mutation that
    /// may have changed a schema's FREE count there.
    pub fn sweep_inventory(
        &self,
        inventory_id: InventoryId,
        now: DateTime<Utc>,
    ) -> EngineResult<SweepStats> {
        let cell = self.store.cell(inventory_id)?;
        self.sweep_cell(inventory_id, &cell, now)
    }

    /// Whether an alert condition is currently outstanding (raised and not
    /// yet resolved).
    pub fn is_outstanding(&self, key: &AlertKey) -> bool {
        self.outstanding
            .lock()
            .map(|set| set.contains(key))
            .unwrap_or(false)
    }

    fn sweep_cell(
        &self,
        inventory_id: InventoryId,
        cell: &InventoryCell,
        now: DateTime<Utc>,
    ) -> EngineResult<SweepStats> {
        let mut stats = SweepStats {
            inventories_scanned: 1,
            ..SweepStats::default()
        };

        let thresholds: ThresholdConfig;
        let mut free_counts: BTreeMap<SchemaId, u32> = BTreeMap::new();
        let mut known_schemas: BTreeSet<SchemaId> = BTreeSet::new();
        let mut expiring_units: Vec<UnitId> = Vec::new();
        let mut expiring_schemas: BTreeSet<SchemaId> = BTreeSet::new();

        {
            let mut state = self.store.lock_cell(cell)?;
            thresholds = *state.inventory.thresholds();

            // Units whose expiry is strictly past transition FREE -> EXPIRED
            // and leave capacity, in the same snapshot the counts are taken
            // from.
            let past_due: Vec<(UnitId, SchemaId)> = state
                .units
                .values()
                .filter(|u| u.status() == UnitStatus::Free && u.is_expired_at(now))
                .map(|u| (u.id(), u.schema_id()))
                .collect();
            for (unit_id, schema_id) in past_due {
                let footprint = self
                    .store
                    .catalog()
                    .schema(schema_id)
                    .map_err(|_| {
                        EngineError::integrity(format!(
                            "unit {unit_id} references unresolvable schema {schema_id}"
                        ))
                    })?
                    .footprint();
                let unit = state
                    .units
                    .get_mut(&unit_id)
                    .ok_or(EngineError::UnitNotFound(unit_id))?;
                unit.transition(UnitStatus::Free, UnitStatus::Expired, now)?;
                state.inventory.release_space(footprint)?;
                stats.units_expired += 1;
            }

            for unit in state.units.values() {
                known_schemas.insert(unit.schema_id());
                if unit.status() == UnitStatus::Free {
                    *free_counts.entry(unit.schema_id()).or_default() += 1;
                }
                if unit.expires_within(now, thresholds.expiry_alert_threshold_days) {
                    expiring_units.push(unit.id());
                    expiring_schemas.insert(unit.schema_id());
                }
            }
        }

        let mut outstanding = self
            .outstanding
            .lock()
            .map_err(|_| EngineError::integrity("outstanding alert set poisoned"))?;

        for schema_id in &known_schemas {
            let free = free_counts.get(schema_id).copied().unwrap_or(0);

            let low_key = AlertKey {
                inventory_id,
                schema_id: *schema_id,
                kind: AlertKind::LowStock,
            };
            if free < thresholds.low_stock_alert_threshold {
                if !outstanding.contains(&low_key) {
                    let emitted = self.publish(
                        &mut outstanding,
                        &[low_key],
                        AlertEvent::LowStock {
                            inventory_id,
                            schema_id: *schema_id,
                            free_count: free,
                            threshold: thresholds.low_stock_alert_threshold,
                            occurred_at: now,
                        },
                    );
                    stats.alerts_emitted += usize::from(emitted);
                }
            } else {
                outstanding.remove(&low_key);
            }

            // Reorder is evaluated independently; no ordering is assumed
            // between the two thresholds.
            let reorder_key = AlertKey {
                inventory_id,
                schema_id: *schema_id,
                kind: AlertKind::Reorder,
            };
            if free < thresholds.reorder_threshold {
                if !outstanding.contains(&reorder_key) {
                    let emitted = self.publish(
                        &mut outstanding,
                        &[reorder_key],
                        AlertEvent::Reorder {
                            inventory_id,
                            schema_id: *schema_id,
                            free_count: free,
                            threshold: thresholds.reorder_threshold,
                            reorder_quantity: thresholds.reorder_quantity,
                            occurred_at: now,
                        },
                    );
                    stats.alerts_emitted += usize::from(emitted);
                }
            } else {
                outstanding.remove(&reorder_key);
            }
        }

        // One batched expiry alert per inventory, emitted only when the
        // window gained a schema that was not already outstanding.
        let new_keys: Vec<AlertKey> = expiring_schemas
            .iter()
            .map(|schema_id| AlertKey {
                inventory_id,
                schema_id: *schema_id,
                kind: AlertKind::Expiring,
            })
            .filter(|key| !outstanding.contains(key))
            .collect();
        if !new_keys.is_empty() {
            let emitted = self.publish(
                &mut outstanding,
                &new_keys,
                AlertEvent::Expiring {
                    inventory_id,
                    unit_ids: expiring_units,
                    window_days: thresholds.expiry_alert_threshold_days,
                    occurred_at: now,
                },
            );
            stats.alerts_emitted += usize::from(emitted);
        }

        // Clear keys whose condition is no longer observable: schemas gone
        // from the inventory entirely, or out of the expiry window.
        outstanding.retain(|key| {
            if key.inventory_id != inventory_id {
                return true;
            }
            match key.kind {
                AlertKind::Expiring => expiring_schemas.contains(&key.schema_id),
                AlertKind::LowStock | AlertKind::Reorder => {
                    known_schemas.contains(&key.schema_id)
                }
            }
        });

        Ok(stats)
    }

    /// Mark keys outstanding and publish. A failed publish re-arms the keys
    /// so the next sweep retries (at-least-once).
    fn publish(
        &self,
        outstanding: &mut HashSet<AlertKey>,
        keys: &[AlertKey],
        alert: AlertEvent,
    ) -> bool {
        for key in keys {
            outstanding.insert(*key);
        }
        match self.bus.publish(alert) {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "alert publish failed; keys re-armed");
                for key in keys {
                    outstanding.remove(key);
                }
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use depot_alerts::InMemoryAlertBus;
    use depot_catalog::{InMemoryCatalog, ProductSchema};
    use depot_ledger::ThresholdConfig;

    use crate::store::EngineConfig;

    use super::*;

    struct Fixture {
        store: Arc<DepotStore>,
        monitor: ThresholdMonitor,
        subscription: depot_alerts::Subscription,
        schema_id: SchemaId,
        inventory_id: InventoryId,
    }

    fn setup(thresholds: ThresholdConfig) -> Fixture {
        let catalog = Arc::new(InMemoryCatalog::new());
        let schema = ProductSchema::new(SchemaId::new(), "Crate of apples", 1, []).unwrap();
        let schema_id = schema.id();
        catalog.register_schema(schema).unwrap();

        let store = Arc::new(DepotStore::new(catalog, EngineConfig::default()));
        let supplier = store
            .register_supplier("Acme", "ops@acme.example", 100, thresholds)
            .unwrap();

        let bus = Arc::new(InMemoryAlertBus::new());
        let subscription = bus.subscribe();
        let monitor = ThresholdMonitor::new(store.clone(), bus);

        Fixture {
            store,
            monitor,
            subscription,
            schema_id,
            inventory_id: supplier.inventory_id(),
        }
    }

    fn thresholds(low: u32, reorder: u32) -> ThresholdConfig {
        ThresholdConfig {
            low_stock_alert_threshold: low,
            reorder_threshold: reorder,
            expiry_alert_threshold_days: 7,
            reorder_quantity: 10,
        }
    }

    #[test]
    fn low_stock_raises_once_and_clears_on_restock() {
        let f = setup(thresholds(3, 0));
        let now = Utc::now();
        f.store
            .stock_units(f.schema_id, f.inventory_id, 2, None, now)
            .unwrap();

        f.monitor.sweep(now).unwrap();
        let alerts = f.subscription.drain();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind(), AlertKind::LowStock);

        // Idempotent: nothing new without an intervening mutation.
        f.monitor.sweep(now).unwrap();
        assert!(f.subscription.drain().is_empty());

        // Restock past the threshold clears the key...
        let restock = f
            .store
            .stock_units(f.schema_id, f.inventory_id, 5, None, now)
            .unwrap();
        f.monitor.sweep(now).unwrap();
        assert!(f.subscription.drain().is_empty());
        assert!(!f.monitor.is_outstanding(&AlertKey {
            inventory_id: f.inventory_id,
            schema_id: f.schema_id,
            kind: AlertKind::LowStock,
        }));

        // ...so a later drop below the threshold raises again.
        for id in &restock {
            f.store.remove_unit(*id).unwrap();
        }
        f.monitor.sweep(now).unwrap();
        let alerts = f.subscription.drain();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind(), AlertKind::LowStock);
    }

    #[test]
    fn low_stock_and_reorder_are_independent() {
        let f = setup(thresholds(5, 2));
        let now = Utc::now();
        f.store
            .stock_units(f.schema_id, f.inventory_id, 1, None, now)
            .unwrap();

        f.monitor.sweep(now).unwrap();
        let kinds: Vec<AlertKind> = f.subscription.drain().iter().map(AlertEvent::kind).collect();
        assert!(kinds.contains(&AlertKind::LowStock));
        assert!(kinds.contains(&AlertKind::Reorder));
    }

    #[test]
    fn reorder_carries_the_configured_quantity() {
        let f = setup(thresholds(0, 4));
        let now = Utc::now();
        f.store
            .stock_units(f.schema_id, f.inventory_id, 1, None, now)
            .unwrap();

        f.monitor.sweep(now).unwrap();
        let alerts = f.subscription.drain();
        assert_eq!(alerts.len(), 1);
        match &alerts[0] {
            AlertEvent::Reorder {
                reorder_quantity, ..
            } => assert_eq!(*reorder_quantity, 10),
            other => panic!("Expected Reorder alert, got {other:?}"),
        }
    }

    #[test]
    fn past_expiry_units_transition_and_leave_capacity() {
        let f = setup(thresholds(0, 0));
        let now = Utc::now();
        let ids = f
            .store
            .stock_units(
                f.schema_id,
                f.inventory_id,
                1,
                Some(now - chrono::Duration::days(1)),
                now - chrono::Duration::days(10),
            )
            .unwrap();
        assert_eq!(f.store.inventory(f.inventory_id).unwrap().used_space(), 1);

        let stats = f.monitor.sweep(now).unwrap();
        assert_eq!(stats.units_expired, 1);
        assert_eq!(
            f.store.unit(ids[0]).unwrap().status(),
            UnitStatus::Expired
        );
        assert_eq!(f.store.inventory(f.inventory_id).unwrap().used_space(), 0);
        assert_eq!(f.store.verify_used_space(f.inventory_id).unwrap(), 0);
    }

    #[test]
    fn approaching_expiry_is_batched_and_deduplicated() {
        let f = setup(thresholds(0, 0));
        let now = Utc::now();
        let soon = now + chrono::Duration::days(2);
        let ids = f
            .store
            .stock_units(f.schema_id, f.inventory_id, 3, Some(soon), now)
            .unwrap();

        f.monitor.sweep(now).unwrap();
        let alerts = f.subscription.drain();
        assert_eq!(alerts.len(), 1);
        match &alerts[0] {
            AlertEvent::Expiring { unit_ids, .. } => {
                assert_eq!(unit_ids.len(), 3);
                for id in &ids {
                    assert!(unit_ids.contains(id));
                }
            }
            other => panic!("Expected Expiring alert, got {other:?}"),
        }

        // Same window, same schema: no re-emission.
        f.monitor.sweep(now).unwrap();
        assert!(f.subscription.drain().is_empty());
    }

    #[test]
    fn reserved_units_appear_in_the_expiring_batch_but_never_auto_expire() {
        let f = setup(thresholds(0, 0));
        let now = Utc::now();
        let ids = f
            .store
            .stock_units(
                f.schema_id,
                f.inventory_id,
                1,
                Some(now - chrono::Duration::hours(1)),
                now - chrono::Duration::days(1),
            )
            .unwrap();
        f.store
            .transition_unit(ids[0], UnitStatus::Free, UnitStatus::Reserved, now)
            .unwrap();

        f.monitor.sweep(now).unwrap();
        assert_eq!(f.store.unit(ids[0]).unwrap().status(), UnitStatus::Reserved);

        let alerts = f.subscription.drain();
        assert_eq!(alerts.len(), 1);
        match &alerts[0] {
            AlertEvent::Expiring { unit_ids, .. } => assert_eq!(unit_ids, &ids),
            other => panic!("Expected Expiring alert, got {other:?}"),
        }
    }
}
