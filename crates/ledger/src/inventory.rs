use serde::{Deserialize, Serialize};

use depot_core::{EngineError, EngineResult, InventoryId, SupplierId};

/// Alerting thresholds configured per inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// Absolute FREE-unit count below which "low stock" fires per schema.
    pub low_stock_alert_threshold: u32,
    /// Days-until-expiry window for expiry alerts.
    pub expiry_alert_threshold_days: i64,
    /// Absolute FREE-unit count below which a reorder alert fires.
    pub reorder_threshold: u32,
    /// Suggested replenishment count. Informational only.
    pub reorder_quantity: u32,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            low_stock_alert_threshold: 5,
            expiry_alert_threshold_days: 7,
            reorder_threshold: 3,
            reorder_quantity: 10,
        }
    }
}

/// One supplier's capacity partition of the depot.
///
/// `used_space` is a derived counter: it must always equal the summed
/// footprints of the inventory's FREE and RESERVED units. Only the engine's
/// ledger operations mutate it, transactionally with the unit mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    id: InventoryId,
    supplier_id: SupplierId,
    max_available_space: u64,
    used_space: u64,
    thresholds: ThresholdConfig,
}

impl Inventory {
    pub fn new(
        id: InventoryId,
        supplier_id: SupplierId,
        max_available_space: u64,
        thresholds: ThresholdConfig,
    ) -> EngineResult<Self> {
        if max_available_space == 0 {
            return Err(EngineError::validation(
                "max_available_space must be positive",
            ));
        }

        Ok(Self {
            id,
            supplier_id,
            max_available_space,
            used_space: 0,
            thresholds,
        })
    }

    pub fn id(&self) -> InventoryId {
        self.id
    }

    pub fn supplier_id(&self) -> SupplierId {
        self.supplier_id
    }

    pub fn max_available_space(&self) -> u64 {
        self.max_available_space
    }

    pub fn used_space(&self) -> u64 {
        self.used_space
    }

    pub fn remaining_space(&self) -> u64 {
        self.max_available_space - self.used_space
    }

    pub fn thresholds(&self) -> &ThresholdConfig {
        &self.thresholds
    }

    /// Claim `amount` units of space.
    ///
    /// Rejected whole with `CapacityExceeded` when the claim would push
    /// `used_space` past the ceiling; no partial claim is recorded.
    pub fn reserve_space(&mut self, amount: u64) -> EngineResult<()> {
        let remaining = self.remaining_space();
        if amount > remaining {
            return Err(EngineError::capacity_exceeded(amount, remaining));
        }
        self.used_space += amount;
        Ok(())
    }

    /// Return `amount` units of space.
    ///
    /// Releasing more than is used means the derived counter has drifted
    /// from the ledger; surfaced as `DataIntegrity` rather than clamped.
    pub fn release_space(&mut self, amount: u64) -> EngineResult<()> {
        if amount > self.used_space {
            return Err(EngineError::integrity(format!(
                "release of {amount} exceeds used space {} in inventory {}",
                self.used_space, self.id
            )));
        }
        self.used_space -= amount;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_inventory(max: u64) -> Inventory {
        Inventory::new(
            InventoryId::new(),
            SupplierId::new(),
            max,
            ThresholdConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = Inventory::new(
            InventoryId::new(),
            SupplierId::new(),
            0,
            ThresholdConfig::default(),
        )
        .unwrap_err();
        match err {
            EngineError::Validation(_) => {}
            _ => panic!("Expected Validation error for zero capacity"),
        }
    }

    #[test]
    fn reserve_up_to_ceiling_then_reject() {
        let mut inv = test_inventory(10);
        inv.reserve_space(4).unwrap();
        inv.reserve_space(6).unwrap();
        assert_eq!(inv.used_space(), 10);
        assert_eq!(inv.remaining_space(), 0);

        let err = inv.reserve_space(1).unwrap_err();
        assert_eq!(err, EngineError::capacity_exceeded(1, 0));
        // Rejection left the counter untouched.
        assert_eq!(inv.used_space(), 10);
    }

    #[test]
    fn release_restores_space() {
        let mut inv = test_inventory(10);
        inv.reserve_space(6).unwrap();
        inv.release_space(4).unwrap();
        assert_eq!(inv.used_space(), 2);
        assert_eq!(inv.remaining_space(), 8);
    }

    #[test]
    fn over_release_is_a_data_integrity_error() {
        let mut inv = test_inventory(10);
        inv.reserve_space(2).unwrap();

        let err = inv.release_space(3).unwrap_err();
        match err {
            EngineError::DataIntegrity(_) => {}
            _ => panic!("Expected DataIntegrity for over-release"),
        }
    }

    #[cfg(test)]
    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 512,
                ..ProptestConfig::default()
            })]

            /// Property: no sequence of reserve/release calls can push
            /// used_space past the ceiling or below zero.
            #[test]
            fn used_space_stays_within_bounds(
                max in 1u64..1_000,
                ops in proptest::collection::vec((any::<bool>(), 1u64..100), 0..64)
            ) {
                let mut inv = Inventory::new(
                    InventoryId::new(),
                    SupplierId::new(),
                    max,
                    ThresholdConfig::default(),
                ).unwrap();

                for (is_reserve, amount) in ops {
                    let before = inv.used_space();
                    let result = if is_reserve {
                        inv.reserve_space(amount)
                    } else {
                        inv.release_space(amount)
                    };
                    if result.is_err() {
                        prop_assert_eq!(inv.used_space(), before);
                    }
                    prop_assert!(inv.used_space() <= inv.max_available_space());
                }
            }
        }
    }
}
