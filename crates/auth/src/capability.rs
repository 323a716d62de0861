use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::permissions::{ORDERS_RELEASE, ORDERS_SUBMIT, Permission, REPORTS_READ, STOCK_RECEIVE};

/// The set of permissions granted to a principal.
///
/// Tiers are modeled as capability-set containment, not role inheritance:
/// the supplier set contains the user set, and admin holds the wildcard.
/// A policy layer can also assemble arbitrary sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet {
    permissions: HashSet<Permission>,
}

impl CapabilitySet {
    pub fn empty() -> Self {
        Self {
            permissions: HashSet::new(),
        }
    }

    pub fn from_permissions(permissions: impl IntoIterator<Item = Permission>) -> Self {
        Self {
            permissions: permissions.into_iter().collect(),
        }
    }

    /// Baseline tier: submit orders and read reports.
    pub fn user() -> Self {
        Self::from_permissions([
            Permission::new(ORDERS_SUBMIT),
            Permission::new(REPORTS_READ),
        ])
    }

    /// Supplier tier: everything a user can do, plus stocking and release.
    pub fn supplier() -> Self {
        let mut set = Self::user();
        set.grant(Permission::new(STOCK_RECEIVE));
        set.grant(Permission::new(ORDERS_RELEASE));
        set
    }

    /// Admin tier: wildcard.
    pub fn admin() -> Self {
        Self::from_permissions([Permission::new("*")])
    }

    pub fn grant(&mut self, permission: Permission) {
        self.permissions.insert(permission);
    }

    pub fn allows(&self, permission: &Permission) -> bool {
        self.permissions.contains(permission)
            || self.permissions.iter().any(Permission::is_wildcard)
    }

    pub fn allows_str(&self, permission: &'static str) -> bool {
        self.allows(&Permission::new(permission))
    }
}
