use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier.
///
/// Permissions are modeled as opaque strings (e.g. "orders.submit").
/// A special wildcard permission `"*"` can be used by policy layers to
/// indicate "allow all" without hardcoding domain permissions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Submit fulfillment orders.
pub const ORDERS_SUBMIT: &str = "orders.submit";
/// Release reserved units back to stock (order cancellation).
pub const ORDERS_RELEASE: &str = "orders.release";
/// Stock new units into an inventory.
pub const STOCK_RECEIVE: &str = "stock.receive";
/// Remove units from the ledger (physical disposal).
pub const STOCK_DISPOSE: &str = "stock.dispose";
/// Read depot-wide state snapshots.
pub const REPORTS_READ: &str = "reports.read";
