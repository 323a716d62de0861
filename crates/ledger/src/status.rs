use serde::{Deserialize, Serialize};

/// Unit lifecycle status.
///
/// Allowed transitions:
/// - `Free -> Reserved` (claimed by an order)
/// - `Reserved -> Free` (order cancelled, unit released back to stock)
/// - `Reserved -> Consumed` (order fulfilled/shipped; terminal)
/// - `Free -> Expired` (expiry reached before reservation; terminal)
///
/// No transition exits `Consumed` or `Expired`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitStatus {
    Free,
    Reserved,
    Consumed,
    Expired,
}

impl UnitStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            UnitStatus::Free => "free",
            UnitStatus::Reserved => "reserved",
            UnitStatus::Consumed => "consumed",
            UnitStatus::Expired => "expired",
        }
    }

    /// Terminal statuses admit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, UnitStatus::Consumed | UnitStatus::Expired)
    }

    /// Whether a unit in this status occupies inventory space.
    ///
    /// Terminal units are excluded from capacity.
    pub fn counts_against_capacity(self) -> bool {
        matches!(self, UnitStatus::Free | UnitStatus::Reserved)
    }

    /// The allowed-transition table.
    pub fn can_transition_to(self, to: UnitStatus) -> bool {
        matches!(
            (self, to),
            (UnitStatus::Free, UnitStatus::Reserved)
                | (UnitStatus::Reserved, UnitStatus::Free)
                | (UnitStatus::Reserved, UnitStatus::Consumed)
                | (UnitStatus::Free, UnitStatus::Expired)
        )
    }
}

impl core::fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
