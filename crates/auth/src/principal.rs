use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::capability::CapabilitySet;
use crate::permissions::Permission;

/// Identity of an authenticated principal (human user, service account, etc).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(Uuid);

impl PrincipalId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PrincipalId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<Uuid> for PrincipalId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl From<PrincipalId> for Uuid {
    fn from(value: PrincipalId) -> Self {
        value.0
    }
}

impl FromStr for PrincipalId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// An already-authenticated caller and the permissions granted to it.
///
/// This is an authorization boundary object: the engine checks it at entry
/// points and otherwise never inspects identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: PrincipalId,
    pub capabilities: CapabilitySet,
}

impl Principal {
    pub fn new(id: PrincipalId, capabilities: CapabilitySet) -> Self {
        Self { id, capabilities }
    }

    pub fn can(&self, permission: &Permission) -> bool {
        self.capabilities.allows(permission)
    }

    pub fn can_str(&self, permission: &'static str) -> bool {
        self.capabilities.allows_str(permission)
    }
}
