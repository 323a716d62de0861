use serde::{Deserialize, Serialize};

use depot_core::{EngineError, EngineResult, InventoryId, SupplierId};

/// A supplier. Owns exactly one inventory; created and destroyed together
/// with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supplier {
    id: SupplierId,
    name: String,
    contact_email: String,
    inventory_id: InventoryId,
}

impl Supplier {
    pub fn new(
        id: SupplierId,
        name: impl Into<String>,
        contact_email: impl Into<String>,
        inventory_id: InventoryId,
    ) -> EngineResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(EngineError::validation("supplier name cannot be empty"));
        }
        let contact_email = contact_email.into();
        if !contact_email.contains('@') {
            return Err(EngineError::validation("contact email must contain '@'"));
        }

        Ok(Self {
            id,
            name,
            contact_email,
            inventory_id,
        })
    }

    pub fn id(&self) -> SupplierId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contact_email(&self) -> &str {
        &self.contact_email
    }

    pub fn inventory_id(&self) -> InventoryId {
        self.inventory_id
    }
}
