use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use depot_core::{CategoryId, EngineError, EngineResult, SchemaId};

/// Product schema: the SKU definition shared by many physical units.
///
/// Immutable once referenced by any unit. The catalog never hands out
/// mutable access; corrections are modeled as new schemas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSchema {
    id: SchemaId,
    name: String,
    /// Units of storage space one item of this schema consumes.
    footprint: u64,
    category_ids: BTreeSet<CategoryId>,
}

impl ProductSchema {
    pub fn new(
        id: SchemaId,
        name: impl Into<String>,
        footprint: u64,
        category_ids: impl IntoIterator<Item = CategoryId>,
    ) -> EngineResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(EngineError::validation("schema name cannot be empty"));
        }
        if footprint == 0 {
            return Err(EngineError::validation("footprint must be positive"));
        }

        Ok(Self {
            id,
            name,
            footprint,
            category_ids: category_ids.into_iter().collect(),
        })
    }

    pub fn id(&self) -> SchemaId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn footprint(&self) -> u64 {
        self.footprint
    }

    pub fn category_ids(&self) -> &BTreeSet<CategoryId> {
        &self.category_ids
    }

    pub fn is_in_category(&self, category_id: CategoryId) -> bool {
        self.category_ids.contains(&category_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_schema_rejects_empty_name() {
        let err = ProductSchema::new(SchemaId::new(), "   ", 2, []).unwrap_err();
        match err {
            EngineError::Validation(_) => {}
            _ => panic!("Expected Validation error for empty name"),
        }
    }

    #[test]
    fn new_schema_rejects_zero_footprint() {
        let err = ProductSchema::new(SchemaId::new(), "Pallet of bolts", 0, []).unwrap_err();
        match err {
            EngineError::Validation(_) => {}
            _ => panic!("Expected Validation error for zero footprint"),
        }
    }

    #[test]
    fn schema_carries_category_memberships() {
        let cat = CategoryId::new();
        let schema =
            ProductSchema::new(SchemaId::new(), "Pallet of bolts", 2, [cat]).unwrap();

        assert!(schema.is_in_category(cat));
        assert!(!schema.is_in_category(CategoryId::new()));
        assert_eq!(schema.footprint(), 2);
    }
}
