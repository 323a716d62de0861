//! Catalog lookup contract and the in-memory implementation.

use std::collections::HashMap;
use std::sync::RwLock;

use depot_core::{CategoryId, EngineError, EngineResult, SchemaId};

use crate::category::Category;
use crate::schema::ProductSchema;

/// Read-side catalog contract consumed by allocation.
///
/// Implementations guarantee schemas are immutable once referenced and
/// referentially intact: a schema id handed to a unit keeps resolving for
/// the unit's whole lifetime.
pub trait SchemaSource: Send + Sync {
    fn schema(&self, id: SchemaId) -> EngineResult<ProductSchema>;

    fn schema_by_name(&self, name: &str) -> EngineResult<ProductSchema>;
}

#[derive(Debug, Default)]
struct CatalogState {
    schemas: HashMap<SchemaId, ProductSchema>,
    schema_ids_by_name: HashMap<String, SchemaId>,
    categories: HashMap<CategoryId, Category>,
}

/// In-memory catalog.
///
/// Intended for tests/dev and single-process deployments. Registration is
/// append-only; there is no update or delete surface.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    inner: RwLock<CatalogState>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_schema(&self, schema: ProductSchema) -> EngineResult<()> {
        let mut state = self
            .inner
            .write()
            .map_err(|_| EngineError::integrity("catalog lock poisoned"))?;

        if state.schemas.contains_key(&schema.id()) {
            return Err(EngineError::conflict(format!(
                "schema {} already registered",
                schema.id()
            )));
        }
        if state.schema_ids_by_name.contains_key(schema.name()) {
            return Err(EngineError::conflict(format!(
                "schema name '{}' already registered",
                schema.name()
            )));
        }

        state
            .schema_ids_by_name
            .insert(schema.name().to_string(), schema.id());
        state.schemas.insert(schema.id(), schema);
        Ok(())
    }

    pub fn register_category(&self, category: Category) -> EngineResult<()> {
        let mut state = self
            .inner
            .write()
            .map_err(|_| EngineError::integrity("catalog lock poisoned"))?;

        if state.categories.contains_key(&category.id()) {
            return Err(EngineError::conflict(format!(
                "category {} already registered",
                category.id()
            )));
        }

        state.categories.insert(category.id(), category);
        Ok(())
    }

    pub fn category(&self, id: CategoryId) -> EngineResult<Category> {
        let state = self
            .inner
            .read()
            .map_err(|_| EngineError::integrity("catalog lock poisoned"))?;

        state.categories.get(&id).cloned().ok_or(EngineError::NotFound)
    }
}

impl SchemaSource for InMemoryCatalog {
    fn schema(&self, id: SchemaId) -> EngineResult<ProductSchema> {
        let state = self
            .inner
            .read()
            .map_err(|_| EngineError::integrity("catalog lock poisoned"))?;

        state.schemas.get(&id).cloned().ok_or(EngineError::NotFound)
    }

    fn schema_by_name(&self, name: &str) -> EngineResult<ProductSchema> {
        let state = self
            .inner
            .read()
            .map_err(|_| EngineError::integrity("catalog lock poisoned"))?;

        let id = state
            .schema_ids_by_name
            .get(name)
            .ok_or(EngineError::NotFound)?;
        state.schemas.get(id).cloned().ok_or_else(|| {
            EngineError::integrity(format!("schema name '{name}' maps to a missing schema"))
        })
    }
}
