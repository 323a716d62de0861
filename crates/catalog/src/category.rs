use serde::{Deserialize, Serialize};

use depot_core::{CategoryId, EngineError, EngineResult};

/// Product category. Purely a classification axis; no lifecycle
/// interaction with allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    id: CategoryId,
    name: String,
    description: String,
}

impl Category {
    pub fn new(
        id: CategoryId,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> EngineResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(EngineError::validation("category name cannot be empty"));
        }

        Ok(Self {
            id,
            name,
            description: description.into(),
        })
    }

    pub fn id(&self) -> CategoryId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}
