// Named structure registry
//
// Named structures are persisted by name only, so the schema has to be
// registered before any data referencing that name is decoded.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use once_cell::sync::Lazy;
use tracing::debug;

use crate::internal::error::{Error, Result};
use crate::schema::types::StructType;

static GLOBAL: Lazy<SchemaRegistry> = Lazy::new(SchemaRegistry::new);

/// A registry of named structures
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    /// Map of structure names to structures
    schemas: RwLock<HashMap<String, Arc<StructType>>>,
}

impl SchemaRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> &'static SchemaRegistry {
        &GLOBAL
    }

    /// Registers a named structure, replacing any earlier one with the same name.
    pub fn register(&self, st: impl Into<Arc<StructType>>) -> Result<()> {
        let st = st.into();
        let name = st
            .name()
            .ok_or_else(|| Error::validation("Only named structures can be registered"))?
            .to_string();
        let mut schemas = self.schemas.write().unwrap_or_else(PoisonError::into_inner);
        if schemas.insert(name.clone(), st).is_some() {
            debug!(structure = %name, "replaced registered structure");
        } else {
            debug!(structure = %name, "registered structure");
        }
        Ok(())
    }

    /// Gets a structure by name
    pub fn get(&self, name: &str) -> Option<Arc<StructType>> {
        self.schemas
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Gets a structure by name, failing with `UnregisteredStructure`.
    pub fn resolve(&self, name: &str) -> Result<Arc<StructType>> {
        self.get(name).ok_or_else(|| Error::unregistered(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.schemas.read().unwrap_or_else(PoisonError::into_inner).contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .schemas
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}
