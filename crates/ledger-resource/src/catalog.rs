//! Resource catalog
//!
//! Resolves resource type names (as used in mapping files and CLI input) to
//! their static schemas.

use std::collections::HashMap;

use crate::schema::{ResourceSchema, SchemaFn};
use crate::types;

/// Registry of resource schemas keyed by type name
#[derive(Debug, Clone)]
pub struct ResourceCatalog {
    schemas: HashMap<String, SchemaFn>,
}

impl ResourceCatalog {
    /// Create an empty catalog
    #[must_use]
    pub fn new() -> Self {
        Self {
            schemas: HashMap::new(),
        }
    }

    /// Create a catalog holding every built-in resource type
    #[must_use]
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        for schema in types::all() {
            catalog.register(schema);
        }
        catalog
    }

    /// Register a schema under its type name, replacing any previous entry
    pub fn register(&mut self, schema: SchemaFn) {
        let name = schema().type_name().to_string();
        tracing::debug!(resource_type = %name, "registering resource type");
        self.schemas.insert(name, schema);
    }

    /// Get a schema by type name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&'static ResourceSchema> {
        self.schemas.get(name).map(|schema| schema())
    }

    /// Check if a type is registered
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }

    /// Registered type names, sorted
    #[must_use]
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.schemas.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for ResourceCatalog {
    fn default() -> Self {
        Self::new()
    }
}
