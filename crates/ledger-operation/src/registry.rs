//! Operation registry
//!
//! Maps `(adaptor, resource type, kind)` to the endpoint serving it, so
//! callers can build an operation from a resource without naming its
//! concrete type.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use ledger_resource::Resource;

use crate::adaptor::Adaptor;
use crate::endpoint::Endpoint;
use crate::kinds::{Create, Delete, Find, Update};
use crate::operation::{Operation, OperationKind};
use crate::{ConfigurationError, Result};

/// Registry lookup key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegistryKey {
    pub adaptor: String,
    pub resource_type: String,
    pub kind: OperationKind,
}

impl RegistryKey {
    pub fn new(adaptor: impl Into<String>, resource_type: impl Into<String>, kind: OperationKind) -> Self {
        Self {
            adaptor: adaptor.into(),
            resource_type: resource_type.into(),
            kind,
        }
    }
}

impl fmt::Display for RegistryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}::{}", self.adaptor, self.resource_type, self.kind)
    }
}

/// Thread-safe table of registered endpoints
#[derive(Debug, Default)]
pub struct OperationRegistry {
    endpoints: DashMap<RegistryKey, Arc<Endpoint>>,
}

impl OperationRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `endpoint` for every kind it declares a contract for.
    /// Re-registering a key replaces the previous endpoint.
    pub fn register(&self, adaptor: &str, endpoint: Endpoint) {
        let endpoint = Arc::new(endpoint);
        for kind in endpoint.kinds() {
            let key = RegistryKey::new(adaptor, endpoint.resource_type(), kind);
            tracing::debug!(%key, "registering operation");
            if self.endpoints.insert(key, Arc::clone(&endpoint)).is_some() {
                tracing::warn!(adaptor, resource_type = endpoint.resource_type(), %kind, "replaced registered operation");
            }
        }
    }

    #[must_use]
    pub fn contains(&self, adaptor: &str, resource_type: &str, kind: OperationKind) -> bool {
        self.endpoints
            .contains_key(&RegistryKey::new(adaptor, resource_type, kind))
    }

    #[must_use]
    pub fn endpoint(&self, adaptor: &str, resource_type: &str, kind: OperationKind) -> Option<Arc<Endpoint>> {
        self.endpoints
            .get(&RegistryKey::new(adaptor, resource_type, kind))
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Registered keys, sorted
    #[must_use]
    pub fn keys(&self) -> Vec<RegistryKey> {
        let mut keys: Vec<RegistryKey> = self.endpoints.iter().map(|entry| entry.key().clone()).collect();
        keys.sort_by(|a, b| {
            (&a.adaptor, &a.resource_type, a.kind).cmp(&(&b.adaptor, &b.resource_type, b.kind))
        });
        keys
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Build the `kind` operation for `resource` on `adaptor`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::UnknownOperation`] when nothing is
    /// registered for the key.
    pub fn new_operation(
        &self,
        adaptor: Arc<dyn Adaptor>,
        kind: OperationKind,
        resource: Resource,
    ) -> Result<Box<dyn Operation>> {
        let endpoint = self
            .endpoint(adaptor.name(), resource.type_name(), kind)
            .ok_or_else(|| ConfigurationError::UnknownOperation {
                adaptor: adaptor.name().to_string(),
                resource_type: resource.type_name().to_string(),
                kind,
            })?;

        let operation: Box<dyn Operation> = match kind {
            OperationKind::Create => Box::new(Create::new(adaptor, &endpoint, resource)?),
            OperationKind::Find => Box::new(Find::new(adaptor, &endpoint, resource)?),
            OperationKind::Update => Box::new(Update::new(adaptor, &endpoint, resource)?),
            OperationKind::Delete => Box::new(Delete::new(adaptor, &endpoint, resource)?),
        };
        Ok(operation)
    }
}
