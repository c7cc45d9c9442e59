//! Endpoints
//!
//! An [`Endpoint`] is everything an adaptor declares about one resource
//! type: the serializer, the contract for each supported operation kind,
//! and how updates are sent.

use std::collections::BTreeMap;
use std::sync::Arc;

use ledger_contract::Contract;
use ledger_resource::ResourceSchema;
use ledger_serializer::SerializerDefinition;

use crate::ConfigurationError;
use crate::operation::OperationKind;

/// How an update payload is built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateStrategy {
    /// Send changed fields only
    #[default]
    Partial,
    /// Fetch the record, then send changed fields merged over every value
    /// the serializer does not map
    Full,
}

/// One resource type as served by one adaptor
#[derive(Debug, Clone)]
pub struct Endpoint {
    serializer: Arc<SerializerDefinition>,
    contracts: BTreeMap<OperationKind, Arc<Contract>>,
    update_strategy: UpdateStrategy,
}

impl Endpoint {
    #[must_use]
    pub fn new(serializer: SerializerDefinition) -> Self {
        Self::shared(Arc::new(serializer))
    }

    #[must_use]
    pub fn shared(serializer: Arc<SerializerDefinition>) -> Self {
        Self {
            serializer,
            contracts: BTreeMap::new(),
            update_strategy: UpdateStrategy::default(),
        }
    }

    /// Support `kind`, validating with `contract`
    #[must_use]
    pub fn supports(mut self, kind: OperationKind, contract: Contract) -> Self {
        self.contracts.insert(kind, Arc::new(contract));
        self
    }

    /// Replace the serializer, keeping contracts and update strategy.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::ResourceMismatch`] when `serializer` is
    /// bound to another resource type.
    pub fn with_serializer(mut self, serializer: Arc<SerializerDefinition>) -> crate::Result<Self> {
        let found = serializer.schema().type_name();
        if found != self.resource_type() {
            return Err(ConfigurationError::ResourceMismatch {
                expected: self.resource_type().to_string(),
                found: found.to_string(),
            });
        }
        self.serializer = serializer;
        Ok(self)
    }

    #[must_use]
    pub fn with_update_strategy(mut self, update_strategy: UpdateStrategy) -> Self {
        self.update_strategy = update_strategy;
        self
    }

    #[must_use]
    pub fn schema(&self) -> &'static ResourceSchema {
        self.serializer.schema()
    }

    #[must_use]
    pub fn resource_type(&self) -> &str {
        self.serializer.schema().type_name()
    }

    #[must_use]
    pub fn serializer(&self) -> &Arc<SerializerDefinition> {
        &self.serializer
    }

    #[must_use]
    pub fn contract(&self, kind: OperationKind) -> Option<&Arc<Contract>> {
        self.contracts.get(&kind)
    }

    /// Supported kinds, in declaration order of [`OperationKind`]
    pub fn kinds(&self) -> impl Iterator<Item = OperationKind> + '_ {
        self.contracts.keys().copied()
    }

    #[must_use]
    pub fn update_strategy(&self) -> UpdateStrategy {
        self.update_strategy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_contract::{FieldRule, FieldType};
    use ledger_resource::types::{account, department};

    fn department_serializer(name: &str) -> Arc<SerializerDefinition> {
        Arc::new(
            SerializerDefinition::builder(department())
                .id("Id")
                .attribute(name, "name")
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_kinds_follow_declared_contracts() {
        let endpoint = Endpoint::shared(department_serializer("Name"))
            .supports(OperationKind::Update, Contract::new("department.update"))
            .supports(
                OperationKind::Create,
                Contract::new("department.create").rule(FieldRule::required("name").filled(FieldType::String)),
            );

        let kinds: Vec<OperationKind> = endpoint.kinds().collect();
        assert_eq!(kinds, [OperationKind::Create, OperationKind::Update]);
        assert!(endpoint.contract(OperationKind::Delete).is_none());
        assert_eq!(endpoint.update_strategy(), UpdateStrategy::Partial);
    }

    #[test]
    fn test_with_serializer_keeps_contracts() {
        let endpoint = Endpoint::shared(department_serializer("Name"))
            .supports(OperationKind::Find, Contract::new("department.find"))
            .with_update_strategy(UpdateStrategy::Full)
            .with_serializer(department_serializer("DepartmentName"))
            .unwrap();

        assert!(endpoint.contract(OperationKind::Find).is_some());
        assert_eq!(endpoint.update_strategy(), UpdateStrategy::Full);
        assert_eq!(endpoint.serializer().mappings()[1].external().to_string(), "DepartmentName");
    }

    #[test]
    fn test_with_serializer_rejects_other_types() {
        let accounts = Arc::new(SerializerDefinition::builder(account()).id("Id").build().unwrap());
        let result = Endpoint::shared(department_serializer("Name")).with_serializer(accounts);

        assert_eq!(
            result.err(),
            Some(ConfigurationError::ResourceMismatch {
                expected: "department".to_string(),
                found: "account".to_string(),
            })
        );
    }
}
