//! Concrete operation kinds

use std::sync::Arc;

use ledger_resource::Resource;

use crate::adaptor::Adaptor;
use crate::endpoint::{Endpoint, UpdateStrategy};
use crate::operation::{Operation, OperationCore, OperationKind, Outcome};
use crate::{DomainError, OperateError};

macro_rules! operation_kind {
    ($(#[$meta:meta])* $name:ident, $kind:expr) => {
        $(#[$meta])*
        pub struct $name {
            core: OperationCore,
        }

        impl $name {
            /// # Errors
            ///
            /// Returns a configuration error when `resource` does not match
            /// the endpoint or the endpoint does not support this kind.
            pub fn new(
                adaptor: Arc<dyn Adaptor>,
                endpoint: &Endpoint,
                resource: Resource,
            ) -> crate::Result<Self> {
                Ok(Self {
                    core: OperationCore::new($kind, adaptor, endpoint, resource)?,
                })
            }
        }
    };
}

operation_kind!(
    /// Sends the full serialization and adopts the ledger's reply, including
    /// the assigned ledger id
    Create,
    OperationKind::Create
);

operation_kind!(
    /// Fetches the record behind the resource's ledger id
    Find,
    OperationKind::Find
);

operation_kind!(
    /// Deletes the record behind the resource's ledger id
    Delete,
    OperationKind::Delete
);

/// Sends the resource's changes to the record behind its ledger id
pub struct Update {
    core: OperationCore,
    strategy: UpdateStrategy,
}

impl Update {
    /// # Errors
    ///
    /// Returns a configuration error when `resource` does not match the
    /// endpoint or the endpoint does not support updates.
    pub fn new(
        adaptor: Arc<dyn Adaptor>,
        endpoint: &Endpoint,
        resource: Resource,
    ) -> crate::Result<Self> {
        Ok(Self {
            core: OperationCore::new(OperationKind::Update, adaptor, endpoint, resource)?,
            strategy: endpoint.update_strategy(),
        })
    }

    #[must_use]
    pub fn strategy(&self) -> UpdateStrategy {
        self.strategy
    }
}

fn required_id(core: &OperationCore) -> Result<String, OperateError> {
    core.resource().ledger_id().map(str::to_string).ok_or_else(|| {
        DomainError::operation(format!(
            "cannot {} a {} without a ledger id",
            core.kind(),
            core.resource_type()
        ))
        .into()
    })
}

impl Operation for Create {
    fn core(&self) -> &OperationCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut OperationCore {
        &mut self.core
    }

    fn operate(&mut self) -> Result<Outcome, OperateError> {
        let core = &self.core;
        let payload = core.serializer().serializer(core.resource())?.to_external(false)?;

        tracing::debug!(resource_type = core.resource_type(), "creating record");
        let response = core.adaptor().create(core.resource_type(), &payload)?;
        let resource = core.absorb(&response)?;

        if resource.ledger_id().is_none() {
            return Ok(Outcome::Failure {
                error: Some(DomainError::operation("ledger assigned no id")),
                response: Some(response),
            });
        }
        Ok(Outcome::Success { resource, response })
    }
}

impl Operation for Find {
    fn core(&self) -> &OperationCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut OperationCore {
        &mut self.core
    }

    /// Without a ledger id there is nothing to look up; the result is a
    /// failure with no error and the ledger is not called.
    fn operate(&mut self) -> Result<Outcome, OperateError> {
        let core = &self.core;
        let Some(id) = core.resource().ledger_id() else {
            tracing::debug!(resource_type = core.resource_type(), "find without ledger id");
            return Ok(Outcome::Failure {
                error: None,
                response: None,
            });
        };

        let response = core.adaptor().find(core.resource_type(), id)?;
        let resource = core.absorb(&response)?;
        Ok(Outcome::Success { resource, response })
    }
}

impl Operation for Update {
    fn core(&self) -> &OperationCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut OperationCore {
        &mut self.core
    }

    /// Changes are taken from the resource as it was when the operation was
    /// built. A `Full` update merges them over the record as last fetched
    /// here, not over the ledger's state at the time of the write.
    fn operate(&mut self) -> Result<Outcome, OperateError> {
        let core = &self.core;
        let id = required_id(core)?;
        let serializer = core
            .serializer()
            .serializer(core.resource())?
            .with_snapshot(core.resource_before_perform());

        let payload = match self.strategy {
            UpdateStrategy::Partial => serializer.to_external(true)?,
            UpdateStrategy::Full => {
                let found = core.adaptor().find(core.resource_type(), &id)?;
                let Some(record) = found.body().and_then(|body| body.as_object()) else {
                    return Ok(Outcome::Failure {
                        error: Some(DomainError::operation("found record has no body to merge")),
                        response: Some(found),
                    });
                };
                serializer.to_external_merged(true, record)?
            }
        };

        tracing::debug!(
            resource_type = core.resource_type(),
            strategy = ?self.strategy,
            keys = payload.len(),
            "updating record"
        );
        let response = core.adaptor().update(core.resource_type(), &id, &payload)?;
        let resource = core.absorb(&response)?;
        Ok(Outcome::Success { resource, response })
    }
}

impl Operation for Delete {
    fn core(&self) -> &OperationCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut OperationCore {
        &mut self.core
    }

    fn operate(&mut self) -> Result<Outcome, OperateError> {
        let core = &self.core;
        let id = required_id(core)?;

        let response = core.adaptor().delete(core.resource_type(), &id)?;
        let resource = core.absorb(&response)?;
        Ok(Outcome::Success { resource, response })
    }
}
