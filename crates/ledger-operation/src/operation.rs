//! Operation lifecycle
//!
//! Every kind implements [`Operation`] on top of a shared [`OperationCore`].
//! [`Operation::perform`] drives the lifecycle:
//!
//! 1. An operation that already ran yields a `Performed` failure without
//!    acting again. The state leaves `Unperformed` before anything else
//!    happens, so this holds on every exit path.
//! 2. Before-operations run in order; the first failure aborts and becomes
//!    the result.
//! 3. The root step runs: the delegated root operation if one is set,
//!    otherwise the kind's own [`Operation::operate`].
//! 4. After-operations run like before-operations.
//!
//! Hooks and the root step update the operation's resource as they go; any
//! outcome other than success puts it back as it was before `perform`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use ledger_contract::{Contract, ValidationResult};
use ledger_resource::Resource;
use ledger_serializer::SerializerDefinition;

use crate::adaptor::Adaptor;
use crate::endpoint::Endpoint;
use crate::response::Response;
use crate::result::{OperationInfo, OperationResult};
use crate::{ConfigurationError, DomainError, OperateError, PerformError};

/// Kind of ledger interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OperationKind {
    Create,
    Find,
    Update,
    Delete,
}

impl OperationKind {
    pub const ALL: [OperationKind; 4] = [Self::Create, Self::Find, Self::Update, Self::Delete];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Find => "find",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Lifecycle state; everything but `Unperformed` counts as performed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperationState {
    #[default]
    Unperformed,
    Performing,
    Succeeded,
    Failed,
}

/// What a kind's concrete action produced
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success {
        resource: Resource,
        response: Response,
    },
    Failure {
        error: Option<DomainError>,
        response: Option<Response>,
    },
}

/// Copies data from a successful sub-operation into the parent's resource
pub type Hook = Box<dyn Fn(&OperationResult, &mut Resource) -> ledger_resource::Result<()> + Send + Sync>;

/// An operation run before or after the root step
pub struct SubOperation {
    operation: Box<dyn Operation>,
    hook: Option<Hook>,
}

impl SubOperation {
    #[must_use]
    pub fn new(operation: Box<dyn Operation>) -> Self {
        Self {
            operation,
            hook: None,
        }
    }

    #[must_use]
    pub fn with_hook(
        mut self,
        hook: impl Fn(&OperationResult, &mut Resource) -> ledger_resource::Result<()>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    #[must_use]
    pub fn operation(&self) -> &dyn Operation {
        self.operation.as_ref()
    }
}

impl From<Box<dyn Operation>> for SubOperation {
    fn from(operation: Box<dyn Operation>) -> Self {
        Self::new(operation)
    }
}

/// State shared by every operation kind
pub struct OperationCore {
    kind: OperationKind,
    adaptor: Arc<dyn Adaptor>,
    serializer: Arc<SerializerDefinition>,
    contract: Arc<Contract>,
    resource: Resource,
    resource_before_perform: Resource,
    before: Vec<SubOperation>,
    root: Option<Box<dyn Operation>>,
    after: Vec<SubOperation>,
    state: OperationState,
    result: Option<OperationResult>,
}

impl OperationCore {
    /// Bind `resource` to `endpoint` for one kind of interaction.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the resource type differs from the
    /// endpoint's or the endpoint declares no contract for `kind`.
    pub fn new(
        kind: OperationKind,
        adaptor: Arc<dyn Adaptor>,
        endpoint: &Endpoint,
        resource: Resource,
    ) -> crate::Result<Self> {
        if resource.type_name() != endpoint.resource_type() {
            return Err(ConfigurationError::ResourceMismatch {
                expected: endpoint.resource_type().to_string(),
                found: resource.type_name().to_string(),
            });
        }
        let contract = endpoint
            .contract(kind)
            .cloned()
            .ok_or_else(|| ConfigurationError::MissingContract {
                resource_type: endpoint.resource_type().to_string(),
                kind,
            })?;

        Ok(Self {
            kind,
            adaptor,
            serializer: Arc::clone(endpoint.serializer()),
            contract,
            resource_before_perform: resource.clone(),
            resource,
            before: Vec::new(),
            root: None,
            after: Vec::new(),
            state: OperationState::Unperformed,
            result: None,
        })
    }

    #[must_use]
    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    #[must_use]
    pub fn adaptor(&self) -> &dyn Adaptor {
        self.adaptor.as_ref()
    }

    #[must_use]
    pub fn serializer(&self) -> &SerializerDefinition {
        &self.serializer
    }

    #[must_use]
    pub fn contract(&self) -> &Contract {
        &self.contract
    }

    #[must_use]
    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    /// The resource as it was when the operation was built
    #[must_use]
    pub fn resource_before_perform(&self) -> &Resource {
        &self.resource_before_perform
    }

    #[must_use]
    pub fn resource_type(&self) -> &str {
        self.resource.type_name()
    }

    #[must_use]
    pub fn info(&self) -> OperationInfo {
        OperationInfo {
            kind: self.kind,
            resource_type: self.resource_type().to_string(),
            adaptor: self.adaptor.name().to_string(),
        }
    }

    /// Copy of the resource updated from a response body, with its changes
    /// accepted. A response without a JSON body leaves the values as they
    /// are.
    ///
    /// # Errors
    ///
    /// Returns an error when the serializer cannot read the body.
    pub fn absorb(&self, response: &Response) -> Result<Resource, OperateError> {
        let mut resource = self.resource.clone();
        if let Some(body) = response.body() {
            self.serializer
                .deserialize_into(&mut resource, body)
                .map_err(|error| OperateError::from(error).with_response(response))?;
        }
        resource.changes_applied();
        Ok(resource)
    }

    fn success(&self, response: Response) -> OperationResult {
        OperationResult::Success {
            operation: self.info(),
            resource: self.resource.clone(),
            response,
        }
    }

    fn failure(&self, error: Option<DomainError>, response: Option<Response>) -> OperationResult {
        OperationResult::Failure {
            operation: self.info(),
            error,
            resource: None,
            response,
        }
    }
}

/// A lifecycle-managed interaction with a ledger
pub trait Operation: Send {
    fn core(&self) -> &OperationCore;

    fn core_mut(&mut self) -> &mut OperationCore;

    /// The kind-specific action, run once as the root step
    ///
    /// # Errors
    ///
    /// Domain errors become failures, transport errors are offered to the
    /// adaptor, configuration errors escape `perform`.
    fn operate(&mut self) -> Result<Outcome, OperateError>;

    fn kind(&self) -> OperationKind {
        self.core().kind()
    }

    fn info(&self) -> OperationInfo {
        self.core().info()
    }

    fn resource(&self) -> &Resource {
        self.core().resource()
    }

    /// The result of the first `perform`, once there is one
    fn result(&self) -> Option<&OperationResult> {
        self.core().result.as_ref()
    }

    fn state(&self) -> OperationState {
        self.core().state
    }

    fn is_performed(&self) -> bool {
        self.core().state != OperationState::Unperformed
    }

    /// Check the resource's wire data against the kind's contract.
    ///
    /// Evaluated fresh on every call; never touches the result.
    fn validate(&self) -> ValidationResult {
        let core = self.core();
        let result = core.contract.validate(&core.resource.wire_data());
        tracing::debug!(operation = %core.info(), valid = result.is_valid(), "validated");
        result
    }

    fn valid(&self) -> bool {
        self.validate().is_valid()
    }

    fn errors(&self) -> BTreeMap<String, Vec<String>> {
        self.validate().into_errors()
    }

    fn add_before_operation(&mut self, operation: SubOperation) {
        self.core_mut().before.push(operation);
    }

    fn add_after_operation(&mut self, operation: SubOperation) {
        self.core_mut().after.push(operation);
    }

    /// Delegate the root step to `operation`; its result becomes this
    /// operation's result.
    fn set_root_operation(&mut self, operation: Box<dyn Operation>) {
        self.core_mut().root = Some(operation);
    }

    /// Run the operation once.
    ///
    /// # Errors
    ///
    /// Returns [`PerformError::Unclaimed`] for transport errors the adaptor
    /// does not recognize and [`PerformError::Configuration`] for
    /// programming mistakes. Recognized failures are `Ok(Failure)`.
    fn perform(&mut self) -> Result<OperationResult, PerformError> {
        let info = self.info();
        if self.is_performed() {
            tracing::warn!(operation = %info, "operation already performed");
            return Ok(OperationResult::Failure {
                operation: info.clone(),
                error: Some(DomainError::Performed { operation: info }),
                resource: None,
                response: None,
            });
        }

        self.core_mut().state = OperationState::Performing;
        tracing::debug!(operation = %info, "performing operation");

        let original = self.core().resource.clone();
        let outcome = run(self);
        let core = self.core_mut();
        if !matches!(&outcome, Ok(result) if result.is_success()) {
            core.resource = original;
        }
        match outcome {
            Ok(result) => {
                core.state = if result.is_success() {
                    OperationState::Succeeded
                } else {
                    OperationState::Failed
                };
                core.result = Some(result.clone());
                tracing::info!(operation = %info, success = result.is_success(), "operation performed");
                Ok(result)
            }
            Err(error) => {
                core.state = OperationState::Failed;
                tracing::error!(operation = %info, %error, "operation raised");
                Err(error)
            }
        }
    }
}

/// Operations are equal when kind and resource are.
impl PartialEq for dyn Operation + '_ {
    fn eq(&self, other: &Self) -> bool {
        self.kind() == other.kind() && self.resource() == other.resource()
    }
}

impl fmt::Debug for dyn Operation + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("info", &self.info())
            .field("state", &self.state())
            .field("resource", self.resource())
            .finish_non_exhaustive()
    }
}

enum RootStep {
    Delegated(OperationResult),
    Own(Response),
}

fn run<O: Operation + ?Sized>(op: &mut O) -> Result<OperationResult, PerformError> {
    if let Some(failure) = run_before(op)? {
        return Ok(failure);
    }

    let root = match op.core_mut().root.take() {
        Some(mut root) => {
            let result = root.perform();
            op.core_mut().root = Some(root);
            let result = result?;
            if result.is_failure() {
                return Ok(result);
            }
            RootStep::Delegated(result)
        }
        None => match operate_translated(op)? {
            Outcome::Success { resource, response } => {
                op.core_mut().resource = resource;
                RootStep::Own(response)
            }
            Outcome::Failure { error, response } => {
                return Ok(op.core().failure(error, response));
            }
        },
    };

    if let Some(failure) = run_after(op)? {
        return Ok(failure);
    }

    Ok(match root {
        RootStep::Delegated(result) => result,
        RootStep::Own(response) => op.core().success(response),
    })
}

fn run_before<O: Operation + ?Sized>(op: &mut O) -> Result<Option<OperationResult>, PerformError> {
    let core = op.core_mut();
    let mut subs = std::mem::take(&mut core.before);
    let aborted = run_subs(&mut subs, &mut core.resource, "before");
    core.before = subs;
    aborted
}

fn run_after<O: Operation + ?Sized>(op: &mut O) -> Result<Option<OperationResult>, PerformError> {
    let core = op.core_mut();
    let mut subs = std::mem::take(&mut core.after);
    let aborted = run_subs(&mut subs, &mut core.resource, "after");
    core.after = subs;
    aborted
}

fn run_subs(
    subs: &mut [SubOperation],
    resource: &mut Resource,
    stage: &str,
) -> Result<Option<OperationResult>, PerformError> {
    for sub in subs {
        let result = sub.operation.perform()?;
        if result.is_failure() {
            tracing::info!(stage, operation = %result.operation(), "sub-operation failed, aborting");
            return Ok(Some(result));
        }
        if let Some(hook) = &sub.hook {
            hook(&result, resource).map_err(ConfigurationError::from)?;
        }
    }
    Ok(None)
}

fn operate_translated<O: Operation + ?Sized>(op: &mut O) -> Result<Outcome, PerformError> {
    match op.operate() {
        Ok(outcome) => Ok(outcome),
        Err(OperateError::Domain(error)) => Ok(Outcome::Failure {
            error: Some(error),
            response: None,
        }),
        Err(OperateError::Replied { error, response }) => Ok(Outcome::Failure {
            error: Some(error),
            response: Some(response),
        }),
        Err(OperateError::Transport(error)) => {
            let info = op.info();
            match op.core().adaptor().parse_operation_error(&error, &info) {
                Some(domain) => {
                    tracing::debug!(operation = %info, %domain, "translated transport error");
                    Ok(Outcome::Failure {
                        error: Some(domain),
                        response: error.response,
                    })
                }
                None => {
                    tracing::warn!(operation = %info, %error, "transport error unclaimed");
                    Err(PerformError::Unclaimed(error))
                }
            }
        }
        Err(OperateError::Configuration(error)) => Err(error.into()),
    }
}
