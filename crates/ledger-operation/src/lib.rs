#![deny(warnings)]
#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

//! # ledger-operation
//!
//! Lifecycle-managed create/find/update/delete interactions with a ledger.
//!
//! An [`Operation`] owns a resource, serializes it through its endpoint's
//! [`SerializerDefinition`](ledger_serializer::SerializerDefinition), talks to
//! the ledger through an [`Adaptor`], and classifies the outcome into an
//! [`OperationResult`]. Errors are split into three tiers:
//!
//! - [`DomainError`]s are recognized failures and travel inside
//!   [`OperationResult::Failure`].
//! - [`TransportError`]s the adaptor declines to translate surface as
//!   [`PerformError::Unclaimed`].
//! - [`ConfigurationError`]s are programming mistakes and are returned
//!   from construction or from `perform`.

/// The ledger-facing collaborator trait.
pub mod adaptor;
/// Serializer, contracts and update strategy for one resource type.
pub mod endpoint;
/// Create, find, update and delete.
pub mod kinds;
/// The shared lifecycle and composite runner.
pub mod operation;
/// Operations keyed by adaptor, resource type and kind.
pub mod registry;
/// Raw ledger replies.
pub mod response;
/// Success and failure outcomes.
pub mod result;

/// Adaptor seam.
pub use adaptor::Adaptor;
/// Endpoint declarations.
pub use endpoint::{Endpoint, UpdateStrategy};
/// Concrete operation kinds.
pub use kinds::{Create, Delete, Find, Update};
/// Lifecycle trait, shared state and sub-operations.
pub use operation::{Hook, Operation, OperationCore, OperationKind, OperationState, Outcome, SubOperation};
/// Startup registry.
pub use registry::{OperationRegistry, RegistryKey};
/// Ledger reply wrapper.
pub use response::Response;
/// Operation outcomes.
pub use result::{OperationInfo, OperationResult};

use thiserror::Error;

/// Failures the domain recognizes; carried inside a failed result
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    /// `perform` was called on an operation that already ran
    #[error("Operation {operation} has already been performed")]
    Performed { operation: OperationInfo },

    #[error("{resource_type} not found: {message}")]
    NotFound {
        resource_type: String,
        message: String,
    },

    #[error("Duplicate {resource_type}: {message}")]
    Duplicate {
        resource_type: String,
        message: String,
    },

    /// The ledger rejected the payload
    #[error("Ledger rejected {resource_type}: {message}")]
    LedgerValidation {
        resource_type: String,
        message: String,
    },

    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    #[error("Request throttled: {message}")]
    Throttle { message: String },

    /// The operation could not proceed with the data at hand
    #[error("Operation failed: {message}")]
    Operation { message: String },
}

impl DomainError {
    pub fn operation(message: impl Into<String>) -> Self {
        Self::Operation {
            message: message.into(),
        }
    }
}

/// Error raised by an adaptor's transport
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Transport error: {message}")]
pub struct TransportError {
    pub status: Option<u16>,
    pub message: String,
    /// Raw response behind the error, when the ledger sent one
    pub response: Option<Response>,
}

impl TransportError {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            response: None,
        }
    }

    #[must_use]
    pub fn with_response(mut self, response: Response) -> Self {
        self.response = Some(response);
        self
    }
}

/// Programming mistakes: missing registrations, mismatched types, mappings
/// that do not fit their resource
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("No {kind} operation registered for '{resource_type}' on adaptor '{adaptor}'")]
    UnknownOperation {
        adaptor: String,
        resource_type: String,
        kind: OperationKind,
    },

    #[error("Operation expects a '{expected}' resource, got '{found}'")]
    ResourceMismatch { expected: String, found: String },

    #[error("No contract declared for {kind} on '{resource_type}'")]
    MissingContract {
        resource_type: String,
        kind: OperationKind,
    },

    #[error(transparent)]
    Serializer(#[from] ledger_serializer::Error),

    #[error(transparent)]
    Resource(#[from] ledger_resource::Error),
}

/// Errors escaping [`Operation::perform`]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PerformError {
    /// A transport failure no adaptor rule recognized
    #[error("Unclaimed transport error: {0}")]
    Unclaimed(TransportError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

/// Errors produced by a kind's concrete action
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OperateError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// A domain error raised after the ledger replied
    #[error("{error}")]
    Replied { error: DomainError, response: Response },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

impl OperateError {
    /// Keep `response` alongside a domain error so the failure carries it.
    #[must_use]
    pub fn with_response(self, response: &Response) -> Self {
        match self {
            Self::Domain(error) => Self::Replied {
                error,
                response: response.clone(),
            },
            other => other,
        }
    }
}

impl From<ledger_serializer::Error> for OperateError {
    fn from(error: ledger_serializer::Error) -> Self {
        if error.is_configuration() {
            Self::Configuration(error.into())
        } else {
            Self::Domain(DomainError::operation(error.to_string()))
        }
    }
}

impl From<ledger_resource::Error> for OperateError {
    fn from(error: ledger_resource::Error) -> Self {
        Self::Configuration(error.into())
    }
}

pub type Result<T> = std::result::Result<T, ConfigurationError>;
