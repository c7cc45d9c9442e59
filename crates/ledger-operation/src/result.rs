//! Operation results

use std::fmt;

use ledger_resource::Resource;

use crate::DomainError;
use crate::operation::OperationKind;
use crate::response::Response;

/// Describes the operation a result came from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperationInfo {
    pub kind: OperationKind,
    pub resource_type: String,
    pub adaptor: String,
}

impl fmt::Display for OperationInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}::{}", self.adaptor, self.resource_type, self.kind)
    }
}

/// Outcome of performing an operation
#[derive(Debug, Clone, PartialEq)]
pub enum OperationResult {
    Success {
        operation: OperationInfo,
        resource: Resource,
        response: Response,
    },
    Failure {
        operation: OperationInfo,
        /// `None` when the operation declined to act, e.g. a find without an id
        error: Option<DomainError>,
        resource: Option<Resource>,
        response: Option<Response>,
    },
}

impl OperationResult {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }

    #[must_use]
    pub fn operation(&self) -> &OperationInfo {
        match self {
            Self::Success { operation, .. } | Self::Failure { operation, .. } => operation,
        }
    }

    #[must_use]
    pub fn resource(&self) -> Option<&Resource> {
        match self {
            Self::Success { resource, .. } => Some(resource),
            Self::Failure { resource, .. } => resource.as_ref(),
        }
    }

    #[must_use]
    pub fn response(&self) -> Option<&Response> {
        match self {
            Self::Success { response, .. } => Some(response),
            Self::Failure { response, .. } => response.as_ref(),
        }
    }

    #[must_use]
    pub fn error(&self) -> Option<&DomainError> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { error, .. } => error.as_ref(),
        }
    }

    /// Consume the result, keeping the resource of a success
    ///
    /// # Errors
    ///
    /// Returns the failure's error, if it carried one.
    pub fn into_resource(self) -> Result<Resource, Option<DomainError>> {
        match self {
            Self::Success { resource, .. } => Ok(resource),
            Self::Failure { error, .. } => Err(error),
        }
    }
}
