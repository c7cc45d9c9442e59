//! Adaptor seam
//!
//! An adaptor implements one ledger's transport and knows how to recognize
//! that ledger's failures. Transport calls are synchronous; an adaptor that
//! talks to a remote service blocks until the call completes.

use serde_json::{Map, Value as Json};

use crate::response::Response;
use crate::result::OperationInfo;
use crate::{DomainError, TransportError};

/// Transport and error recognition for one ledger
pub trait Adaptor: Send + Sync {
    /// Name under which the adaptor's operations are registered
    fn name(&self) -> &str;

    /// Create a record from `payload`
    ///
    /// # Errors
    ///
    /// Returns a transport error when the ledger rejects the call.
    fn create(
        &self,
        resource_type: &str,
        payload: &Map<String, Json>,
    ) -> Result<Response, TransportError>;

    /// Fetch the record identified by `id`
    ///
    /// # Errors
    ///
    /// Returns a transport error when the ledger rejects the call.
    fn find(&self, resource_type: &str, id: &str) -> Result<Response, TransportError>;

    /// Apply `payload` to the record identified by `id`
    ///
    /// # Errors
    ///
    /// Returns a transport error when the ledger rejects the call.
    fn update(
        &self,
        resource_type: &str,
        id: &str,
        payload: &Map<String, Json>,
    ) -> Result<Response, TransportError>;

    /// Delete the record identified by `id`
    ///
    /// # Errors
    ///
    /// Returns a transport error when the ledger rejects the call.
    fn delete(&self, resource_type: &str, id: &str) -> Result<Response, TransportError>;

    /// Translate a transport error into a domain error.
    ///
    /// Returning `None` leaves the error unclaimed and it escapes `perform`.
    fn parse_operation_error(
        &self,
        error: &TransportError,
        operation: &OperationInfo,
    ) -> Option<DomainError>;
}
