#![deny(warnings)]
#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

//! # ledger-adaptor-memory
//!
//! An in-process ledger for tests, demos and the `ledger` CLI.
//!
//! [`MemoryAdaptor`] stores records as JSON objects keyed by resource type
//! and id, assigns ids and sync tokens the way a hosted ledger would, and
//! reports failures as [`TransportError`](ledger_operation::TransportError)s
//! with ledger-style messages. Its [`ErrorMatcher`] recognizes those
//! messages as domain errors.
//!
//! [`endpoints`] declares a serializer and contracts for every built-in
//! resource type; [`register`] installs them in an
//! [`OperationRegistry`](ledger_operation::OperationRegistry).
//!
//! ## Example Usage
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use ledger_adaptor_memory::{MemoryAdaptor, register};
//! use ledger_operation::{Adaptor, OperationKind, OperationRegistry};
//! use ledger_resource::{Resource, types};
//!
//! let registry = OperationRegistry::new();
//! register(&registry, "memory").unwrap();
//!
//! let adaptor: Arc<dyn Adaptor> = Arc::new(MemoryAdaptor::with_builtin_rules("memory").unwrap());
//! let department = Resource::new(types::department()).with("name", "Engineering").unwrap();
//!
//! let mut create = registry
//!     .new_operation(adaptor, OperationKind::Create, department)
//!     .unwrap();
//! let result = create.perform().unwrap();
//!
//! assert!(result.is_success());
//! assert_eq!(result.resource().unwrap().ledger_id(), Some("1"));
//! ```

/// The in-memory [`ledger_operation::Adaptor`] implementation.
pub mod adaptor;
/// Serializers and contracts for the built-in resource types.
pub mod endpoints;
/// Regex rules translating transport errors into domain errors.
pub mod matcher;
/// Record storage behind the adaptor.
pub mod store;

/// Adaptor entry point and its call log.
pub use adaptor::{AdaptorCall, MemoryAdaptor};
/// Endpoint construction and registry population.
pub use endpoints::{endpoint, endpoints, register};
/// Error recognition table.
pub use matcher::{ErrorClass, ErrorMatcher, MatchRule};
/// Stored records and seed data.
pub use store::{MemoryStore, Seed};

use thiserror::Error;

/// Errors raised while setting up the in-memory ledger
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid error pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid seed record for '{resource_type}': {message}")]
    Seed {
        resource_type: String,
        message: String,
    },

    #[error("No built-in endpoint for resource type '{0}'")]
    UnknownResourceType(String),

    #[error(transparent)]
    Serializer(#[from] ledger_serializer::Error),

    #[error(transparent)]
    Contract(#[from] ledger_contract::Error),
}

impl Error {
    pub fn seed(resource_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Seed {
            resource_type: resource_type.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
