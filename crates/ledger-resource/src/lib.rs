#![deny(warnings)]
#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

//! # ledger-resource
//!
//! Ledger-agnostic resource model shared by serializers, contracts and
//! operations.
//!
//! A [`Resource`] is a typed record described by a static [`ResourceSchema`]:
//! primitive attributes, references to other resources, and the identity pair
//! (`ledger_id`, `external_id`). Assignments are dirty-tracked so that
//! serializers can emit changes only.

/// Name-keyed lookup of resource schemas.
pub mod catalog;
/// Resource instances, dirty tracking and path resolution.
pub mod resource;
/// Static resource type declarations.
pub mod schema;
/// Built-in resource types (account, department, vendor, ...).
pub mod types;
/// Typed attribute values.
pub mod value;

/// Schema lookup by type name.
pub use catalog::ResourceCatalog;
/// Resource instances and path resolution results.
pub use resource::{Assignment, Reference, Resolved, Resource};
/// Schema declarations and identity field names.
pub use schema::{
    AttributeDef, AttributeType, EXTERNAL_ID, Field, LEDGER_ID, ReferenceDef, ReferenceKind,
    ResourceSchema, SchemaFn,
};
/// Attribute value type.
pub use value::Value;

use thiserror::Error;

/// Errors raised by the resource model.
///
/// All of these indicate a mismatch between code and a resource's declared
/// shape, so callers generally treat them as configuration errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Unknown field '{field}' on resource type '{resource_type}'")]
    UnknownField {
        resource_type: String,
        field: String,
    },

    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Type mismatch for '{field}': expected {expected}, found {found}")]
    TypeMismatch {
        field: String,
        expected: String,
        found: String,
    },

    #[error("Conversion error in {context}: {message}")]
    Conversion { context: String, message: String },
}

impl Error {
    /// Build an unknown-field error for a resource type.
    pub fn unknown_field(resource_type: impl Into<String>, field: impl Into<String>) -> Self {
        Self::UnknownField {
            resource_type: resource_type.into(),
            field: field.into(),
        }
    }

    /// Build an invalid-path error with input path and reason.
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Build a type mismatch error for a named field.
    pub fn type_mismatch(
        field: impl Into<String>,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            field: field.into(),
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Build a conversion error with conversion context.
    pub fn conversion(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Conversion {
            context: context.into(),
            message: message.into(),
        }
    }
}

/// Crate-local result type for resource operations.
pub type Result<T> = std::result::Result<T, Error>;
