#![deny(warnings)]
#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

//! # ledger-serializer
//!
//! Declarative, bidirectional mapping between resources and ledger payloads.
//!
//! A [`SerializerDefinition`] is an ordered list of [`AttributeMapping`]s
//! bound to one resource type. Each mapping pairs a resource-side path
//! (`parent.ledger_id`) with an external key path (`ParentRef.value`) and an
//! optional [`Converter`]. Definitions can be built in code or declared in
//! YAML through [`SerializerDsl`].

/// Value converters between resource and wire forms.
pub mod convert;
/// YAML serializer declarations.
pub mod dsl;
/// Single attribute mappings.
pub mod mapping;
/// Deep merging of nested payloads.
pub mod merge;
/// Dotted key paths.
pub mod path;
/// Serializer definitions and bound serializers.
pub mod serializer;

/// Converter types.
pub use convert::{Converter, CustomConverter};
/// DSL entry points.
pub use dsl::{SerializerDsl, SerializerSet};
/// Mapping declarations.
pub use mapping::{AttributeMapping, MappingKind, NullPolicy};
/// Key path type.
pub use path::KeyPath;
/// Serializer construction and use.
pub use serializer::{PostProcessor, Serializer, SerializerBuilder, SerializerDefinition};

use thiserror::Error;

/// Errors that can occur while mapping
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A mapping does not fit the resource type it is bound to.
    #[error("Configuration error in serializer '{serializer}': {message}")]
    Configuration { serializer: String, message: String },

    /// A converter direction that cannot be implemented generically.
    #[error("Converter '{converter}' does not support {direction} conversion")]
    Unsupported {
        converter: String,
        direction: &'static str,
    },

    #[error("Conversion error for '{path}': {message}")]
    Conversion { path: String, message: String },

    #[error("Serializer DSL parse error: {0}")]
    Parse(String),

    #[error(transparent)]
    Resource(#[from] ledger_resource::Error),
}

impl Error {
    /// Build a configuration error for a serializer.
    pub fn configuration(serializer: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            serializer: serializer.into(),
            message: message.into(),
        }
    }

    /// Build a conversion error for a key path.
    pub fn conversion(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Conversion {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Whether this error reflects a programming mistake rather than data.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. } | Self::Resource(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
