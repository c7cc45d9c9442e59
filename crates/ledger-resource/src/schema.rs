//! Resource type declarations

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Field name of the ledger-assigned identity.
pub const LEDGER_ID: &str = "ledger_id";

/// Field name of the caller-assigned identity.
pub const EXTERNAL_ID: &str = "external_id";

/// Lazily resolved schema, so resource types may reference themselves.
pub type SchemaFn = fn() -> &'static ResourceSchema;

/// Primitive attribute types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    String,
    Integer,
    Decimal,
    Boolean,
    Date,
}

impl AttributeType {
    /// Lowercase type label.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            AttributeType::String => "string",
            AttributeType::Integer => "integer",
            AttributeType::Decimal => "decimal",
            AttributeType::Boolean => "boolean",
            AttributeType::Date => "date",
        }
    }
}

/// Declared primitive attribute
#[derive(Debug, Clone)]
pub struct AttributeDef {
    pub name: String,
    pub attribute_type: AttributeType,
    /// Whether the attribute is part of the wire representation.
    pub wire: bool,
}

/// Cardinality of a reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    One,
    Many,
}

/// Declared reference to another resource type
#[derive(Debug, Clone)]
pub struct ReferenceDef {
    pub name: String,
    pub kind: ReferenceKind,
    pub target: SchemaFn,
}

impl ReferenceDef {
    /// Schema of the referenced resource type.
    #[must_use]
    pub fn target_schema(&self) -> &'static ResourceSchema {
        (self.target)()
    }
}

/// A field of a resource type, as addressed by one path segment.
#[derive(Debug, Clone, Copy)]
pub enum Field<'a> {
    /// `ledger_id` or `external_id`
    Identity(&'static str),
    Attribute(&'a AttributeDef),
    Reference(&'a ReferenceDef),
}

/// Static description of a resource type
#[derive(Debug, Clone)]
pub struct ResourceSchema {
    type_name: String,
    attributes: Vec<AttributeDef>,
    references: Vec<ReferenceDef>,
}

impl ResourceSchema {
    /// Start a schema for the named resource type.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            attributes: Vec::new(),
            references: Vec::new(),
        }
    }

    /// Declare a wire-eligible attribute.
    #[must_use]
    pub fn attribute(mut self, name: impl Into<String>, attribute_type: AttributeType) -> Self {
        self.attributes.push(AttributeDef {
            name: name.into(),
            attribute_type,
            wire: true,
        });
        self
    }

    /// Declare an attribute that is never part of the wire representation.
    #[must_use]
    pub fn local_attribute(
        mut self,
        name: impl Into<String>,
        attribute_type: AttributeType,
    ) -> Self {
        self.attributes.push(AttributeDef {
            name: name.into(),
            attribute_type,
            wire: false,
        });
        self
    }

    /// Declare a reference to a single resource.
    #[must_use]
    pub fn references_one(mut self, name: impl Into<String>, target: SchemaFn) -> Self {
        self.references.push(ReferenceDef {
            name: name.into(),
            kind: ReferenceKind::One,
            target,
        });
        self
    }

    /// Declare an ordered collection of resources.
    #[must_use]
    pub fn references_many(mut self, name: impl Into<String>, target: SchemaFn) -> Self {
        self.references.push(ReferenceDef {
            name: name.into(),
            kind: ReferenceKind::Many,
            target,
        });
        self
    }

    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    #[must_use]
    pub fn attributes(&self) -> &[AttributeDef] {
        &self.attributes
    }

    #[must_use]
    pub fn references(&self) -> &[ReferenceDef] {
        &self.references
    }

    #[must_use]
    pub fn attribute_def(&self, name: &str) -> Option<&AttributeDef> {
        self.attributes.iter().find(|a| a.name == name)
    }

    #[must_use]
    pub fn reference_def(&self, name: &str) -> Option<&ReferenceDef> {
        self.references.iter().find(|r| r.name == name)
    }

    /// Look up a field by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownField`] when the type declares no such field.
    pub fn field(&self, name: &str) -> Result<Field<'_>> {
        match name {
            LEDGER_ID => return Ok(Field::Identity(LEDGER_ID)),
            EXTERNAL_ID => return Ok(Field::Identity(EXTERNAL_ID)),
            _ => {}
        }

        if let Some(attribute) = self.attribute_def(name) {
            return Ok(Field::Attribute(attribute));
        }
        if let Some(reference) = self.reference_def(name) {
            return Ok(Field::Reference(reference));
        }
        Err(Error::unknown_field(&self.type_name, name))
    }

    /// Check that a path resolves against this type's declared shape.
    ///
    /// Every segment but the last must name a single reference; the last may
    /// name any field. Returns the field the path ends on.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first segment that does not resolve.
    pub fn check_path<S: AsRef<str>>(&self, path: &[S]) -> Result<Field<'_>> {
        let joined = || {
            path.iter()
                .map(AsRef::as_ref)
                .collect::<Vec<_>>()
                .join(".")
        };

        let Some((last, init)) = path.split_last() else {
            return Err(Error::invalid_path("", "path is empty"));
        };

        let mut schema: &ResourceSchema = self;
        for segment in init {
            match schema.field(segment.as_ref())? {
                Field::Reference(reference) if reference.kind == ReferenceKind::One => {
                    schema = reference.target_schema();
                }
                _ => {
                    return Err(Error::invalid_path(
                        joined(),
                        format!(
                            "'{}' is not a single reference on '{}'",
                            segment.as_ref(),
                            schema.type_name
                        ),
                    ));
                }
            }
        }

        schema.field(last.as_ref())
    }
}
