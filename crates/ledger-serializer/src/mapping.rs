//! Attribute mappings
//!
//! One [`AttributeMapping`] pairs a resource-side path with an external key
//! path. Outward, the resource path is walked through single references and
//! the converted value is merged into the nested output map. Inward, the
//! external value is converted and assigned back, creating any missing
//! intermediate references.

use std::sync::Arc;

use ledger_resource::{Assignment, Field, LEDGER_ID, ReferenceKind, Resolved, Resource, ResourceSchema};
use serde_json::{Map, Value as Json};

use crate::convert::{Converter, default_inward, default_outward};
use crate::path::KeyPath;
use crate::serializer::SerializerDefinition;
use crate::{Error, Result};

/// What to emit outward when the resolved value is absent or null
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NullPolicy {
    /// Write an explicit null at the external key
    #[default]
    WriteNull,
    /// Leave the external key out
    Omit,
}

/// Role of a mapping within its serializer
#[derive(Debug, Clone)]
pub enum MappingKind {
    Attribute,
    /// The ledger id; at most one per serializer
    Identity,
    /// One-to-many reference serialized element-wise
    HasMany(Arc<SerializerDefinition>),
}

/// Immutable correspondence between a resource path and an external path
#[derive(Debug, Clone)]
pub struct AttributeMapping {
    external: KeyPath,
    resource: KeyPath,
    converter: Option<Converter>,
    kind: MappingKind,
    null_policy: NullPolicy,
}

impl AttributeMapping {
    /// Map `resource` (e.g. `parent.ledger_id`) to `external` (e.g. `ParentRef.value`)
    #[must_use]
    pub fn new(external: &str, resource: &str) -> Self {
        Self {
            external: KeyPath::parse(external),
            resource: KeyPath::parse(resource),
            converter: None,
            kind: MappingKind::Attribute,
            null_policy: NullPolicy::default(),
        }
    }

    /// Map the ledger id to `external`; an unset id is always omitted
    #[must_use]
    pub fn identity(external: &str) -> Self {
        Self {
            kind: MappingKind::Identity,
            null_policy: NullPolicy::Omit,
            ..Self::new(external, LEDGER_ID)
        }
    }

    /// Map a collection reference element-wise through `serializer`
    #[must_use]
    pub fn has_many(external: &str, resource: &str, serializer: Arc<SerializerDefinition>) -> Self {
        Self {
            kind: MappingKind::HasMany(serializer),
            ..Self::new(external, resource)
        }
    }

    #[must_use]
    pub fn with_converter(mut self, converter: Converter) -> Self {
        self.converter = Some(converter);
        self
    }

    #[must_use]
    pub fn with_null_policy(mut self, null_policy: NullPolicy) -> Self {
        self.null_policy = null_policy;
        self
    }

    #[must_use]
    pub fn external(&self) -> &KeyPath {
        &self.external
    }

    #[must_use]
    pub fn resource(&self) -> &KeyPath {
        &self.resource
    }

    #[must_use]
    pub fn converter(&self) -> Option<&Converter> {
        self.converter.as_ref()
    }

    #[must_use]
    pub fn kind(&self) -> &MappingKind {
        &self.kind
    }

    #[must_use]
    pub fn is_identity(&self) -> bool {
        matches!(self.kind, MappingKind::Identity)
    }

    #[must_use]
    pub fn null_policy(&self) -> NullPolicy {
        self.null_policy
    }

    /// Whether the mapping can rebuild resource values from payloads of
    /// `schema`. Outward-only mappings are skipped when deserializing.
    #[must_use]
    pub fn has_inward(&self, schema: &ResourceSchema) -> bool {
        match (&self.kind, &self.converter) {
            (MappingKind::HasMany(_), _) => true,
            (_, Some(Converter::Reference)) => false,
            (_, Some(Converter::Custom(custom))) => custom.has_inward(),
            (_, Some(_) | None) => !matches!(
                schema.check_path(self.resource.segments()),
                Ok(Field::Reference(_)) | Err(_)
            ),
        }
    }

    /// Check the mapping against the declared shape of `schema`.
    pub(crate) fn check(&self, schema: &ResourceSchema, serializer: &str) -> Result<()> {
        if self.external.is_empty() {
            return Err(Error::configuration(serializer, "mapping has an empty external path"));
        }

        let field = schema.check_path(self.resource.segments()).map_err(|e| {
            Error::configuration(
                serializer,
                format!("resource path '{}' does not resolve: {e}", self.resource),
            )
        })?;

        match (&self.kind, field) {
            (MappingKind::Identity, Field::Identity(id)) if id == LEDGER_ID && self.resource.len() == 1 => {
                Ok(())
            }
            (MappingKind::Identity, _) => Err(Error::configuration(
                serializer,
                "identity mapping must address the resource's own ledger_id",
            )),
            (MappingKind::HasMany(nested), Field::Reference(def))
                if def.kind == ReferenceKind::Many =>
            {
                let expected = def.target_schema().type_name();
                if nested.schema().type_name() == expected {
                    Ok(())
                } else {
                    Err(Error::configuration(
                        serializer,
                        format!(
                            "collection '{}' holds '{expected}' but its serializer is bound to '{}'",
                            self.resource,
                            nested.schema().type_name()
                        ),
                    ))
                }
            }
            (MappingKind::HasMany(_), _) => Err(Error::configuration(
                serializer,
                format!("'{}' is not a collection reference", self.resource),
            )),
            (MappingKind::Attribute, Field::Reference(def)) if def.kind == ReferenceKind::Many => {
                Err(Error::configuration(
                    serializer,
                    format!("collection '{}' needs a has-many mapping", self.resource),
                ))
            }
            (MappingKind::Attribute, _) => Ok(()),
        }
    }

    /// Whether this mapping contributes in changes-only mode.
    ///
    /// The identity mapping always contributes; every other mapping
    /// contributes only when the top-level field it reads changed.
    pub(crate) fn is_dirty(&self, changes: &Resource) -> bool {
        if self.is_identity() {
            return true;
        }
        self.resource.head().is_some_and(|head| changes.changed(head))
    }

    /// Merge this mapping's outward value into `out`.
    ///
    /// # Errors
    ///
    /// Returns an error if the resource path does not resolve or the converter
    /// rejects the value.
    pub fn write_external(&self, resource: &Resource, out: &mut Map<String, Json>) -> Result<()> {
        let resolved = resource.resolve(self.resource.segments())?;

        let value = match &self.kind {
            MappingKind::HasMany(nested) => match resolved {
                Resolved::Many(items) => {
                    let elements = items
                        .iter()
                        .map(|item| nested.serializer(item)?.to_external(false).map(Json::Object))
                        .collect::<Result<Vec<_>>>()?;
                    Some(Json::Array(elements))
                }
                _ => None,
            },
            MappingKind::Attribute | MappingKind::Identity => match &self.converter {
                Some(converter) => converter.to_external(&resolved, &self.external)?,
                None => default_outward(&resolved),
            },
        };

        match (value, self.null_policy) {
            (Some(value), _) if !value.is_null() => self.external.insert(out, value),
            (_, NullPolicy::WriteNull) => self.external.insert(out, Json::Null),
            (_, NullPolicy::Omit) => {}
        }
        Ok(())
    }

    /// Assign this mapping's value from `payload` into `resource`.
    ///
    /// An absent external path leaves the resource untouched. Values that do
    /// not convert are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns an error for configuration problems and for converter
    /// directions that are unsupported.
    pub fn read_external(&self, payload: &Json, resource: &mut Resource) -> Result<()> {
        let Some(json) = self.external.get(payload) else {
            return Ok(());
        };

        let assignment = match &self.kind {
            MappingKind::HasMany(nested) => {
                let Some(elements) = json.as_array() else {
                    tracing::warn!(path = %self.external, "expected an array, skipping");
                    return Ok(());
                };
                let items = elements
                    .iter()
                    .map(|element| nested.from_external(element))
                    .collect::<Result<Vec<_>>>()?;
                Assignment::Many(items)
            }
            MappingKind::Attribute | MappingKind::Identity => {
                let field = resource.schema().check_path(self.resource.segments())?;
                let converted = match &self.converter {
                    Some(converter) => converter.to_resource(json, field, &self.external),
                    None => default_inward(json, field, &self.external),
                };
                match converted {
                    Ok(value) => Assignment::Value(value),
                    Err(Error::Conversion { path, message }) => {
                        tracing::warn!(%path, %message, "skipping malformed value");
                        return Ok(());
                    }
                    Err(e) => return Err(e),
                }
            }
        };

        resource.assign(self.resource.segments(), assignment)?;
        Ok(())
    }
}
