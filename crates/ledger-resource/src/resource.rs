//! Resource instances
//!
//! A [`Resource`] owns its attribute values and reference graph. Every
//! assignment that changes a value marks the field as changed until
//! [`Resource::changes_applied`] is called; the identity pair is never
//! tracked.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value as Json, json};

use crate::schema::{
    AttributeType, EXTERNAL_ID, Field, LEDGER_ID, ReferenceDef, ReferenceKind, ResourceSchema,
};
use crate::value::Value;
use crate::{Error, Result};

/// Value held by a reference field
#[derive(Debug, Clone, PartialEq)]
pub enum Reference {
    One(Option<Box<Resource>>),
    Many(Vec<Resource>),
}

/// Result of reading a path from a resource
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved<'a> {
    /// An intermediate or final reference is unset
    Absent,
    /// Attribute or identity value (possibly null)
    Value(Value),
    /// A single referenced resource
    One(&'a Resource),
    /// A referenced collection
    Many(&'a [Resource]),
}

/// Value written to a path of a resource
#[derive(Debug, Clone, PartialEq)]
pub enum Assignment {
    Value(Value),
    One(Option<Resource>),
    Many(Vec<Resource>),
}

/// A typed record of one resource type
#[derive(Debug, Clone)]
pub struct Resource {
    schema: &'static ResourceSchema,
    ledger_id: Option<String>,
    external_id: Option<String>,
    attributes: BTreeMap<String, Value>,
    references: BTreeMap<String, Reference>,
    changed: BTreeSet<String>,
}

impl Resource {
    /// Create an empty resource; every attribute starts null and every
    /// reference unset.
    #[must_use]
    pub fn new(schema: &'static ResourceSchema) -> Self {
        let attributes = schema
            .attributes()
            .iter()
            .map(|a| (a.name.clone(), Value::Null))
            .collect();
        let references = schema
            .references()
            .iter()
            .map(|r| {
                let empty = match r.kind {
                    ReferenceKind::One => Reference::One(None),
                    ReferenceKind::Many => Reference::Many(Vec::new()),
                };
                (r.name.clone(), empty)
            })
            .collect();

        Self {
            schema,
            ledger_id: None,
            external_id: None,
            attributes,
            references,
            changed: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn schema(&self) -> &'static ResourceSchema {
        self.schema
    }

    #[must_use]
    pub fn type_name(&self) -> &str {
        self.schema.type_name()
    }

    #[must_use]
    pub fn ledger_id(&self) -> Option<&str> {
        self.ledger_id.as_deref()
    }

    pub fn set_ledger_id(&mut self, ledger_id: impl Into<String>) {
        self.ledger_id = Some(ledger_id.into());
    }

    pub fn clear_ledger_id(&mut self) {
        self.ledger_id = None;
    }

    #[must_use]
    pub fn with_ledger_id(mut self, ledger_id: impl Into<String>) -> Self {
        self.set_ledger_id(ledger_id);
        self
    }

    #[must_use]
    pub fn external_id(&self) -> Option<&str> {
        self.external_id.as_deref()
    }

    pub fn set_external_id(&mut self, external_id: impl Into<String>) {
        self.external_id = Some(external_id.into());
    }

    #[must_use]
    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.set_external_id(external_id);
        self
    }

    /// Read an attribute.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownField`] if the type declares no such attribute.
    pub fn get(&self, name: &str) -> Result<&Value> {
        self.attributes
            .get(name)
            .ok_or_else(|| Error::unknown_field(self.type_name(), name))
    }

    /// Assign an attribute, marking it changed if the value differs.
    ///
    /// Integers are widened when assigned to decimal attributes.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown attributes or values of the wrong type.
    #[allow(clippy::cast_precision_loss)]
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let def = self
            .schema
            .attribute_def(name)
            .ok_or_else(|| Error::unknown_field(self.type_name(), name))?;

        let value = match (def.attribute_type, value.into()) {
            (_, Value::Null) => Value::Null,
            (AttributeType::Decimal, Value::Integer(i)) => Value::Decimal(i as f64),
            (expected, v) if v.attribute_type() == Some(expected) => v,
            (expected, v) => {
                return Err(Error::type_mismatch(name, expected.name(), v.type_name()));
            }
        };

        if self.attributes.get(name) != Some(&value) {
            self.changed.insert(name.to_string());
        }
        self.attributes.insert(name.to_string(), value);
        Ok(())
    }

    /// Builder form of [`Resource::set`].
    ///
    /// # Errors
    ///
    /// See [`Resource::set`].
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Result<Self> {
        self.set(name, value)?;
        Ok(self)
    }

    /// Read a single reference.
    ///
    /// # Errors
    ///
    /// Returns an error unless `name` is a declared single reference.
    pub fn reference(&self, name: &str) -> Result<Option<&Resource>> {
        self.reference_def(name, ReferenceKind::One)?;
        match self.references.get(name) {
            Some(Reference::One(Some(resource))) => Ok(Some(resource)),
            _ => Ok(None),
        }
    }

    /// Assign a single reference, marking it changed if it differs.
    ///
    /// # Errors
    ///
    /// Returns an error for undeclared references or a resource of the wrong
    /// type.
    pub fn set_reference(&mut self, name: &str, resource: Option<Resource>) -> Result<()> {
        let def = self.reference_def(name, ReferenceKind::One)?;
        if let Some(resource) = &resource {
            check_target(def, resource)?;
        }

        let next = Reference::One(resource.map(Box::new));
        self.replace_reference(name, next);
        Ok(())
    }

    /// Builder form of [`Resource::set_reference`].
    ///
    /// # Errors
    ///
    /// See [`Resource::set_reference`].
    pub fn with_reference(mut self, name: &str, resource: Resource) -> Result<Self> {
        self.set_reference(name, Some(resource))?;
        Ok(self)
    }

    /// Read a referenced collection.
    ///
    /// # Errors
    ///
    /// Returns an error unless `name` is a declared collection reference.
    pub fn many(&self, name: &str) -> Result<&[Resource]> {
        self.reference_def(name, ReferenceKind::Many)?;
        match self.references.get(name) {
            Some(Reference::Many(items)) => Ok(items),
            _ => Ok(&[]),
        }
    }

    /// Replace a referenced collection, marking it changed if it differs.
    ///
    /// # Errors
    ///
    /// Returns an error for undeclared collections or elements of the wrong
    /// type.
    pub fn set_many(&mut self, name: &str, resources: Vec<Resource>) -> Result<()> {
        let def = self.reference_def(name, ReferenceKind::Many)?;
        for resource in &resources {
            check_target(def, resource)?;
        }

        self.replace_reference(name, Reference::Many(resources));
        Ok(())
    }

    /// Builder form of [`Resource::set_many`].
    ///
    /// # Errors
    ///
    /// See [`Resource::set_many`].
    pub fn with_many(mut self, name: &str, resources: Vec<Resource>) -> Result<Self> {
        self.set_many(name, resources)?;
        Ok(self)
    }

    /// Whether the named attribute or reference changed since the last
    /// [`Resource::changes_applied`]. Identity fields never report changes.
    #[must_use]
    pub fn changed(&self, name: &str) -> bool {
        self.changed.contains(name)
    }

    /// Names of all changed fields, in name order.
    pub fn changes(&self) -> impl Iterator<Item = &str> {
        self.changed.iter().map(String::as_str)
    }

    #[must_use]
    pub fn has_changes(&self) -> bool {
        !self.changed.is_empty()
    }

    /// Accept the current state as the new baseline, recursively.
    pub fn changes_applied(&mut self) {
        self.changed.clear();
        for reference in self.references.values_mut() {
            match reference {
                Reference::One(Some(resource)) => resource.changes_applied(),
                Reference::One(None) => {}
                Reference::Many(items) => items.iter_mut().for_each(Resource::changes_applied),
            }
        }
    }

    /// Read the value at a path of field names.
    ///
    /// Walks single references for every segment but the last. An unset
    /// intermediate reference yields [`Resolved::Absent`].
    ///
    /// # Errors
    ///
    /// Returns an error if the path does not resolve against the declared
    /// shape, whether or not the intermediate references are set.
    pub fn resolve<S: AsRef<str>>(&self, path: &[S]) -> Result<Resolved<'_>> {
        self.schema.check_path(path)?;
        let Some((last, init)) = path.split_last() else {
            return Err(Error::invalid_path("", "path is empty"));
        };

        let mut current = self;
        for segment in init {
            match current.reference(segment.as_ref())? {
                Some(next) => current = next,
                None => return Ok(Resolved::Absent),
            }
        }
        current.resolve_field(last.as_ref())
    }

    /// Write a value at a path of field names, creating any unset
    /// intermediate references along the way.
    ///
    /// # Errors
    ///
    /// Returns an error if the path does not resolve against the declared
    /// shape or the assignment does not fit the final field.
    pub fn assign<S: AsRef<str>>(&mut self, path: &[S], assignment: Assignment) -> Result<()> {
        self.schema.check_path(path)?;
        let Some((last, init)) = path.split_last() else {
            return Err(Error::invalid_path("", "path is empty"));
        };

        let mut current: &mut Resource = self;
        for segment in init {
            current = current.reference_or_insert(segment.as_ref())?;
        }
        current.assign_field(last.as_ref(), assignment)
    }

    /// Primitive data eligible for the wire, keyed by field name.
    ///
    /// References are replaced by reference markers and attributes declared
    /// local are dropped.
    #[must_use]
    pub fn wire_data(&self) -> Map<String, Json> {
        let mut data = Map::new();
        data.insert(EXTERNAL_ID.to_string(), json!(self.external_id));
        data.insert(LEDGER_ID.to_string(), json!(self.ledger_id));

        for def in self.schema.attributes().iter().filter(|a| a.wire) {
            let value = self.attributes.get(&def.name).map_or(Json::Null, Value::to_json);
            data.insert(def.name.clone(), value);
        }

        for def in self.schema.references() {
            let value = match self.references.get(&def.name) {
                Some(Reference::One(Some(resource))) => resource.reference_marker(),
                Some(Reference::Many(items)) => {
                    Json::Array(items.iter().map(Resource::reference_marker).collect())
                }
                Some(Reference::One(None)) | None => match def.kind {
                    ReferenceKind::One => Json::Null,
                    ReferenceKind::Many => Json::Array(Vec::new()),
                },
            };
            data.insert(def.name.clone(), value);
        }

        data
    }

    /// Compact marker standing in for this resource inside another
    /// resource's wire data.
    #[must_use]
    pub fn reference_marker(&self) -> Json {
        json!({
            "object": "reference",
            "type": self.type_name(),
            "id": self.ledger_id,
        })
    }

    fn resolve_field(&self, name: &str) -> Result<Resolved<'_>> {
        Ok(match self.schema.field(name)? {
            Field::Identity(id) if id == LEDGER_ID => {
                Resolved::Value(self.ledger_id.clone().into())
            }
            Field::Identity(_) => Resolved::Value(self.external_id.clone().into()),
            Field::Attribute(def) => {
                Resolved::Value(self.attributes.get(&def.name).cloned().unwrap_or_default())
            }
            Field::Reference(def) => match self.references.get(&def.name) {
                Some(Reference::One(Some(resource))) => Resolved::One(resource),
                Some(Reference::Many(items)) => Resolved::Many(items),
                Some(Reference::One(None)) | None => Resolved::Absent,
            },
        })
    }

    fn assign_field(&mut self, name: &str, assignment: Assignment) -> Result<()> {
        match (self.schema.field(name)?, assignment) {
            (Field::Identity(id), Assignment::Value(value)) => {
                let slot = if id == LEDGER_ID {
                    &mut self.ledger_id
                } else {
                    &mut self.external_id
                };
                *slot = match value {
                    Value::Null => None,
                    Value::String(s) => Some(s),
                    Value::Integer(i) => Some(i.to_string()),
                    other => return Err(Error::type_mismatch(name, "string", other.type_name())),
                };
                Ok(())
            }
            (Field::Attribute(_), Assignment::Value(value)) => self.set(name, value),
            (Field::Reference(_), Assignment::One(resource)) => self.set_reference(name, resource),
            (Field::Reference(_), Assignment::Many(resources)) => self.set_many(name, resources),
            (_, assignment) => Err(Error::type_mismatch(
                name,
                "a value matching the field",
                match assignment {
                    Assignment::Value(_) => "value",
                    Assignment::One(_) => "resource",
                    Assignment::Many(_) => "collection",
                },
            )),
        }
    }

    fn reference_or_insert(&mut self, name: &str) -> Result<&mut Resource> {
        let target = self.reference_def(name, ReferenceKind::One)?.target_schema();

        if !matches!(self.references.get(name), Some(Reference::One(Some(_)))) {
            tracing::trace!(
                resource_type = self.type_name(),
                reference = name,
                "creating intermediate reference"
            );
            self.changed.insert(name.to_string());
            self.references.insert(
                name.to_string(),
                Reference::One(Some(Box::new(Resource::new(target)))),
            );
        }

        match self.references.get_mut(name) {
            Some(Reference::One(Some(resource))) => Ok(resource.as_mut()),
            _ => Err(Error::invalid_path(name, "reference could not be created")),
        }
    }

    fn reference_def(&self, name: &str, kind: ReferenceKind) -> Result<&'static ReferenceDef> {
        let def = self
            .schema
            .reference_def(name)
            .ok_or_else(|| Error::unknown_field(self.type_name(), name))?;
        if def.kind != kind {
            let expected = match kind {
                ReferenceKind::One => "single reference",
                ReferenceKind::Many => "collection reference",
            };
            return Err(Error::type_mismatch(name, expected, "other reference kind"));
        }
        Ok(def)
    }

    fn replace_reference(&mut self, name: &str, next: Reference) {
        if self.references.get(name) != Some(&next) {
            self.changed.insert(name.to_string());
        }
        self.references.insert(name.to_string(), next);
    }
}

fn check_target(def: &ReferenceDef, resource: &Resource) -> Result<()> {
    let expected = def.target_schema().type_name();
    if resource.type_name() == expected {
        Ok(())
    } else {
        Err(Error::type_mismatch(&def.name, expected, resource.type_name()))
    }
}

/// Equality compares type, identity and values; change tracking is ignored.
impl PartialEq for Resource {
    fn eq(&self, other: &Self) -> bool {
        self.type_name() == other.type_name()
            && self.ledger_id == other.ledger_id
            && self.external_id == other.external_id
            && self.attributes == other.attributes
            && self.references == other.references
    }
}
