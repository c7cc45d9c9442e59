//! Serializer definitions
//!
//! A [`SerializerDefinition`] is built once per resource type and shared. A
//! [`Serializer`] is the transient view binding a definition to one resource.

use std::fmt;
use std::sync::Arc;

use ledger_resource::{Resource, ResourceSchema};
use serde_json::{Map, Value as Json};

use crate::convert::Converter;
use crate::mapping::AttributeMapping;
use crate::merge::merge_unmapped;
use crate::path::KeyPath;
use crate::{Error, Result};

/// Rewrites the outward payload after all mappings have run.
///
/// Receives the resource whose change set governs the output.
pub type PostProcessor = Arc<dyn Fn(&Resource, &mut Map<String, Json>) + Send + Sync>;

/// Ordered mappings bound to one resource type
#[derive(Clone)]
pub struct SerializerDefinition {
    name: String,
    schema: &'static ResourceSchema,
    mappings: Vec<AttributeMapping>,
    post_processors: Vec<PostProcessor>,
}

impl fmt::Debug for SerializerDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerializerDefinition")
            .field("name", &self.name)
            .field("resource_type", &self.schema.type_name())
            .field("mappings", &self.mappings)
            .field("post_processors", &self.post_processors.len())
            .finish()
    }
}

impl SerializerDefinition {
    /// Start a definition for `schema`, named after the resource type
    #[must_use]
    pub fn builder(schema: &'static ResourceSchema) -> SerializerBuilder {
        SerializerBuilder::new(schema.type_name(), schema)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn schema(&self) -> &'static ResourceSchema {
        self.schema
    }

    #[must_use]
    pub fn mappings(&self) -> &[AttributeMapping] {
        &self.mappings
    }

    /// The identity mapping, if the definition declares one
    #[must_use]
    pub fn identity(&self) -> Option<&AttributeMapping> {
        self.mappings.iter().find(|m| m.is_identity())
    }

    /// Bind this definition to `resource`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the resource is of another type.
    pub fn serializer<'a>(&'a self, resource: &'a Resource) -> Result<Serializer<'a>> {
        if resource.type_name() != self.schema.type_name() {
            return Err(Error::configuration(
                &self.name,
                format!(
                    "bound to '{}' but given a '{}'",
                    self.schema.type_name(),
                    resource.type_name()
                ),
            ));
        }
        Ok(Serializer {
            definition: self,
            resource,
            snapshot: None,
        })
    }

    /// Build a fresh resource from an external payload.
    ///
    /// # Errors
    ///
    /// See [`SerializerDefinition::deserialize_into`].
    pub fn from_external(&self, payload: &Json) -> Result<Resource> {
        let mut resource = Resource::new(self.schema);
        self.deserialize_into(&mut resource, payload)?;
        Ok(resource)
    }

    /// Assign every inward-capable mapping found in `payload` into
    /// `resource`. Keys absent from the payload leave the resource as is.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when `resource` is of another type, and
    /// propagates errors from nested collection definitions.
    pub fn deserialize_into(&self, resource: &mut Resource, payload: &Json) -> Result<()> {
        if resource.type_name() != self.schema.type_name() {
            return Err(Error::configuration(
                &self.name,
                format!("cannot deserialize into a '{}'", resource.type_name()),
            ));
        }
        if !payload.is_object() {
            tracing::warn!(serializer = %self.name, "payload is not an object, nothing to read");
            return Ok(());
        }

        for mapping in &self.mappings {
            if !mapping.has_inward(self.schema) {
                tracing::trace!(serializer = %self.name, path = %mapping.external(), "outward-only mapping");
                continue;
            }
            mapping.read_external(payload, resource)?;
        }
        Ok(())
    }
}

/// Builder for [`SerializerDefinition`]
pub struct SerializerBuilder {
    name: String,
    schema: &'static ResourceSchema,
    mappings: Vec<AttributeMapping>,
    post_processors: Vec<PostProcessor>,
}

impl SerializerBuilder {
    pub fn new(name: impl Into<String>, schema: &'static ResourceSchema) -> Self {
        Self {
            name: name.into(),
            schema,
            mappings: Vec::new(),
            post_processors: Vec::new(),
        }
    }

    /// Map the ledger id to `external`
    #[must_use]
    pub fn id(self, external: &str) -> Self {
        self.mapping(AttributeMapping::identity(external))
    }

    #[must_use]
    pub fn attribute(self, external: &str, resource: &str) -> Self {
        self.mapping(AttributeMapping::new(external, resource))
    }

    #[must_use]
    pub fn attribute_with(self, external: &str, resource: &str, converter: Converter) -> Self {
        self.mapping(AttributeMapping::new(external, resource).with_converter(converter))
    }

    #[must_use]
    pub fn references_many(
        self,
        external: &str,
        resource: &str,
        serializer: Arc<SerializerDefinition>,
    ) -> Self {
        self.mapping(AttributeMapping::has_many(external, resource, serializer))
    }

    #[must_use]
    pub fn mapping(mut self, mapping: AttributeMapping) -> Self {
        self.mappings.push(mapping);
        self
    }

    #[must_use]
    pub fn post_process(
        mut self,
        f: impl Fn(&Resource, &mut Map<String, Json>) + Send + Sync + 'static,
    ) -> Self {
        self.post_processors.push(Arc::new(f));
        self
    }

    /// Check every mapping against the schema and build the definition.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for resource paths that do not resolve,
    /// more than one identity mapping, or collection mappings whose nested
    /// serializer is bound to another type.
    pub fn build(self) -> Result<SerializerDefinition> {
        let identities = self.mappings.iter().filter(|m| m.is_identity()).count();
        if identities > 1 {
            return Err(Error::configuration(
                &self.name,
                format!("{identities} identity mappings declared, at most one allowed"),
            ));
        }

        for mapping in &self.mappings {
            mapping.check(self.schema, &self.name)?;
        }

        tracing::debug!(
            serializer = %self.name,
            resource_type = self.schema.type_name(),
            mappings = self.mappings.len(),
            "built serializer definition"
        );

        Ok(SerializerDefinition {
            name: self.name,
            schema: self.schema,
            mappings: self.mappings,
            post_processors: self.post_processors,
        })
    }
}

/// A definition bound to one resource
#[derive(Debug, Clone, Copy)]
pub struct Serializer<'a> {
    definition: &'a SerializerDefinition,
    resource: &'a Resource,
    snapshot: Option<&'a Resource>,
}

impl<'a> Serializer<'a> {
    /// Take the change set from `snapshot` instead of the live resource.
    ///
    /// Only the locally captured snapshot is consulted; edits made on the
    /// ledger since it was fetched are invisible to a changes-only payload.
    #[must_use]
    pub fn with_snapshot(mut self, snapshot: &'a Resource) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    #[must_use]
    pub fn resource(&self) -> &'a Resource {
        self.resource
    }

    fn changes(&self) -> &'a Resource {
        self.snapshot.unwrap_or(self.resource)
    }

    /// Serialize the resource into a nested payload.
    ///
    /// With `only_changes`, only mappings whose top-level resource field
    /// changed contribute; the identity mapping always does.
    ///
    /// # Errors
    ///
    /// Returns an error when a converter rejects a value.
    pub fn to_external(&self, only_changes: bool) -> Result<Map<String, Json>> {
        let changes = self.changes();
        let mut out = Map::new();

        for mapping in &self.definition.mappings {
            if only_changes && !mapping.is_dirty(changes) {
                continue;
            }
            mapping.write_external(self.resource, &mut out)?;
        }

        for post_process in &self.definition.post_processors {
            post_process(changes, &mut out);
        }

        tracing::trace!(
            serializer = %self.definition.name,
            only_changes,
            keys = out.len(),
            "serialized resource"
        );
        Ok(out)
    }

    /// Serialize as [`Serializer::to_external`], then fill in every key of
    /// `found` that no mapping addresses.
    ///
    /// # Errors
    ///
    /// See [`Serializer::to_external`].
    pub fn to_external_merged(
        &self,
        only_changes: bool,
        found: &Map<String, Json>,
    ) -> Result<Map<String, Json>> {
        let mut out = self.to_external(only_changes)?;
        let mapped: Vec<&KeyPath> = self
            .definition
            .mappings
            .iter()
            .map(AttributeMapping::external)
            .collect();
        merge_unmapped(&mut out, found, &mapped);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_resource::Value;
    use ledger_resource::types::{department, expense, expense_line_item, vendor};
    use serde_json::json;

    fn department_serializer() -> SerializerDefinition {
        SerializerDefinition::builder(department())
            .id("Id")
            .attribute("Name", "name")
            .attribute("Active", "active")
            .attribute("ParentRef.value", "parent.ledger_id")
            .build()
            .unwrap()
    }

    #[test]
    fn test_full_serialization() {
        let definition = department_serializer();
        let resource = Resource::new(department())
            .with("name", "Ops")
            .unwrap()
            .with_ledger_id("12");

        let out = definition.serializer(&resource).unwrap().to_external(false).unwrap();
        assert_eq!(
            Json::Object(out),
            json!({"Id": "12", "Name": "Ops", "Active": null, "ParentRef": {"value": null}})
        );
    }

    #[test]
    fn test_only_changes_keeps_identity() {
        let definition = department_serializer();
        let mut resource = Resource::new(department())
            .with("name", "Ops")
            .unwrap()
            .with_ledger_id("12");
        resource.changes_applied();
        resource.set("active", true).unwrap();

        let out = definition.serializer(&resource).unwrap().to_external(true).unwrap();
        assert_eq!(Json::Object(out), json!({"Id": "12", "Active": true}));
    }

    #[test]
    fn test_snapshot_governs_changes() {
        let definition = department_serializer();
        let mut resource = Resource::new(department()).with_ledger_id("1");
        resource.changes_applied();
        let snapshot = resource.clone();
        resource.set("name", "Late edit").unwrap();

        let out = definition
            .serializer(&resource)
            .unwrap()
            .with_snapshot(&snapshot)
            .to_external(true)
            .unwrap();
        assert_eq!(Json::Object(out), json!({"Id": "1"}));
    }

    #[test]
    fn test_post_processor_runs_last() {
        let definition = SerializerDefinition::builder(department())
            .attribute("Name", "name")
            .attribute("ParentRef.value", "parent.ledger_id")
            .post_process(|resource, out| {
                if !resource.changed("parent") {
                    out.remove("ParentRef");
                }
            })
            .build()
            .unwrap();

        let resource = Resource::new(department()).with("name", "Ops").unwrap();
        let out = definition.serializer(&resource).unwrap().to_external(false).unwrap();
        assert_eq!(Json::Object(out), json!({"Name": "Ops"}));
    }

    #[test]
    fn test_merged_payload_respects_post_processors() {
        let definition = SerializerDefinition::builder(department())
            .id("Id")
            .attribute("Name", "name")
            .attribute("ParentRef.value", "parent.ledger_id")
            .post_process(|resource, out| {
                if !resource.changed("parent") {
                    out.remove("ParentRef");
                }
            })
            .build()
            .unwrap();
        let mut resource = Resource::new(department()).with_ledger_id("4");
        resource.changes_applied();
        resource.set("name", "Ops").unwrap();
        let found = json!({"Id": "4", "Name": "Old", "ParentRef": {"value": "2"}, "SyncToken": "7"});

        let out = definition
            .serializer(&resource)
            .unwrap()
            .to_external_merged(true, found.as_object().unwrap())
            .unwrap();
        assert_eq!(
            Json::Object(out),
            json!({"Id": "4", "Name": "Ops", "SyncToken": "7"})
        );
    }

    #[test]
    fn test_build_rejects_two_identities() {
        let err = SerializerDefinition::builder(department())
            .id("Id")
            .id("Key")
            .build()
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_build_rejects_mismatched_collection() {
        let vendors = Arc::new(SerializerDefinition::builder(vendor()).build().unwrap());
        let err = SerializerDefinition::builder(expense())
            .references_many("Line", "line_items", vendors)
            .build()
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_serializer_rejects_other_type() {
        let definition = department_serializer();
        let vendor = Resource::new(vendor());
        assert!(definition.serializer(&vendor).is_err());
    }

    #[test]
    fn test_from_external_skips_outward_only_mappings() {
        let lines = Arc::new(
            SerializerDefinition::builder(expense_line_item())
                .id("Id")
                .attribute_with("Amount", "amount", Converter::Amount)
                .attribute("AccountRef.value", "account.ledger_id")
                .build()
                .unwrap(),
        );
        let definition = SerializerDefinition::builder(expense())
            .id("Id")
            .attribute("PrivateNote", "memo")
            .attribute_with("Account", "account", Converter::Reference)
            .references_many("Line", "line_items", lines)
            .build()
            .unwrap();

        let payload = json!({
            "Id": "99",
            "PrivateNote": "lunch",
            "Account": {"id": "5"},
            "Line": [{"Id": "1", "Amount": 1.5, "AccountRef": {"value": "5"}}],
        });
        let resource = definition.from_external(&payload).unwrap();

        assert_eq!(resource.ledger_id(), Some("99"));
        assert!(resource.reference("account").unwrap().is_none());
        let line_items = resource.many("line_items").unwrap();
        assert_eq!(line_items.len(), 1);
        assert_eq!(line_items[0].get("amount").unwrap(), &Value::Integer(150));
        assert_eq!(
            line_items[0].reference("account").unwrap().unwrap().ledger_id(),
            Some("5")
        );
    }

    #[test]
    fn test_non_object_payload_yields_empty_resource() {
        let definition = department_serializer();
        let resource = definition.from_external(&json!(["x"])).unwrap();
        assert_eq!(resource, Resource::new(department()));
    }
}
