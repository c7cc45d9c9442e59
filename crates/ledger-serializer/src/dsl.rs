//! Serializer DSL
//!
//! Declares serializer definitions in YAML. Resource type names resolve
//! through a [`ResourceCatalog`]; `has_many` names a definition declared
//! earlier in the same document.
//!
//! ```yaml
//! serializers:
//!   - name: department
//!     resource_type: department
//!     mappings:
//!       - external: Id
//!         identity: true
//!       - external: Name
//!         resource: name
//!       - external: ParentRef.value
//!         resource: parent.ledger_id
//!         null: omit
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use ledger_resource::ResourceCatalog;
use serde::{Deserialize, Serialize};

use crate::convert::Converter;
use crate::mapping::{AttributeMapping, NullPolicy};
use crate::serializer::{SerializerBuilder, SerializerDefinition};
use crate::{Error, Result};

/// A document of serializer declarations
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SerializerFile {
    pub serializers: Vec<DefinitionDecl>,
}

/// One declared serializer definition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DefinitionDecl {
    pub name: String,

    /// Resource type the definition is bound to; defaults to `name`
    #[serde(default)]
    pub resource_type: Option<String>,

    #[serde(default)]
    pub mappings: Vec<MappingDecl>,
}

/// One declared attribute mapping
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MappingDecl {
    /// Dotted external key path
    pub external: String,

    /// Dotted resource path; required unless `identity` is set
    #[serde(default)]
    pub resource: Option<String>,

    #[serde(default)]
    pub identity: bool,

    /// Built-in converter name
    #[serde(default)]
    pub converter: Option<String>,

    #[serde(default)]
    pub null: NullDecl,

    /// Name of an earlier definition serializing each collection element
    #[serde(default)]
    pub has_many: Option<String>,
}

/// Null policy as written in YAML
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NullDecl {
    #[default]
    Write,
    Omit,
}

impl From<NullDecl> for NullPolicy {
    fn from(decl: NullDecl) -> Self {
        match decl {
            NullDecl::Write => NullPolicy::WriteNull,
            NullDecl::Omit => NullPolicy::Omit,
        }
    }
}

/// Definitions built from one DSL document, keyed by name
#[derive(Debug, Clone, Default)]
pub struct SerializerSet {
    definitions: HashMap<String, Arc<SerializerDefinition>>,
    order: Vec<String>,
}

impl SerializerSet {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<SerializerDefinition>> {
        self.definitions.get(name).cloned()
    }

    /// Definition names in declaration order
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.order
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn insert(&mut self, definition: SerializerDefinition) -> Result<()> {
        let name = definition.name().to_string();
        if self.definitions.contains_key(&name) {
            return Err(Error::configuration(&name, "declared more than once"));
        }
        self.definitions.insert(name.clone(), Arc::new(definition));
        self.order.push(name);
        Ok(())
    }
}

/// DSL parser
pub struct SerializerDsl;

impl SerializerDsl {
    /// Parse YAML declarations without building them
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] when the YAML is malformed.
    pub fn parse_declarations(yaml: &str) -> Result<SerializerFile> {
        serde_yaml::from_str(yaml).map_err(|e| {
            let mut message = format!("Failed to parse DSL: {e}");
            if let Some(location) = e.location() {
                message = format!(
                    "{message} at line {}, column {}",
                    location.line(),
                    location.column()
                );
            }
            Error::Parse(message)
        })
    }

    /// Parse and build every declared definition
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] for malformed YAML and a configuration error
    /// for unknown resource types, converters or collection serializers, and
    /// for mappings that do not fit their resource type.
    pub fn parse(yaml: &str, catalog: &ResourceCatalog) -> Result<SerializerSet> {
        let file = Self::parse_declarations(yaml)?;
        Self::build(&file, catalog)
    }

    /// Parse a DSL file
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] when the file cannot be read, otherwise as
    /// [`SerializerDsl::parse`].
    pub fn parse_file(path: &Path, catalog: &ResourceCatalog) -> Result<SerializerSet> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Parse(format!("Failed to read {}: {e}", path.display())))?;
        Self::parse(&content, catalog)
    }

    /// Build parsed declarations, in order
    ///
    /// # Errors
    ///
    /// See [`SerializerDsl::parse`].
    pub fn build(file: &SerializerFile, catalog: &ResourceCatalog) -> Result<SerializerSet> {
        let mut set = SerializerSet::default();

        for decl in &file.serializers {
            let resource_type = decl.resource_type.as_deref().unwrap_or(&decl.name);
            let schema = catalog.get(resource_type).ok_or_else(|| {
                Error::configuration(&decl.name, format!("unknown resource type '{resource_type}'"))
            })?;

            let mut builder = SerializerBuilder::new(&decl.name, schema);
            for mapping in &decl.mappings {
                builder = builder.mapping(Self::mapping(&decl.name, mapping, &set)?);
            }
            set.insert(builder.build()?)?;
        }

        tracing::debug!(definitions = set.len(), "built serializers from DSL");
        Ok(set)
    }

    fn mapping(serializer: &str, decl: &MappingDecl, set: &SerializerSet) -> Result<AttributeMapping> {
        if decl.identity {
            if decl.resource.is_some() || decl.has_many.is_some() {
                return Err(Error::configuration(
                    serializer,
                    format!("identity mapping '{}' cannot name a resource path", decl.external),
                ));
            }
            return Ok(AttributeMapping::identity(&decl.external));
        }

        let resource = decl.resource.as_deref().ok_or_else(|| {
            Error::configuration(
                serializer,
                format!("mapping '{}' has no resource path", decl.external),
            )
        })?;

        let mut mapping = match &decl.has_many {
            Some(nested) => {
                let definition = set.get(nested).ok_or_else(|| {
                    Error::configuration(
                        serializer,
                        format!("collection serializer '{nested}' is not declared before use"),
                    )
                })?;
                AttributeMapping::has_many(&decl.external, resource, definition)
            }
            None => AttributeMapping::new(&decl.external, resource),
        };

        if let Some(name) = &decl.converter {
            let converter = Converter::from_name(name).ok_or_else(|| {
                Error::configuration(serializer, format!("unknown converter '{name}'"))
            })?;
            mapping = mapping.with_converter(converter);
        }

        Ok(mapping.with_null_policy(decl.null.into()))
    }
}
