//! Resource input
//!
//! Resources are given on the command line as JSON objects keyed by field
//! name. References nest: `{"parent": {"ledger_id": "3"}}`, and many
//! references take arrays of objects.

use ledger_resource::{EXTERNAL_ID, Field, ReferenceKind, Resource, ResourceSchema, Value};
use serde_json::{Map, Value as Json};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InputError {
    #[error("Invalid JSON input: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Expected a JSON object for '{context}', found {found}")]
    NotAnObject { context: String, found: String },

    #[error("'{field}' must be a string or null")]
    Identity { field: String },

    #[error(transparent)]
    Resource(#[from] ledger_resource::Error),
}

/// Parse `text` as a resource of `schema`
pub fn parse_resource(schema: &'static ResourceSchema, text: &str) -> Result<Resource, InputError> {
    let json: Json = serde_json::from_str(text)?;
    resource_from_json(schema, &json, schema.type_name())
}

fn resource_from_json(
    schema: &'static ResourceSchema,
    json: &Json,
    context: &str,
) -> Result<Resource, InputError> {
    let object = as_object(json, context)?;
    let mut resource = Resource::new(schema);
    for (name, value) in object {
        set_field(&mut resource, name, value)?;
    }
    Ok(resource)
}

fn set_field(resource: &mut Resource, name: &str, value: &Json) -> Result<(), InputError> {
    let schema = resource.schema();
    match schema.field(name)? {
        Field::Identity(field) => {
            let id = match value {
                Json::Null => None,
                Json::String(id) => Some(id.clone()),
                _ => {
                    return Err(InputError::Identity {
                        field: field.to_string(),
                    });
                }
            };
            match (field, id) {
                (EXTERNAL_ID, Some(id)) => resource.set_external_id(id),
                (_, Some(id)) => resource.set_ledger_id(id),
                (EXTERNAL_ID, None) => {}
                (_, None) => resource.clear_ledger_id(),
            }
        }
        Field::Attribute(def) => {
            resource.set(name, Value::from_json(value, def.attribute_type)?)?;
        }
        Field::Reference(def) => {
            let target = def.target_schema();
            let context = format!("{}.{name}", schema.type_name());
            match def.kind {
                ReferenceKind::One if value.is_null() => resource.set_reference(name, None)?,
                ReferenceKind::One => {
                    let referenced = resource_from_json(target, value, &context)?;
                    resource.set_reference(name, Some(referenced))?;
                }
                ReferenceKind::Many => {
                    let items = match value {
                        Json::Null => Vec::new(),
                        Json::Array(items) => items
                            .iter()
                            .map(|item| resource_from_json(target, item, &context))
                            .collect::<Result<_, _>>()?,
                        other => {
                            return Err(InputError::NotAnObject {
                                context,
                                found: other.to_string(),
                            });
                        }
                    };
                    resource.set_many(name, items)?;
                }
            }
        }
    }
    Ok(())
}

fn as_object<'a>(json: &'a Json, context: &str) -> Result<&'a Map<String, Json>, InputError> {
    json.as_object().ok_or_else(|| InputError::NotAnObject {
        context: context.to_string(),
        found: json.to_string(),
    })
}
