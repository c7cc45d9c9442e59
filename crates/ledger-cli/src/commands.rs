//! Subcommand handlers

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, bail};
use ledger_adaptor_memory::MemoryAdaptor;
use ledger_operation::{Operation, OperationKind, OperationRegistry, OperationResult};
use ledger_resource::{Resource, ResourceCatalog};
use ledger_serializer::SerializerDsl;
use serde_json::{Value as Json, json};

use crate::config::CliConfig;
use crate::input::parse_resource;

pub const EXIT_INVALID: u8 = 1;
pub const EXIT_FAILURE: u8 = 2;

/// Registry and adaptor set up from the configuration
pub struct Ledger {
    catalog: ResourceCatalog,
    registry: OperationRegistry,
    adaptor: Arc<MemoryAdaptor>,
}

impl Ledger {
    pub fn from_config(config: &CliConfig) -> anyhow::Result<Self> {
        let catalog = ResourceCatalog::builtin();
        let registry = OperationRegistry::new();
        ledger_adaptor_memory::register(&registry, &config.adaptor)?;

        if let Some(path) = &config.mappings {
            apply_mappings(&registry, &config.adaptor, path, &catalog)?;
        }

        let adaptor = Arc::new(MemoryAdaptor::with_builtin_rules(&config.adaptor)?);
        adaptor.seed(&config.seed).context("failed to seed the ledger")?;

        Ok(Self {
            catalog,
            registry,
            adaptor,
        })
    }

    fn operation(&self, kind: OperationKind, resource: Resource) -> anyhow::Result<Box<dyn Operation>> {
        Ok(self.registry.new_operation(self.adaptor.clone(), kind, resource)?)
    }

    fn resource(&self, resource_type: &str, source: &ResourceSource) -> anyhow::Result<Resource> {
        let Some(schema) = self.catalog.get(resource_type) else {
            bail!(
                "unknown resource type '{resource_type}' (known: {})",
                self.catalog.type_names().join(", ")
            );
        };

        let text = match (&source.data, &source.file) {
            (Some(data), _) => data.clone(),
            (None, Some(path)) => fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?,
            (None, None) => "{}".to_string(),
        };

        let mut resource = parse_resource(schema, &text)?;
        if let Some(id) = &source.id {
            resource.set_ledger_id(id.clone());
        }
        Ok(resource)
    }
}

/// Replace built-in serializers with definitions from a mapping file.
///
/// Only definitions named after a registered resource type replace anything;
/// others serve as collection serializers for those.
fn apply_mappings(
    registry: &OperationRegistry,
    adaptor: &str,
    path: &Path,
    catalog: &ResourceCatalog,
) -> anyhow::Result<()> {
    let set = SerializerDsl::parse_file(path, catalog)
        .with_context(|| format!("invalid mappings {}", path.display()))?;

    for name in set.names() {
        let Some(definition) = set.get(name) else {
            continue;
        };
        let Some(endpoint) = OperationKind::ALL
            .into_iter()
            .find_map(|kind| registry.endpoint(adaptor, name, kind))
        else {
            tracing::debug!(serializer = %name, "no endpoint to replace");
            continue;
        };

        let endpoint = endpoint.as_ref().clone().with_serializer(definition)?;
        tracing::info!(serializer = %name, path = %path.display(), "using declared serializer");
        registry.register(adaptor, endpoint);
    }
    Ok(())
}

/// Where a resource comes from
pub struct ResourceSource {
    pub data: Option<String>,
    pub file: Option<PathBuf>,
    pub id: Option<String>,
}

fn print_json(value: &Json, pretty: bool) -> anyhow::Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{text}");
    Ok(())
}

fn report(result: &OperationResult) -> Json {
    match result {
        OperationResult::Success {
            operation,
            resource,
            response,
        } => json!({
            "result": "success",
            "operation": operation.to_string(),
            "resource": resource.wire_data(),
            "response": response.body(),
        }),
        OperationResult::Failure {
            operation,
            error,
            response,
            ..
        } => json!({
            "result": "failure",
            "operation": operation.to_string(),
            "error": error.as_ref().map(ToString::to_string),
            "response": response.as_ref().and_then(|response| response.body()),
        }),
    }
}

pub fn perform(
    ledger: &Ledger,
    kind: OperationKind,
    resource_type: &str,
    source: &ResourceSource,
    skip_validation: bool,
    pretty: bool,
) -> anyhow::Result<ExitCode> {
    let resource = ledger.resource(resource_type, source)?;
    let mut operation = ledger.operation(kind, resource)?;

    if !skip_validation {
        let validation = operation.validate();
        if !validation.is_valid() {
            print_json(
                &json!({
                    "result": "invalid",
                    "operation": operation.info().to_string(),
                    "errors": validation.errors(),
                }),
                pretty,
            )?;
            return Ok(ExitCode::from(EXIT_INVALID));
        }
    }

    let result = operation.perform()?;
    print_json(&report(&result), pretty)?;

    Ok(if result.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_FAILURE)
    })
}

pub fn validate(
    ledger: &Ledger,
    kind: OperationKind,
    resource_type: &str,
    source: &ResourceSource,
    pretty: bool,
) -> anyhow::Result<ExitCode> {
    let resource = ledger.resource(resource_type, source)?;
    let operation = ledger.operation(kind, resource)?;
    let validation = operation.validate();

    print_json(
        &json!({
            "valid": validation.is_valid(),
            "operation": operation.info().to_string(),
            "errors": validation.errors(),
        }),
        pretty,
    )?;

    Ok(if validation.is_valid() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_INVALID)
    })
}

/// Print every registered operation, one per line
pub fn operations(ledger: &Ledger) -> ExitCode {
    for key in ledger.registry.keys() {
        println!("{key}");
    }
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_operation::DomainError;

    fn ledger() -> Ledger {
        Ledger::from_config(&CliConfig::default()).unwrap()
    }

    #[test]
    fn test_resource_applies_id_override() {
        let source = ResourceSource {
            data: Some(r#"{"name": "Cash", "ledger_id": "1"}"#.to_string()),
            file: None,
            id: Some("9".to_string()),
        };

        let resource = ledger().resource("account", &source).unwrap();
        assert_eq!(resource.ledger_id(), Some("9"));
    }

    #[test]
    fn test_unknown_resource_type_lists_known_types() {
        let source = ResourceSource {
            data: None,
            file: None,
            id: None,
        };

        let error = ledger().resource("invoice", &source).unwrap_err();
        assert!(error.to_string().contains("known: account, department"));
    }

    #[test]
    fn test_failure_report_carries_error_text() {
        let result = OperationResult::Failure {
            operation: ledger_operation::OperationInfo {
                kind: OperationKind::Find,
                resource_type: "vendor".to_string(),
                adaptor: "memory".to_string(),
            },
            error: Some(DomainError::operation("boom")),
            resource: None,
            response: None,
        };

        let report = report(&result);
        assert_eq!(report["result"], "failure");
        assert_eq!(report["operation"], "memory::vendor::find");
        assert_eq!(report["error"], "Operation failed: boom");
        assert!(report["response"].is_null());
    }
}
