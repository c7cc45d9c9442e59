//! Operation lifecycle against a scripted adaptor that records every call.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use ledger_contract::{Contract, FieldRule, FieldType};
use ledger_operation::{
    Adaptor, ConfigurationError, Create, DomainError, Endpoint, Find, OperateError, Operation,
    OperationCore, OperationInfo, OperationKind, OperationRegistry, OperationResult, OperationState,
    Outcome, PerformError, Response, SubOperation, TransportError, Update, UpdateStrategy,
};
use ledger_resource::types::{department, vendor};
use ledger_resource::{Resource, Value};
use ledger_serializer::SerializerDefinition;
use serde_json::{Map, Value as Json, json};

#[derive(Debug, Clone, PartialEq)]
struct Call {
    method: &'static str,
    id: Option<String>,
    payload: Option<Map<String, Json>>,
}

#[derive(Default)]
struct ScriptedAdaptor {
    replies: Mutex<VecDeque<Result<Response, TransportError>>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedAdaptor {
    fn replying(replies: Vec<Result<Response, TransportError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::default(),
        })
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn next(&self, call: Call) -> Result<Response, TransportError> {
        self.calls.lock().unwrap().push(call);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Response::json(200, json!({}))))
    }
}

impl Adaptor for ScriptedAdaptor {
    fn name(&self) -> &str {
        "scripted"
    }

    fn create(&self, _: &str, payload: &Map<String, Json>) -> Result<Response, TransportError> {
        self.next(Call {
            method: "create",
            id: None,
            payload: Some(payload.clone()),
        })
    }

    fn find(&self, _: &str, id: &str) -> Result<Response, TransportError> {
        self.next(Call {
            method: "find",
            id: Some(id.to_string()),
            payload: None,
        })
    }

    fn update(
        &self,
        _: &str,
        id: &str,
        payload: &Map<String, Json>,
    ) -> Result<Response, TransportError> {
        self.next(Call {
            method: "update",
            id: Some(id.to_string()),
            payload: Some(payload.clone()),
        })
    }

    fn delete(&self, _: &str, id: &str) -> Result<Response, TransportError> {
        self.next(Call {
            method: "delete",
            id: Some(id.to_string()),
            payload: None,
        })
    }

    fn parse_operation_error(
        &self,
        error: &TransportError,
        operation: &OperationInfo,
    ) -> Option<DomainError> {
        (error.status == Some(404)).then(|| DomainError::NotFound {
            resource_type: operation.resource_type.clone(),
            message: error.message.clone(),
        })
    }
}

fn department_endpoint(strategy: UpdateStrategy) -> anyhow::Result<Endpoint> {
    let serializer = SerializerDefinition::builder(department())
        .id("Id")
        .attribute("Name", "name")
        .attribute("Active", "active")
        .attribute("ParentRef.value", "parent.ledger_id")
        .build()?;

    Ok(Endpoint::new(serializer)
        .supports(
            OperationKind::Create,
            Contract::new("department.create")
                .rule(FieldRule::required("ledger_id").nil())
                .rule(FieldRule::required("name").filled(FieldType::String)),
        )
        .supports(
            OperationKind::Find,
            Contract::new("department.find").rule(FieldRule::required("ledger_id").filled(FieldType::String)),
        )
        .supports(
            OperationKind::Update,
            Contract::new("department.update").rule(FieldRule::required("ledger_id").filled(FieldType::String)),
        )
        .with_update_strategy(strategy))
}

fn not_found() -> Result<Response, TransportError> {
    Err(TransportError::new(Some(404), "Object Not Found")
        .with_response(Response::json(404, json!({"Fault": "not found"}))))
}

fn unsaved(name: &str) -> anyhow::Result<Resource> {
    Ok(Resource::new(department()).with("name", name)?)
}

#[test]
fn performing_twice_runs_the_action_once() -> anyhow::Result<()> {
    let adaptor = ScriptedAdaptor::replying(vec![Ok(Response::json(200, json!({"Id": "41", "Name": "Ops"})))]);
    let endpoint = department_endpoint(UpdateStrategy::Partial)?;
    let mut operation = Create::new(adaptor.clone(), &endpoint, unsaved("Ops")?)?;

    let first = operation.perform()?;
    assert!(first.is_success());
    assert_eq!(first.resource().and_then(Resource::ledger_id), Some("41"));

    let second = operation.perform()?;
    assert!(matches!(second.error(), Some(DomainError::Performed { .. })));
    assert_eq!(adaptor.calls().len(), 1);
    assert_eq!(operation.result(), Some(&first));
    assert_eq!(operation.state(), OperationState::Succeeded);
    Ok(())
}

#[test]
fn create_omits_unset_identity_and_accepts_changes() -> anyhow::Result<()> {
    let adaptor = ScriptedAdaptor::replying(vec![Ok(Response::json(200, json!({"Id": "7", "Name": "Ops"})))]);
    let endpoint = department_endpoint(UpdateStrategy::Partial)?;
    let mut operation = Create::new(adaptor.clone(), &endpoint, unsaved("Ops")?)?;

    let result = operation.perform()?;
    let payload = adaptor.calls()[0].payload.clone().unwrap_or_default();
    assert!(!payload.contains_key("Id"));
    assert_eq!(payload["Name"], json!("Ops"));

    let resource = result.resource().expect("created resource");
    assert_eq!(resource.ledger_id(), Some("7"));
    assert!(!resource.has_changes());
    assert_eq!(operation.resource(), resource);
    Ok(())
}

#[test]
fn find_without_ledger_id_fails_without_calling_the_ledger() -> anyhow::Result<()> {
    let adaptor = ScriptedAdaptor::replying(Vec::new());
    let endpoint = department_endpoint(UpdateStrategy::Partial)?;
    let mut operation = Find::new(adaptor.clone(), &endpoint, Resource::new(department()))?;

    let result = operation.perform()?;
    assert!(result.is_failure());
    assert!(result.error().is_none());
    assert!(adaptor.calls().is_empty());
    Ok(())
}

#[test]
fn recognized_transport_error_becomes_failure() -> anyhow::Result<()> {
    let adaptor = ScriptedAdaptor::replying(vec![not_found()]);
    let endpoint = department_endpoint(UpdateStrategy::Partial)?;
    let resource = Resource::new(department()).with_ledger_id("404");
    let mut operation = Find::new(adaptor, &endpoint, resource)?;

    let result = operation.perform()?;
    assert!(matches!(result.error(), Some(DomainError::NotFound { .. })));
    assert_eq!(result.response().map(Response::status), Some(404));
    assert_eq!(operation.state(), OperationState::Failed);
    Ok(())
}

#[test]
fn unclaimed_transport_error_escapes_and_still_marks_performed() -> anyhow::Result<()> {
    let adaptor = ScriptedAdaptor::replying(vec![Err(TransportError::new(Some(500), "boom"))]);
    let endpoint = department_endpoint(UpdateStrategy::Partial)?;
    let resource = Resource::new(department()).with_ledger_id("1");
    let mut operation = Find::new(adaptor.clone(), &endpoint, resource)?;

    let err = operation.perform().unwrap_err();
    assert!(matches!(err, PerformError::Unclaimed(TransportError { status: Some(500), .. })));
    assert!(operation.is_performed());
    assert!(operation.result().is_none());

    let again = operation.perform()?;
    assert!(matches!(again.error(), Some(DomainError::Performed { .. })));
    assert_eq!(adaptor.calls().len(), 1);
    Ok(())
}

#[test]
fn failed_before_operation_aborts_the_composite() -> anyhow::Result<()> {
    let endpoint = department_endpoint(UpdateStrategy::Partial)?;
    let before_adaptor = ScriptedAdaptor::replying(vec![not_found()]);
    let root_adaptor = ScriptedAdaptor::replying(Vec::new());
    let after_adaptor = ScriptedAdaptor::replying(Vec::new());

    let parent = Resource::new(department()).with_ledger_id("missing");
    let before = Find::new(before_adaptor, &endpoint, parent.clone())?;
    let expected = Find::new(ScriptedAdaptor::replying(vec![not_found()]), &endpoint, parent)?.perform()?;

    let mut root = Create::new(root_adaptor.clone(), &endpoint, unsaved("Child")?)?;
    root.add_before_operation(SubOperation::new(Box::new(before)));
    root.add_after_operation(SubOperation::new(Box::new(Create::new(
        after_adaptor.clone(),
        &endpoint,
        unsaved("After")?,
    )?)));

    let result = root.perform()?;
    assert_eq!(result, expected);
    assert!(root_adaptor.calls().is_empty());
    assert!(after_adaptor.calls().is_empty());
    Ok(())
}

#[test]
fn before_hook_feeds_the_root_operation() -> anyhow::Result<()> {
    let endpoint = department_endpoint(UpdateStrategy::Partial)?;
    let parent_adaptor = ScriptedAdaptor::replying(vec![Ok(Response::json(200, json!({"Id": "10"})))]);
    let child_adaptor = ScriptedAdaptor::replying(vec![Ok(Response::json(200, json!({"Id": "11"})))]);

    let create_parent = Create::new(parent_adaptor, &endpoint, unsaved("Parent")?)?;
    let mut create_child = Create::new(child_adaptor.clone(), &endpoint, unsaved("Child")?)?;
    create_child.add_before_operation(SubOperation::new(Box::new(create_parent)).with_hook(
        |result: &OperationResult, child: &mut Resource| {
            child.set_reference("parent", result.resource().cloned())
        },
    ));

    let result = create_child.perform()?;
    assert!(result.is_success());
    let payload = child_adaptor.calls()[0].payload.clone().unwrap_or_default();
    assert_eq!(payload["ParentRef"], json!({"value": "10"}));
    Ok(())
}

#[test]
fn failed_after_operation_aborts_and_restores_the_resource() -> anyhow::Result<()> {
    let endpoint = department_endpoint(UpdateStrategy::Partial)?;
    let root_adaptor = ScriptedAdaptor::replying(vec![Ok(Response::json(200, json!({"Id": "20", "Name": "Root"})))]);
    let later_adaptor = ScriptedAdaptor::replying(Vec::new());

    let missing = Resource::new(department()).with_ledger_id("missing");
    let failing = Find::new(ScriptedAdaptor::replying(vec![not_found()]), &endpoint, missing.clone())?;
    let expected = Find::new(ScriptedAdaptor::replying(vec![not_found()]), &endpoint, missing)?.perform()?;

    let original = unsaved("Root")?;
    let mut root = Create::new(root_adaptor.clone(), &endpoint, original.clone())?;
    root.add_after_operation(SubOperation::new(Box::new(failing)));
    root.add_after_operation(SubOperation::new(Box::new(Create::new(
        later_adaptor.clone(),
        &endpoint,
        unsaved("Later")?,
    )?)));

    let result = root.perform()?;
    assert_eq!(result, expected);
    assert_eq!(root_adaptor.calls().len(), 1);
    assert!(later_adaptor.calls().is_empty());
    assert_eq!(root.state(), OperationState::Failed);
    assert_eq!(root.result(), Some(&expected));
    assert_eq!(root.resource(), &original);
    Ok(())
}

#[test]
fn root_operation_result_replaces_own_action() -> anyhow::Result<()> {
    let endpoint = department_endpoint(UpdateStrategy::Partial)?;
    let own_adaptor = ScriptedAdaptor::replying(Vec::new());
    let root_adaptor = ScriptedAdaptor::replying(vec![Ok(Response::json(200, json!({"Id": "30", "Name": "Found"})))]);

    let mut composite = Create::new(own_adaptor.clone(), &endpoint, unsaved("Composite")?)?;
    composite.set_root_operation(Box::new(Find::new(
        root_adaptor.clone(),
        &endpoint,
        Resource::new(department()).with_ledger_id("30"),
    )?));

    let result = composite.perform()?;
    assert!(result.is_success());
    assert_eq!(result.operation().kind, OperationKind::Find);
    assert_eq!(result.resource().and_then(Resource::ledger_id), Some("30"));
    assert!(own_adaptor.calls().is_empty());
    assert_eq!(root_adaptor.calls().len(), 1);
    assert_eq!(composite.state(), OperationState::Succeeded);
    Ok(())
}

#[test]
fn failed_root_operation_skips_after_operations() -> anyhow::Result<()> {
    let endpoint = department_endpoint(UpdateStrategy::Partial)?;
    let own_adaptor = ScriptedAdaptor::replying(Vec::new());
    let after_adaptor = ScriptedAdaptor::replying(Vec::new());

    let missing = Resource::new(department()).with_ledger_id("missing");
    let expected = Find::new(ScriptedAdaptor::replying(vec![not_found()]), &endpoint, missing.clone())?.perform()?;

    let original = unsaved("Composite")?;
    let mut composite = Create::new(own_adaptor.clone(), &endpoint, original.clone())?;
    composite.set_root_operation(Box::new(Find::new(
        ScriptedAdaptor::replying(vec![not_found()]),
        &endpoint,
        missing,
    )?));
    composite.add_after_operation(SubOperation::new(Box::new(Create::new(
        after_adaptor.clone(),
        &endpoint,
        unsaved("After")?,
    )?)));

    let result = composite.perform()?;
    assert_eq!(result, expected);
    assert!(own_adaptor.calls().is_empty());
    assert!(after_adaptor.calls().is_empty());
    assert_eq!(composite.state(), OperationState::Failed);
    assert_eq!(composite.resource(), &original);
    Ok(())
}

#[test]
fn failing_hook_stops_the_composite_and_restores_the_resource() -> anyhow::Result<()> {
    let endpoint = department_endpoint(UpdateStrategy::Partial)?;
    let parent_adaptor = ScriptedAdaptor::replying(vec![Ok(Response::json(200, json!({"Id": "10"})))]);
    let child_adaptor = ScriptedAdaptor::replying(Vec::new());

    let original = unsaved("Child")?;
    let mut create_child = Create::new(child_adaptor.clone(), &endpoint, original.clone())?;
    let create_parent = Create::new(parent_adaptor, &endpoint, unsaved("Parent")?)?;
    create_child.add_before_operation(SubOperation::new(Box::new(create_parent)).with_hook(
        |_: &OperationResult, child: &mut Resource| {
            child.set("name", "Half done")?;
            child.set("colour", "red")
        },
    ));

    let err = create_child.perform().unwrap_err();
    assert!(matches!(
        err,
        PerformError::Configuration(ConfigurationError::Resource(_))
    ));
    assert!(child_adaptor.calls().is_empty());
    assert_eq!(create_child.state(), OperationState::Failed);
    assert!(create_child.result().is_none());
    assert_eq!(create_child.resource(), &original);
    Ok(())
}

/// Looks a record up and refuses whatever the ledger sent back
struct ArchivedFind {
    core: OperationCore,
}

impl Operation for ArchivedFind {
    fn core(&self) -> &OperationCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut OperationCore {
        &mut self.core
    }

    fn operate(&mut self) -> Result<Outcome, OperateError> {
        let response = self.core.adaptor().find(self.core.resource_type(), "5")?;
        Err(OperateError::from(DomainError::operation("record is archived")).with_response(&response))
    }
}

#[test]
fn domain_failure_after_a_reply_keeps_the_response() -> anyhow::Result<()> {
    let body = json!({"Id": "5", "Archived": true});
    let adaptor = ScriptedAdaptor::replying(vec![Ok(Response::json(200, body.clone()))]);
    let endpoint = department_endpoint(UpdateStrategy::Partial)?;
    let resource = Resource::new(department()).with_ledger_id("5");
    let mut operation = ArchivedFind {
        core: OperationCore::new(OperationKind::Find, adaptor, &endpoint, resource)?,
    };

    let result = operation.perform()?;
    assert_eq!(result.error(), Some(&DomainError::operation("record is archived")));
    assert_eq!(result.response().and_then(Response::body), Some(&body));
    assert_eq!(operation.state(), OperationState::Failed);
    Ok(())
}

#[test]
fn partial_update_sends_changes_and_identity() -> anyhow::Result<()> {
    let adaptor = ScriptedAdaptor::replying(vec![Ok(Response::json(200, json!({"Id": "5", "Name": "Platform"})))]);
    let endpoint = department_endpoint(UpdateStrategy::Partial)?;
    let mut resource = unsaved("Engineering")?.with("active", true)?.with_ledger_id("5");
    resource.changes_applied();
    resource.set("name", "Platform")?;

    let mut operation = Update::new(adaptor.clone(), &endpoint, resource)?;
    let result = operation.perform()?;
    assert!(result.is_success());

    let call = &adaptor.calls()[0];
    assert_eq!(call.id.as_deref(), Some("5"));
    assert_eq!(
        call.payload.clone().map(Json::Object),
        Some(json!({"Id": "5", "Name": "Platform"}))
    );
    Ok(())
}

#[test]
fn partial_update_ignores_edits_made_on_the_ledger() -> anyhow::Result<()> {
    // The ledger renamed the record since it was fetched; the diff only sees
    // the local snapshot, so the rename is neither sent nor guarded against.
    let adaptor = ScriptedAdaptor::replying(vec![Ok(Response::json(
        200,
        json!({"Id": "5", "Name": "Renamed Elsewhere", "Active": false}),
    ))]);
    let endpoint = department_endpoint(UpdateStrategy::Partial)?;
    let mut resource = unsaved("Engineering")?.with("active", true)?.with_ledger_id("5");
    resource.changes_applied();
    resource.set("active", false)?;

    let mut operation = Update::new(adaptor.clone(), &endpoint, resource)?;
    let result = operation.perform()?;

    assert_eq!(
        adaptor.calls()[0].payload.clone().map(Json::Object),
        Some(json!({"Id": "5", "Active": false}))
    );
    let updated = result.resource().expect("successful update carries a resource");
    assert_eq!(updated.get("name")?, &Value::from("Renamed Elsewhere"));
    Ok(())
}

#[test]
fn full_update_merges_over_the_fetched_record() -> anyhow::Result<()> {
    let adaptor = ScriptedAdaptor::replying(vec![
        Ok(Response::json(200, json!({"Id": "5", "Name": "Engineering", "SyncToken": "2"}))),
        Ok(Response::json(200, json!({"Id": "5", "Name": "Platform", "SyncToken": "3"}))),
    ]);
    let endpoint = department_endpoint(UpdateStrategy::Full)?;
    let mut resource = unsaved("Engineering")?.with_ledger_id("5");
    resource.changes_applied();
    resource.set("name", "Platform")?;

    let mut operation = Update::new(adaptor.clone(), &endpoint, resource)?;
    assert!(operation.perform()?.is_success());

    let calls = adaptor.calls();
    assert_eq!(calls.iter().map(|c| c.method).collect::<Vec<_>>(), ["find", "update"]);
    assert_eq!(
        calls[1].payload.clone().map(Json::Object),
        Some(json!({"Id": "5", "Name": "Platform", "SyncToken": "2"}))
    );
    Ok(())
}

#[test]
fn update_without_ledger_id_is_a_failure() -> anyhow::Result<()> {
    let adaptor = ScriptedAdaptor::replying(Vec::new());
    let endpoint = department_endpoint(UpdateStrategy::Partial)?;
    let mut operation = Update::new(adaptor.clone(), &endpoint, unsaved("Ops")?)?;

    let result = operation.perform()?;
    assert!(matches!(result.error(), Some(DomainError::Operation { .. })));
    assert!(adaptor.calls().is_empty());
    Ok(())
}

#[test]
fn validation_is_repeatable_and_leaves_result_alone() -> anyhow::Result<()> {
    let endpoint = department_endpoint(UpdateStrategy::Partial)?;
    let operation = Create::new(ScriptedAdaptor::replying(Vec::new()), &endpoint, Resource::new(department()))?;

    assert!(!operation.valid());
    let errors = operation.errors();
    assert_eq!(errors["name"], ["must be filled"]);
    assert_eq!(operation.validate(), operation.validate());
    assert!(operation.result().is_none());
    assert!(!operation.is_performed());
    Ok(())
}

#[test]
fn construction_rejects_mismatched_resources_and_kinds() -> anyhow::Result<()> {
    let endpoint = department_endpoint(UpdateStrategy::Partial)?;
    let adaptor = ScriptedAdaptor::replying(Vec::new());

    let mismatch = Create::new(adaptor.clone(), &endpoint, Resource::new(vendor()));
    assert!(matches!(mismatch, Err(ConfigurationError::ResourceMismatch { .. })));

    let delete = ledger_operation::Delete::new(adaptor, &endpoint, Resource::new(department()));
    assert!(matches!(delete, Err(ConfigurationError::MissingContract { .. })));
    Ok(())
}

#[test]
fn registry_builds_registered_operations() -> anyhow::Result<()> {
    let registry = OperationRegistry::new();
    registry.register("scripted", department_endpoint(UpdateStrategy::Partial)?);
    assert_eq!(registry.len(), 3);
    assert!(registry.contains("scripted", "department", OperationKind::Find));

    let adaptor = ScriptedAdaptor::replying(vec![Ok(Response::json(200, json!({"Id": "3", "Name": "HQ"})))]);
    let resource = Resource::new(department()).with_ledger_id("3");
    let mut operation = registry.new_operation(adaptor.clone(), OperationKind::Find, resource)?;
    assert_eq!(operation.kind(), OperationKind::Find);

    let result = operation.perform()?;
    assert_eq!(
        result.resource().map(|r| r.get("name").cloned()).transpose()?,
        Some(Value::from("HQ"))
    );

    let unknown = registry.new_operation(adaptor, OperationKind::Delete, Resource::new(department()));
    assert!(matches!(unknown, Err(ConfigurationError::UnknownOperation { .. })));
    Ok(())
}

#[test]
fn operations_compare_by_kind_and_resource() -> anyhow::Result<()> {
    let endpoint = department_endpoint(UpdateStrategy::Partial)?;
    let adaptor = ScriptedAdaptor::replying(Vec::new());
    let resource = Resource::new(department()).with_ledger_id("1");

    let a: Box<dyn Operation> = Box::new(Find::new(adaptor.clone(), &endpoint, resource.clone())?);
    let b: Box<dyn Operation> = Box::new(Find::new(adaptor.clone(), &endpoint, resource.clone())?);
    let c: Box<dyn Operation> = Box::new(Update::new(adaptor, &endpoint, resource)?);

    assert!(*a == *b);
    assert!(*a != *c);
    Ok(())
}
