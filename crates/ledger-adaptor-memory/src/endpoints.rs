//! Built-in endpoints
//!
//! Serializers and contracts for the built-in resource types. Payloads use
//! the shape of a hosted accounting ledger: capitalized keys, references as
//! `XxxRef.value`, amounts as decimals and dates as `YYYY-MM-DD`.
//!
//! Expense line items have no endpoint of their own; they travel inside an
//! expense's `Line` array.

use std::sync::Arc;

use ledger_contract::{Contract, FieldRule, FieldType, Fill};
use ledger_operation::{Endpoint, OperationKind, OperationRegistry, UpdateStrategy};
use ledger_resource::{EXTERNAL_ID, LEDGER_ID, types};
use ledger_serializer::{Converter, SerializerDefinition};
use serde_json::{Map, Value as Json};

use crate::{Error, Result};

/// Wire rule for one resource field
struct FieldSpec {
    name: &'static str,
    field_type: FieldType,
    /// Fill required when creating; other kinds accept null
    on_create: Fill,
    max_length: Option<usize>,
    one_of: &'static [&'static str],
}

const fn filled(name: &'static str, field_type: FieldType) -> FieldSpec {
    FieldSpec {
        name,
        field_type,
        on_create: Fill::Filled,
        max_length: None,
        one_of: &[],
    }
}

const fn maybe(name: &'static str, field_type: FieldType) -> FieldSpec {
    FieldSpec {
        name,
        field_type,
        on_create: Fill::Maybe,
        max_length: None,
        one_of: &[],
    }
}

impl FieldSpec {
    const fn max_length(mut self, max: usize) -> Self {
        self.max_length = Some(max);
        self
    }

    const fn one_of(mut self, values: &'static [&'static str]) -> Self {
        self.one_of = values;
        self
    }

    fn rule(&self, rule: FieldRule, fill: Fill) -> FieldRule {
        let mut rule = match fill {
            Fill::Filled => rule.filled(self.field_type),
            _ => rule.maybe(self.field_type),
        };
        if let Some(max) = self.max_length {
            rule = rule.max_length(max);
        }
        if !self.one_of.is_empty() {
            rule = rule.one_of(self.one_of.iter().copied());
        }
        rule
    }
}

const ACCOUNT_CLASSIFICATIONS: &[&str] = &["Asset", "Equity", "Expense", "Liability", "Revenue"];
const PAYMENT_TYPES: &[&str] = &["Cash", "Check", "CreditCard"];

const ACCOUNT_FIELDS: &[FieldSpec] = &[
    filled("name", FieldType::String).max_length(100),
    maybe("classification", FieldType::String).one_of(ACCOUNT_CLASSIFICATIONS),
    filled("account_type", FieldType::String),
    maybe("account_sub_type", FieldType::String),
    maybe("number", FieldType::Integer),
    maybe("currency", FieldType::String),
    maybe("description", FieldType::String).max_length(100),
    maybe("active", FieldType::Boolean),
];

const DEPARTMENT_FIELDS: &[FieldSpec] = &[
    filled("name", FieldType::String).max_length(100),
    maybe("fully_qualified_name", FieldType::String),
    maybe("active", FieldType::Boolean),
    maybe("sub_department", FieldType::Boolean),
    maybe("parent", FieldType::Reference),
];

const SUBSIDIARY_FIELDS: &[FieldSpec] = &[
    filled("name", FieldType::String),
    maybe("state", FieldType::String),
];

const VENDOR_FIELDS: &[FieldSpec] = &[
    filled("display_name", FieldType::String).max_length(100),
    maybe("company_name", FieldType::String),
    maybe("email", FieldType::String),
    maybe("first_name", FieldType::String),
    maybe("last_name", FieldType::String),
    maybe("phone_number", FieldType::String),
    maybe("subsidiary", FieldType::Reference),
];

const EXPENSE_FIELDS: &[FieldSpec] = &[
    maybe("currency", FieldType::String),
    maybe("memo", FieldType::String),
    filled("payment_type", FieldType::String).one_of(PAYMENT_TYPES),
    filled("transaction_date", FieldType::Date),
    maybe("exchange_rate", FieldType::Float),
    maybe("reference_number", FieldType::String),
    filled("account", FieldType::Reference),
    maybe("entity", FieldType::Reference),
    maybe("line_items", FieldType::ReferenceList),
];

const TRANSFER_FIELDS: &[FieldSpec] = &[
    filled("amount", FieldType::Integer),
    filled("currency", FieldType::String),
    filled("memo", FieldType::String),
    filled("transaction_date", FieldType::Date),
    filled("from_account", FieldType::Reference),
    filled("to_account", FieldType::Reference),
];

fn contract(resource_type: &str, kind: OperationKind, fields: &[FieldSpec]) -> Contract {
    let name = format!("{resource_type}.{kind}");
    let external_id = FieldRule::required(EXTERNAL_ID).maybe(FieldType::String);

    match kind {
        OperationKind::Create => fields.iter().fold(
            Contract::new(name)
                .rule(external_id)
                .rule(FieldRule::required(LEDGER_ID).nil()),
            |contract, field| contract.rule(field.rule(FieldRule::required(field.name), field.on_create)),
        ),
        OperationKind::Find => fields.iter().fold(
            Contract::new(name)
                .rule(external_id)
                .rule(FieldRule::required(LEDGER_ID).filled(FieldType::String)),
            |contract, field| contract.rule(field.rule(FieldRule::required(field.name), Fill::Maybe)),
        ),
        OperationKind::Update => fields.iter().fold(
            Contract::new(name)
                .rule(external_id)
                .rule(FieldRule::required(LEDGER_ID).filled(FieldType::String)),
            |contract, field| contract.rule(field.rule(FieldRule::optional(field.name), Fill::Maybe)),
        ),
        OperationKind::Delete => Contract::new(name)
            .rule(external_id)
            .rule(FieldRule::required(LEDGER_ID).filled(FieldType::String)),
    }
}

fn with_kinds(mut endpoint: Endpoint, kinds: &[OperationKind], fields: &[FieldSpec]) -> Endpoint {
    let resource_type = endpoint.resource_type().to_string();
    for &kind in kinds {
        endpoint = endpoint.supports(kind, contract(&resource_type, kind, fields));
    }
    endpoint
}

/// Insert `{"type": ...}` beside an entity reference's value
fn tag_reference(out: &mut Map<String, Json>, key: &str, entity_type: &str) {
    let Some(Json::Object(reference)) = out.get_mut(key) else {
        return;
    };
    if reference.get("value").is_some_and(|value| !value.is_null()) {
        reference.insert("type".to_string(), Json::String(entity_type.to_string()));
    }
}

fn account() -> Result<Endpoint> {
    let serializer = SerializerDefinition::builder(types::account())
        .id("Id")
        .attribute("Name", "name")
        .attribute("Classification", "classification")
        .attribute("AccountType", "account_type")
        .attribute("AccountSubType", "account_sub_type")
        .attribute("AcctNum", "number")
        .attribute("CurrencyRef.value", "currency")
        .attribute("Description", "description")
        .attribute("Active", "active")
        .build()?;

    Ok(with_kinds(Endpoint::new(serializer), &OperationKind::ALL, ACCOUNT_FIELDS))
}

fn department() -> Result<Endpoint> {
    let serializer = SerializerDefinition::builder(types::department())
        .id("Id")
        .attribute("Name", "name")
        .attribute("Active", "active")
        .attribute("SubDepartment", "sub_department")
        .attribute("FullyQualifiedName", "fully_qualified_name")
        .attribute("ParentRef.value", "parent.ledger_id")
        // The ledger rejects a null ParentRef; only send it when the parent
        // was deliberately assigned.
        .post_process(|resource, out| {
            if !resource.changed("parent") {
                out.remove("ParentRef");
            }
        })
        .build()?;

    Ok(with_kinds(Endpoint::new(serializer), &OperationKind::ALL, DEPARTMENT_FIELDS))
}

fn subsidiary() -> Result<Endpoint> {
    let serializer = SerializerDefinition::builder(types::subsidiary())
        .id("Id")
        .attribute("Name", "name")
        .attribute("State", "state")
        .build()?;

    Ok(with_kinds(Endpoint::new(serializer), &OperationKind::ALL, SUBSIDIARY_FIELDS))
}

fn vendor() -> Result<Endpoint> {
    let serializer = SerializerDefinition::builder(types::vendor())
        .id("Id")
        .attribute("DisplayName", "display_name")
        .attribute("CompanyName", "company_name")
        .attribute("GivenName", "first_name")
        .attribute("FamilyName", "last_name")
        .attribute("PrimaryEmailAddr.Address", "email")
        .attribute("PrimaryPhone.FreeFormNumber", "phone_number")
        .attribute("SubsidiaryRef.value", "subsidiary.ledger_id")
        .build()?;

    Ok(with_kinds(Endpoint::new(serializer), &OperationKind::ALL, VENDOR_FIELDS)
        .with_update_strategy(UpdateStrategy::Full))
}

fn expense_line_item() -> Result<SerializerDefinition> {
    Ok(SerializerDefinition::builder(types::expense_line_item())
        .id("Id")
        .attribute_with("Amount", "amount", Converter::Amount)
        .attribute("Description", "description")
        .attribute(
            "AccountBasedExpenseLineDetail.AccountRef.value",
            "account.ledger_id",
        )
        .post_process(|_, out| {
            out.insert(
                "DetailType".to_string(),
                Json::String("AccountBasedExpenseLineDetail".to_string()),
            );
        })
        .build()?)
}

fn expense() -> Result<Endpoint> {
    let line_item = Arc::new(expense_line_item()?);
    let serializer = SerializerDefinition::builder(types::expense())
        .id("Id")
        .attribute("CurrencyRef.value", "currency")
        .attribute("PrivateNote", "memo")
        .attribute("PaymentType", "payment_type")
        .attribute_with("TxnDate", "transaction_date", Converter::Date)
        .attribute("ExchangeRate", "exchange_rate")
        .attribute("DocNumber", "reference_number")
        .attribute("AccountRef.value", "account.ledger_id")
        .attribute("EntityRef.value", "entity.ledger_id")
        .references_many("Line", "line_items", line_item)
        .post_process(|_, out| tag_reference(out, "EntityRef", "Vendor"))
        .build()?;

    Ok(with_kinds(Endpoint::new(serializer), &OperationKind::ALL, EXPENSE_FIELDS))
}

fn transfer() -> Result<Endpoint> {
    let serializer = SerializerDefinition::builder(types::transfer())
        .id("Id")
        .attribute_with("Amount", "amount", Converter::Amount)
        .attribute("CurrencyRef.value", "currency")
        .attribute("PrivateNote", "memo")
        .attribute_with("TxnDate", "transaction_date", Converter::Date)
        .attribute("FromAccountRef.value", "from_account.ledger_id")
        .attribute("ToAccountRef.value", "to_account.ledger_id")
        .build()?;

    Ok(with_kinds(
        Endpoint::new(serializer),
        &[OperationKind::Create, OperationKind::Find],
        TRANSFER_FIELDS,
    ))
}

/// Built-in endpoint for `resource_type`
///
/// # Errors
///
/// Returns [`Error::UnknownResourceType`] for types without an endpoint and
/// a serializer error if a definition does not fit its schema.
pub fn endpoint(resource_type: &str) -> Result<Endpoint> {
    match resource_type {
        "account" => account(),
        "department" => department(),
        "subsidiary" => subsidiary(),
        "vendor" => vendor(),
        "expense" => expense(),
        "transfer" => transfer(),
        other => Err(Error::UnknownResourceType(other.to_string())),
    }
}

/// Every built-in endpoint
///
/// # Errors
///
/// Returns a serializer error if a definition does not fit its schema.
pub fn endpoints() -> Result<Vec<Endpoint>> {
    Ok(vec![
        account()?,
        department()?,
        subsidiary()?,
        vendor()?,
        expense()?,
        transfer()?,
    ])
}

/// Register every built-in endpoint under `adaptor`.
///
/// # Errors
///
/// Returns a serializer error if a definition does not fit its schema.
pub fn register(registry: &OperationRegistry, adaptor: &str) -> Result<()> {
    let endpoints = endpoints()?;
    tracing::info!(adaptor, endpoints = endpoints.len(), "registering built-in endpoints");
    for endpoint in endpoints {
        registry.register(adaptor, endpoint);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_resource::Resource;
    use serde_json::json;

    #[test]
    fn test_every_endpoint_builds() {
        let endpoints = endpoints().unwrap();
        let names: Vec<&str> = endpoints.iter().map(Endpoint::resource_type).collect();
        assert_eq!(
            names,
            ["account", "department", "subsidiary", "vendor", "expense", "transfer"]
        );
    }

    #[test]
    fn test_register_covers_supported_kinds() {
        let registry = OperationRegistry::new();
        register(&registry, "memory").unwrap();

        assert!(registry.contains("memory", "vendor", OperationKind::Update));
        assert!(registry.contains("memory", "transfer", OperationKind::Create));
        assert!(!registry.contains("memory", "transfer", OperationKind::Delete));
        assert!(!registry.contains("memory", "expense_line_item", OperationKind::Create));
        assert_eq!(registry.len(), 5 * 4 + 2);
    }

    #[test]
    fn test_unknown_type_has_no_endpoint() {
        assert!(matches!(
            endpoint("invoice"),
            Err(Error::UnknownResourceType(name)) if name == "invoice"
        ));
    }

    #[test]
    fn test_create_contract_requires_filled_fields() {
        let endpoint = endpoint("transfer").unwrap();
        let contract = endpoint.contract(OperationKind::Create).unwrap();

        let result = contract.validate(&Resource::new(types::transfer()).wire_data());
        assert!(!result.is_valid());
        assert_eq!(result.messages_for("amount"), ["must be filled"]);
        assert_eq!(result.messages_for("from_account"), ["must be filled"]);
        assert!(result.messages_for(LEDGER_ID).is_empty());
    }

    #[test]
    fn test_find_contract_requires_ledger_id_only() {
        let endpoint = endpoint("account").unwrap();
        let contract = endpoint.contract(OperationKind::Find).unwrap();

        let missing = contract.validate(&Resource::new(types::account()).wire_data());
        assert_eq!(missing.messages_for(LEDGER_ID), ["must be filled"]);
        assert_eq!(missing.errors().len(), 1);

        let present = Resource::new(types::account()).with_ledger_id("12");
        assert!(contract.validate(&present.wire_data()).is_valid());
    }

    #[test]
    fn test_one_of_and_max_length_rules() {
        let endpoint = endpoint("account").unwrap();
        let contract = endpoint.contract(OperationKind::Update).unwrap();
        let account = Resource::new(types::account())
            .with_ledger_id("1")
            .with("classification", "Stuff")
            .unwrap()
            .with("name", "x".repeat(101).as_str())
            .unwrap();

        let result = contract.validate(&account.wire_data());
        assert_eq!(
            result.messages_for("classification"),
            ["must be one of: Asset, Equity, Expense, Liability, Revenue"]
        );
        assert_eq!(result.messages_for("name"), ["size cannot be greater than 100"]);
    }

    #[test]
    fn test_department_parent_ref_sent_only_when_assigned() {
        let endpoint = endpoint("department").unwrap();
        let plain = Resource::new(types::department()).with("name", "Ops").unwrap();
        let out = endpoint.serializer().serializer(&plain).unwrap().to_external(false).unwrap();
        assert!(!out.contains_key("ParentRef"));

        let parent = Resource::new(types::department()).with_ledger_id("3");
        let child = plain.with_reference("parent", parent).unwrap();
        let out = endpoint.serializer().serializer(&child).unwrap().to_external(false).unwrap();
        assert_eq!(out["ParentRef"], json!({"value": "3"}));
    }

    #[test]
    fn test_expense_payload_shape() {
        let endpoint = endpoint("expense").unwrap();
        let line = Resource::new(types::expense_line_item())
            .with("amount", 1250_i64)
            .unwrap()
            .with_reference("account", Resource::new(types::account()).with_ledger_id("80"))
            .unwrap();
        let expense = Resource::new(types::expense())
            .with("payment_type", "Cash")
            .unwrap()
            .with_reference("entity", Resource::new(types::vendor()).with_ledger_id("56"))
            .unwrap()
            .with_many("line_items", vec![line])
            .unwrap();

        let out = endpoint.serializer().serializer(&expense).unwrap().to_external(false).unwrap();

        assert_eq!(out["EntityRef"], json!({"value": "56", "type": "Vendor"}));
        assert_eq!(out["Line"][0]["Amount"], json!(12.5));
        assert_eq!(out["Line"][0]["DetailType"], "AccountBasedExpenseLineDetail");
        assert_eq!(
            out["Line"][0]["AccountBasedExpenseLineDetail"]["AccountRef"]["value"],
            "80"
        );
    }

    #[test]
    fn test_vendor_uses_full_updates() {
        assert_eq!(endpoint("vendor").unwrap().update_strategy(), UpdateStrategy::Full);
        assert_eq!(endpoint("account").unwrap().update_strategy(), UpdateStrategy::Partial);
    }
}
