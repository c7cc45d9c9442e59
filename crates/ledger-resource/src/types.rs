//! Built-in resource types
//!
//! Each type is a lazily built static schema exposed through a [`SchemaFn`],
//! which lets types reference each other (and themselves) freely.

use std::sync::LazyLock;

use crate::schema::{AttributeType, ResourceSchema, SchemaFn};

static ACCOUNT: LazyLock<ResourceSchema> = LazyLock::new(|| {
    ResourceSchema::new("account")
        .attribute("name", AttributeType::String)
        .attribute("classification", AttributeType::String)
        .attribute("account_type", AttributeType::String)
        .attribute("account_sub_type", AttributeType::String)
        .attribute("number", AttributeType::Integer)
        .attribute("currency", AttributeType::String)
        .attribute("description", AttributeType::String)
        .attribute("active", AttributeType::Boolean)
});

static DEPARTMENT: LazyLock<ResourceSchema> = LazyLock::new(|| {
    ResourceSchema::new("department")
        .attribute("name", AttributeType::String)
        .attribute("fully_qualified_name", AttributeType::String)
        .attribute("active", AttributeType::Boolean)
        .attribute("sub_department", AttributeType::Boolean)
        .references_one("parent", department)
});

static SUBSIDIARY: LazyLock<ResourceSchema> = LazyLock::new(|| {
    ResourceSchema::new("subsidiary")
        .attribute("name", AttributeType::String)
        .attribute("state", AttributeType::String)
});

static VENDOR: LazyLock<ResourceSchema> = LazyLock::new(|| {
    ResourceSchema::new("vendor")
        .attribute("company_name", AttributeType::String)
        .attribute("email", AttributeType::String)
        .attribute("display_name", AttributeType::String)
        .attribute("first_name", AttributeType::String)
        .attribute("last_name", AttributeType::String)
        .attribute("phone_number", AttributeType::String)
        .references_one("subsidiary", subsidiary)
});

static EXPENSE_LINE_ITEM: LazyLock<ResourceSchema> = LazyLock::new(|| {
    ResourceSchema::new("expense_line_item")
        .attribute("amount", AttributeType::Integer)
        .attribute("description", AttributeType::String)
        .references_one("account", account)
});

static EXPENSE: LazyLock<ResourceSchema> = LazyLock::new(|| {
    ResourceSchema::new("expense")
        .attribute("currency", AttributeType::String)
        .attribute("memo", AttributeType::String)
        .attribute("payment_type", AttributeType::String)
        .attribute("transaction_date", AttributeType::Date)
        .attribute("exchange_rate", AttributeType::Decimal)
        .attribute("reference_number", AttributeType::String)
        .local_attribute("sync_note", AttributeType::String)
        .references_one("account", account)
        .references_one("entity", vendor)
        .references_many("line_items", expense_line_item)
});

static TRANSFER: LazyLock<ResourceSchema> = LazyLock::new(|| {
    ResourceSchema::new("transfer")
        .attribute("amount", AttributeType::Integer)
        .attribute("currency", AttributeType::String)
        .attribute("memo", AttributeType::String)
        .attribute("transaction_date", AttributeType::Date)
        .references_one("from_account", account)
        .references_one("to_account", account)
});

#[must_use]
pub fn account() -> &'static ResourceSchema {
    &ACCOUNT
}

/// Departments may nest under a parent department.
#[must_use]
pub fn department() -> &'static ResourceSchema {
    &DEPARTMENT
}

#[must_use]
pub fn subsidiary() -> &'static ResourceSchema {
    &SUBSIDIARY
}

#[must_use]
pub fn vendor() -> &'static ResourceSchema {
    &VENDOR
}

#[must_use]
pub fn expense_line_item() -> &'static ResourceSchema {
    &EXPENSE_LINE_ITEM
}

/// Expenses carry an ordered list of line items; `sync_note` stays local.
#[must_use]
pub fn expense() -> &'static ResourceSchema {
    &EXPENSE
}

#[must_use]
pub fn transfer() -> &'static ResourceSchema {
    &TRANSFER
}

/// Every built-in type, in registration order.
#[must_use]
pub fn all() -> [SchemaFn; 7] {
    [
        account,
        department,
        subsidiary,
        vendor,
        expense_line_item,
        expense,
        transfer,
    ]
}
