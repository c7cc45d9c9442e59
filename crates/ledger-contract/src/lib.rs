#![deny(warnings)]
#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

//! # ledger-contract
//!
//! Schema contracts for resource wire data.
//!
//! A [`Contract`] is an ordered list of [`FieldRule`]s. Validation never
//! fails as an error: it produces a [`ValidationResult`] mapping each
//! offending field to its violation messages.
//!
//! ## Example Usage
//!
//! ```rust
//! use ledger_contract::{Contract, FieldRule, FieldType};
//! use serde_json::json;
//!
//! let contract = Contract::new("department.create")
//!     .rule(FieldRule::required("ledger_id").nil())
//!     .rule(FieldRule::required("name").filled(FieldType::String));
//!
//! let data = json!({"ledger_id": null, "name": ""});
//! let result = contract.validate(data.as_object().unwrap());
//!
//! assert!(!result.is_valid());
//! assert_eq!(result.messages_for("name"), ["must be filled"]);
//! ```

/// Contracts and their validation results.
pub mod contract;
/// Per-field rules.
pub mod rules;

/// Contract entry points.
pub use contract::{Contract, ValidationResult};
/// Rule declarations and their outcomes.
pub use rules::{FieldRule, FieldType, Fill, Presence, RuleResult};

use thiserror::Error;

/// Errors raised while declaring a contract
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid pattern for field '{field}': {source}")]
    Pattern {
        field: String,
        #[source]
        source: regex::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
