//! Contracts and validation results

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Map, Value as Json};

use crate::rules::FieldRule;

/// Field name to violation messages; a field present here always has at
/// least one message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    errors: BTreeMap<String, Vec<String>>,
}

impl ValidationResult {
    /// Create a result with no violations
    #[must_use]
    pub fn valid() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Record a violation for a field
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    #[must_use]
    pub fn errors(&self) -> &BTreeMap<String, Vec<String>> {
        &self.errors
    }

    #[must_use]
    pub fn into_errors(self) -> BTreeMap<String, Vec<String>> {
        self.errors
    }

    /// Messages recorded for one field; empty when the field is valid
    #[must_use]
    pub fn messages_for(&self, field: &str) -> &[String] {
        self.errors.get(field).map_or(&[], Vec::as_slice)
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() {
            return write!(f, "valid");
        }
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|(field, messages)| format!("{field} {}", messages.join(", ")))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

/// Named, ordered set of field rules
#[derive(Debug, Clone)]
pub struct Contract {
    name: String,
    rules: Vec<FieldRule>,
}

impl Contract {
    /// Create an empty contract
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rules: Vec::new(),
        }
    }

    /// Append a rule
    #[must_use]
    pub fn rule(mut self, rule: FieldRule) -> Self {
        self.rules.push(rule);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn rules(&self) -> &[FieldRule] {
        &self.rules
    }

    /// Validate a flat data map. Keys without a rule are ignored.
    #[must_use]
    pub fn validate(&self, data: &Map<String, Json>) -> ValidationResult {
        let mut result = ValidationResult::valid();

        for rule in &self.rules {
            let outcome = rule.check(data.get(&rule.name));
            if outcome.is_valid {
                continue;
            }
            if let Some(message) = outcome.message {
                result.add_error(&rule.name, message);
            }
        }

        tracing::debug!(
            contract = %self.name,
            valid = result.is_valid(),
            error_count = result.errors().len(),
            "contract validated"
        );
        result
    }
}
