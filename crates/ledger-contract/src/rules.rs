//! Field rules

use chrono::NaiveDate;
use regex::Regex;
use serde_json::Value as Json;

use crate::{Error, Result};

/// Expected wire type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Integer,
    Float,
    Boolean,
    /// `YYYY-MM-DD` string
    Date,
    /// Reference marker object
    Reference,
    /// Array of reference markers
    ReferenceList,
}

impl FieldType {
    fn message(self) -> &'static str {
        match self {
            FieldType::String => "must be a string",
            FieldType::Integer => "must be an integer",
            FieldType::Float => "must be a float",
            FieldType::Boolean => "must be boolean",
            FieldType::Date => "must be a date",
            FieldType::Reference => "must be a reference",
            FieldType::ReferenceList => "must be an array of references",
        }
    }
}

/// Whether the key must be present
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Required,
    Optional,
}

/// What the value may hold once the key is present
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fill {
    /// Non-null and non-empty
    Filled,
    /// Null, or a value of the field type
    Maybe,
    /// Null only
    Nil,
    /// Anything
    Any,
}

/// Rule outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleResult {
    pub is_valid: bool,
    pub message: Option<String>,
}

impl RuleResult {
    #[must_use]
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            message: None,
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            message: Some(message.into()),
        }
    }
}

/// Validation rule for one top-level field
#[derive(Debug, Clone)]
pub struct FieldRule {
    pub name: String,
    pub presence: Presence,
    pub fill: Fill,
    pub field_type: Option<FieldType>,
    pub max_length: Option<usize>,
    pub pattern: Option<Regex>,
    pub allowed: Option<Vec<String>>,
}

impl FieldRule {
    fn new(name: impl Into<String>, presence: Presence) -> Self {
        Self {
            name: name.into(),
            presence,
            fill: Fill::Any,
            field_type: None,
            max_length: None,
            pattern: None,
            allowed: None,
        }
    }

    /// The key must be present.
    pub fn required(name: impl Into<String>) -> Self {
        Self::new(name, Presence::Required)
    }

    /// The key may be omitted.
    pub fn optional(name: impl Into<String>) -> Self {
        Self::new(name, Presence::Optional)
    }

    /// Value must be a non-empty value of `field_type`.
    #[must_use]
    pub fn filled(mut self, field_type: FieldType) -> Self {
        self.fill = Fill::Filled;
        self.field_type = Some(field_type);
        self
    }

    /// Value must be null or of `field_type`.
    #[must_use]
    pub fn maybe(mut self, field_type: FieldType) -> Self {
        self.fill = Fill::Maybe;
        self.field_type = Some(field_type);
        self
    }

    /// Value must be null.
    #[must_use]
    pub fn nil(mut self) -> Self {
        self.fill = Fill::Nil;
        self.field_type = None;
        self
    }

    /// String values may not be longer than `max` characters.
    #[must_use]
    pub fn max_length(mut self, max: usize) -> Self {
        self.max_length = Some(max);
        self
    }

    /// String values must match `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Pattern`] if the pattern does not compile.
    pub fn pattern(mut self, pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|source| Error::Pattern {
            field: self.name.clone(),
            source,
        })?;
        self.pattern = Some(regex);
        Ok(self)
    }

    /// String values must be one of `values`.
    #[must_use]
    pub fn one_of<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed = Some(values.into_iter().map(Into::into).collect());
        self
    }

    /// Check this rule against an optional value.
    #[must_use]
    pub fn check(&self, value: Option<&Json>) -> RuleResult {
        let Some(value) = value else {
            return match self.presence {
                Presence::Required => RuleResult::invalid("is missing"),
                Presence::Optional => RuleResult::valid(),
            };
        };

        if value.is_null() {
            return match self.fill {
                Fill::Filled => RuleResult::invalid("must be filled"),
                Fill::Maybe | Fill::Nil | Fill::Any => RuleResult::valid(),
            };
        }

        if self.fill == Fill::Nil {
            return RuleResult::invalid("must be nil");
        }

        if let Some(field_type) = self.field_type {
            let result = validate_type(value, field_type);
            if !result.is_valid {
                return result;
            }
        }

        if self.fill == Fill::Filled && is_empty(value) {
            return RuleResult::invalid("must be filled");
        }

        if let Some(text) = value.as_str() {
            return self.check_text(text);
        }

        RuleResult::valid()
    }

    fn check_text(&self, text: &str) -> RuleResult {
        if let Some(max) = self.max_length {
            let result = validate_max_length(text, max);
            if !result.is_valid {
                return result;
            }
        }
        if let Some(pattern) = &self.pattern {
            if !pattern.is_match(text) {
                return RuleResult::invalid("is in invalid format");
            }
        }
        if let Some(allowed) = &self.allowed {
            return validate_one_of(text, allowed);
        }
        RuleResult::valid()
    }
}

/// Validate that a non-null JSON value has the expected wire type
#[must_use]
pub fn validate_type(value: &Json, field_type: FieldType) -> RuleResult {
    let ok = match field_type {
        FieldType::String => value.is_string(),
        FieldType::Integer => value.is_i64() || value.is_u64(),
        FieldType::Float => value.is_number(),
        FieldType::Boolean => value.is_boolean(),
        FieldType::Date => value
            .as_str()
            .is_some_and(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()),
        FieldType::Reference => is_reference(value),
        FieldType::ReferenceList => value
            .as_array()
            .is_some_and(|items| items.iter().all(is_reference)),
    };

    if ok {
        RuleResult::valid()
    } else {
        RuleResult::invalid(field_type.message())
    }
}

/// Validate maximum string length in characters
#[must_use]
pub fn validate_max_length(value: &str, max: usize) -> RuleResult {
    if value.chars().count() > max {
        RuleResult::invalid(format!("size cannot be greater than {max}"))
    } else {
        RuleResult::valid()
    }
}

/// Validate a value against a list of allowed values
#[must_use]
pub fn validate_one_of(value: &str, allowed: &[String]) -> RuleResult {
    if allowed.iter().any(|a| a == value) {
        RuleResult::valid()
    } else {
        RuleResult::invalid(format!("must be one of: {}", allowed.join(", ")))
    }
}

fn is_reference(value: &Json) -> bool {
    value
        .get("object")
        .and_then(Json::as_str)
        .is_some_and(|object| object == "reference")
}

fn is_empty(value: &Json) -> bool {
    match value {
        Json::String(s) => s.is_empty(),
        Json::Array(items) => items.is_empty(),
        Json::Object(map) => map.is_empty(),
        _ => false,
    }
}
