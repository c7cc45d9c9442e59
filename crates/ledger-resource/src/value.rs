//! Attribute values

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::schema::AttributeType;
use crate::{Error, Result};

/// Wire format for [`Value::Date`].
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Values that can be stored in resource attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum Value {
    /// String value
    String(String),

    /// Integer value (amounts are integer cents)
    Integer(i64),

    /// Decimal value
    Decimal(f64),

    /// Boolean value
    Boolean(bool),

    /// Calendar date
    Date(NaiveDate),

    /// Unset value
    #[default]
    Null,
}

impl Value {
    /// Convert value to string
    #[must_use]
    pub fn as_string(&self) -> Option<String> {
        match self {
            Value::String(s) => Some(s.clone()),
            Value::Integer(i) => Some(i.to_string()),
            Value::Decimal(d) => Some(d.to_string()),
            Value::Boolean(b) => Some(b.to_string()),
            Value::Date(d) => Some(d.format(DATE_FORMAT).to_string()),
            Value::Null => None,
        }
    }

    /// Check if value is null
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The attribute type this value satisfies, `None` for null.
    #[must_use]
    pub fn attribute_type(&self) -> Option<AttributeType> {
        match self {
            Value::String(_) => Some(AttributeType::String),
            Value::Integer(_) => Some(AttributeType::Integer),
            Value::Decimal(_) => Some(AttributeType::Decimal),
            Value::Boolean(_) => Some(AttributeType::Boolean),
            Value::Date(_) => Some(AttributeType::Date),
            Value::Null => None,
        }
    }

    /// Short type label used in error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.attribute_type().map_or("null", AttributeType::name)
    }

    /// JSON representation used on the wire.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Integer(i) => serde_json::Value::from(*i),
            Value::Decimal(d) => serde_json::Number::from_f64(*d)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Date(d) => serde_json::Value::String(d.format(DATE_FORMAT).to_string()),
            Value::Null => serde_json::Value::Null,
        }
    }

    /// Read a JSON value as an attribute of the given type.
    ///
    /// Ledgers are loose about scalar encodings, so numeric and boolean
    /// strings are accepted for their respective types.
    ///
    /// # Errors
    ///
    /// Returns a conversion error when the JSON value cannot represent
    /// `attribute_type`.
    pub fn from_json(json: &serde_json::Value, attribute_type: AttributeType) -> Result<Self> {
        use serde_json::Value as Json;

        let mismatch = || {
            Error::conversion(
                format!("{} attribute", attribute_type.name()),
                format!("cannot read {json} as {}", attribute_type.name()),
            )
        };

        match (attribute_type, json) {
            (_, Json::Null) => Ok(Value::Null),
            (AttributeType::String, Json::String(s)) => Ok(Value::String(s.clone())),
            (AttributeType::String, Json::Number(n)) => Ok(Value::String(n.to_string())),
            (AttributeType::Integer, Json::Number(n)) => {
                n.as_i64().map(Value::Integer).ok_or_else(mismatch)
            }
            (AttributeType::Integer, Json::String(s)) => {
                s.trim().parse().map(Value::Integer).map_err(|_| mismatch())
            }
            (AttributeType::Decimal, Json::Number(n)) => {
                n.as_f64().map(Value::Decimal).ok_or_else(mismatch)
            }
            (AttributeType::Decimal, Json::String(s)) => {
                s.trim().parse().map(Value::Decimal).map_err(|_| mismatch())
            }
            (AttributeType::Boolean, Json::Bool(b)) => Ok(Value::Boolean(*b)),
            (AttributeType::Boolean, Json::String(s)) => match s.as_str() {
                "true" => Ok(Value::Boolean(true)),
                "false" => Ok(Value::Boolean(false)),
                _ => Err(mismatch()),
            },
            (AttributeType::Date, Json::String(s)) => NaiveDate::parse_from_str(s, DATE_FORMAT)
                .map(Value::Date)
                .map_err(|_| mismatch()),
            _ => Err(mismatch()),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Decimal(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Value::Date(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}
