//! Value converters
//!
//! A converter turns a resolved resource value into its wire form and back.
//! Outward conversion yields `None` for "no value", which the owning mapping
//! either omits or writes as an explicit null.

use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;
use ledger_resource::value::DATE_FORMAT;
use ledger_resource::{Field, Resolved, Value};
use serde_json::{Number, Value as Json, json};

use crate::path::KeyPath;
use crate::{Error, Result};

/// Outward half of a custom converter
pub type OutwardFn = Arc<dyn Fn(&Resolved<'_>) -> Result<Option<Json>> + Send + Sync>;

/// Inward half of a custom converter
pub type InwardFn = Arc<dyn Fn(&Json) -> Result<Value> + Send + Sync>;

/// Converter built from closures
#[derive(Clone)]
pub struct CustomConverter {
    pub name: String,
    outward: OutwardFn,
    inward: Option<InwardFn>,
}

impl CustomConverter {
    /// Create an outward-only converter
    pub fn new(
        name: impl Into<String>,
        outward: impl Fn(&Resolved<'_>) -> Result<Option<Json>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            outward: Arc::new(outward),
            inward: None,
        }
    }

    /// Add the inward direction
    #[must_use]
    pub fn with_inward(
        mut self,
        inward: impl Fn(&Json) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        self.inward = Some(Arc::new(inward));
        self
    }

    #[must_use]
    pub fn has_inward(&self) -> bool {
        self.inward.is_some()
    }
}

impl fmt::Debug for CustomConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomConverter")
            .field("name", &self.name)
            .field("has_inward", &self.inward.is_some())
            .finish()
    }
}

/// Bidirectional value converter
#[derive(Debug, Clone)]
pub enum Converter {
    /// Scalars as-is; references as `{"id": <ledger id>}`
    Value,
    /// `YYYY-MM-DD` strings; inward also accepts timestamps
    Date,
    /// Integer cents as a decimal amount
    Amount,
    /// `{"id": <ledger id>}`; inward is unsupported
    Reference,
    Custom(CustomConverter),
}

impl Converter {
    /// Converter name as used in mapping files
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Converter::Value => "value",
            Converter::Date => "date",
            Converter::Amount => "amount",
            Converter::Reference => "reference",
            Converter::Custom(custom) => &custom.name,
        }
    }

    /// Look up a built-in converter by name
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "value" => Some(Converter::Value),
            "date" => Some(Converter::Date),
            "amount" => Some(Converter::Amount),
            "reference" => Some(Converter::Reference),
            _ => None,
        }
    }

    /// Convert a resolved resource value to its wire form
    ///
    /// # Errors
    ///
    /// Returns a conversion error when the value does not suit the converter.
    pub fn to_external(&self, resolved: &Resolved<'_>, path: &KeyPath) -> Result<Option<Json>> {
        match self {
            Converter::Value => Ok(default_outward(resolved)),
            Converter::Date => date_outward(resolved, path),
            Converter::Amount => amount_outward(resolved, path),
            Converter::Reference => reference_outward(resolved, path),
            Converter::Custom(custom) => (custom.outward)(resolved),
        }
    }

    /// Convert a wire value to the value stored in `field`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unsupported`] for directions that cannot be
    /// implemented generically and a conversion error for malformed input.
    pub fn to_resource(&self, json: &Json, field: Field<'_>, path: &KeyPath) -> Result<Value> {
        match self {
            Converter::Value => default_inward(json, field, path),
            Converter::Date => date_inward(json, path),
            Converter::Amount => amount_inward(json, path),
            Converter::Reference => Err(Error::Unsupported {
                converter: self.name().to_string(),
                direction: "inward",
            }),
            Converter::Custom(custom) => match &custom.inward {
                Some(inward) => inward(json),
                None => Err(Error::Unsupported {
                    converter: custom.name.clone(),
                    direction: "inward",
                }),
            },
        }
    }
}

/// Outward conversion used when a mapping declares no converter
#[must_use]
pub fn default_outward(resolved: &Resolved<'_>) -> Option<Json> {
    match resolved {
        Resolved::Absent | Resolved::Value(Value::Null) => None,
        Resolved::Value(value) => Some(value.to_json()),
        Resolved::One(resource) => Some(json!({ "id": resource.ledger_id() })),
        Resolved::Many(items) => Some(Json::Array(
            items
                .iter()
                .map(|r| json!({ "id": r.ledger_id() }))
                .collect(),
        )),
    }
}

/// Inward conversion used when a mapping declares no converter
///
/// # Errors
///
/// References cannot be rebuilt from a foreign key generically, so a
/// reference-typed target yields [`Error::Unsupported`].
pub fn default_inward(json: &Json, field: Field<'_>, path: &KeyPath) -> Result<Value> {
    match field {
        Field::Attribute(def) => Value::from_json(json, def.attribute_type)
            .map_err(|e| Error::conversion(path.to_string(), e.to_string())),
        Field::Identity(_) => match json {
            Json::Null => Ok(Value::Null),
            Json::String(s) => Ok(Value::String(s.clone())),
            Json::Number(n) => Ok(Value::String(n.to_string())),
            other => Err(Error::conversion(
                path.to_string(),
                format!("identity must be a string, found {other}"),
            )),
        },
        Field::Reference(_) => Err(Error::Unsupported {
            converter: "reference".to_string(),
            direction: "inward",
        }),
    }
}

fn date_outward(resolved: &Resolved<'_>, path: &KeyPath) -> Result<Option<Json>> {
    match resolved {
        Resolved::Absent | Resolved::Value(Value::Null) => Ok(None),
        Resolved::Value(Value::Date(date)) => Ok(Some(json!(date.format(DATE_FORMAT).to_string()))),
        Resolved::Value(Value::String(s)) => Ok(Some(json!(s))),
        other => Err(Error::conversion(
            path.to_string(),
            format!("date expected, found {other:?}"),
        )),
    }
}

fn date_inward(json: &Json, path: &KeyPath) -> Result<Value> {
    match json {
        Json::Null => Ok(Value::Null),
        Json::String(s) => {
            let day = s.get(..10).unwrap_or(s);
            NaiveDate::parse_from_str(day, DATE_FORMAT)
                .map(Value::Date)
                .map_err(|e| Error::conversion(path.to_string(), format!("invalid date '{s}': {e}")))
        }
        other => Err(Error::conversion(
            path.to_string(),
            format!("date string expected, found {other}"),
        )),
    }
}

/// Amounts go out as JSON numbers when the number reads back to the same
/// cents, and as exact decimal strings otherwise.
fn amount_outward(resolved: &Resolved<'_>, path: &KeyPath) -> Result<Option<Json>> {
    match resolved {
        Resolved::Absent | Resolved::Value(Value::Null) => Ok(None),
        Resolved::Value(Value::Integer(cents)) => {
            let text = format_cents(*cents);
            let number = text
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .filter(|number| parse_cents(&number.to_string()) == Some(*cents));
            Ok(Some(number.map_or(Json::String(text), Json::Number)))
        }
        other => Err(Error::conversion(
            path.to_string(),
            format!("integer cents expected, found {other:?}"),
        )),
    }
}

fn amount_inward(json: &Json, path: &KeyPath) -> Result<Value> {
    let cents = match json {
        Json::Null => return Ok(Value::Null),
        Json::Number(n) => match n.as_i64() {
            Some(whole) => whole.checked_mul(100),
            None if n.is_u64() => None,
            None => parse_cents(&n.to_string()).or_else(|| n.as_f64().and_then(float_cents)),
        },
        Json::String(s) => parse_cents(s),
        _ => None,
    };

    cents
        .map(Value::Integer)
        .ok_or_else(|| Error::conversion(path.to_string(), format!("amount expected, found {json}")))
}

fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let magnitude = cents.unsigned_abs();
    format!("{sign}{}.{:02}", magnitude / 100, magnitude % 100)
}

/// Parse a plain decimal into cents, rounding half away from zero past the
/// second fractional digit. Exponent forms are not accepted.
fn parse_cents(text: &str) -> Option<i64> {
    let text = text.trim();
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if !whole.bytes().chain(fraction.bytes()).all(|b| b.is_ascii_digit()) {
        return None;
    }

    let whole: i128 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let mut hundredths = fraction.bytes().chain(std::iter::repeat(b'0')).take(2);
    let tens = i128::from(hundredths.next()? - b'0');
    let units = i128::from(hundredths.next()? - b'0');
    let round_up = fraction.as_bytes().get(2).is_some_and(|digit| *digit >= b'5');

    let magnitude = whole
        .checked_mul(100)?
        .checked_add(tens * 10 + units + i128::from(round_up))?;
    i64::try_from(if negative { -magnitude } else { magnitude }).ok()
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn float_cents(amount: f64) -> Option<i64> {
    let cents = (amount * 100.0).round();
    // i64::MAX as f64 rounds up to 2^63, which is itself out of range
    (cents.is_finite() && cents >= i64::MIN as f64 && cents < i64::MAX as f64).then(|| cents as i64)
}

fn reference_outward(resolved: &Resolved<'_>, path: &KeyPath) -> Result<Option<Json>> {
    match resolved {
        Resolved::Absent => Ok(None),
        Resolved::One(resource) => Ok(Some(json!({ "id": resource.ledger_id() }))),
        other => Err(Error::conversion(
            path.to_string(),
            format!("resource expected, found {other:?}"),
        )),
    }
}
