//! Dotted key paths

use std::fmt;

use serde_json::{Map, Value as Json};

/// Ordered path segments such as `ParentRef.value` or `parent.ledger_id`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyPath {
    segments: Vec<String>,
}

impl KeyPath {
    /// Parse a dotted path. Empty segments are dropped.
    #[must_use]
    pub fn parse(path: &str) -> Self {
        Self {
            segments: path
                .split('.')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// First segment, which names the top-level field or key.
    #[must_use]
    pub fn head(&self) -> Option<&str> {
        self.segments.first().map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Whether `self` equals or lies beneath `prefix`.
    #[must_use]
    pub fn starts_with(&self, prefix: &[String]) -> bool {
        self.segments.starts_with(prefix)
    }

    /// Read the value at this path. Non-object intermediates yield `None`.
    #[must_use]
    pub fn get<'a>(&self, json: &'a Json) -> Option<&'a Json> {
        self.segments
            .iter()
            .try_fold(json, |current, segment| current.as_object()?.get(segment))
    }

    /// Write `value` at this path, creating nested objects as needed and
    /// leaving sibling keys in place. A non-object intermediate is replaced.
    pub fn insert(&self, target: &mut Map<String, Json>, value: Json) {
        let Some((last, init)) = self.segments.split_last() else {
            return;
        };

        let mut current = target;
        for segment in init {
            let slot = current
                .entry(segment.clone())
                .or_insert_with(|| Json::Object(Map::new()));
            if !slot.is_object() {
                *slot = Json::Object(Map::new());
            }
            current = match slot {
                Json::Object(map) => map,
                _ => return,
            };
        }
        current.insert(last.clone(), value);
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

impl From<&str> for KeyPath {
    fn from(path: &str) -> Self {
        Self::parse(path)
    }
}
