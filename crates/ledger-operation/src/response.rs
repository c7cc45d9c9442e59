//! Ledger responses

use std::collections::BTreeMap;

use serde_json::Value as Json;

/// Raw ledger response with its parsed JSON body
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    status: u16,
    headers: BTreeMap<String, String>,
    raw: Option<String>,
    body: Option<Json>,
}

impl Response {
    /// Wrap a raw response. A body that is not valid JSON parses to `None`;
    /// status, headers and the raw text are kept as given.
    #[must_use]
    pub fn new(status: u16, headers: BTreeMap<String, String>, raw: Option<String>) -> Self {
        let body = raw.as_deref().and_then(|text| match serde_json::from_str(text) {
            Ok(body) => Some(body),
            Err(e) => {
                tracing::debug!(status, error = %e, "response body is not JSON");
                None
            }
        });

        Self {
            status,
            headers,
            raw,
            body,
        }
    }

    /// Response carrying an already structured body
    #[must_use]
    pub fn json(status: u16, body: Json) -> Self {
        Self {
            status,
            headers: BTreeMap::from([("content-type".to_string(), "application/json".to_string())]),
            raw: Some(body.to_string()),
            body: Some(body),
        }
    }

    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    #[must_use]
    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn raw(&self) -> Option<&str> {
        self.raw.as_deref()
    }

    #[must_use]
    pub fn body(&self) -> Option<&Json> {
        self.body.as_ref()
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
