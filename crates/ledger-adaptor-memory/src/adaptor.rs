//! In-memory adaptor

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use ledger_operation::{Adaptor, DomainError, OperationInfo, Response, TransportError};
use serde_json::{Map, Value as Json};

use crate::matcher::ErrorMatcher;
use crate::store::{MemoryStore, Seed};
use crate::Result;

/// One transport call as received by the adaptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdaptorCall {
    pub method: &'static str,
    pub resource_type: String,
    pub id: Option<String>,
}

#[derive(Debug, Default)]
struct State {
    store: MemoryStore,
    failures: VecDeque<TransportError>,
    calls: Vec<AdaptorCall>,
}

/// [`Adaptor`] over a [`MemoryStore`]
#[derive(Debug)]
pub struct MemoryAdaptor {
    name: String,
    matcher: ErrorMatcher,
    state: Mutex<State>,
}

impl MemoryAdaptor {
    #[must_use]
    pub fn new(name: impl Into<String>, matcher: ErrorMatcher) -> Self {
        Self {
            name: name.into(),
            matcher,
            state: Mutex::new(State::default()),
        }
    }

    /// Adaptor recognizing the store's own fault messages
    ///
    /// # Errors
    ///
    /// Returns an error if a built-in matcher pattern does not compile.
    pub fn with_builtin_rules(name: impl Into<String>) -> Result<Self> {
        Ok(Self::new(name, ErrorMatcher::builtin()?))
    }

    /// # Errors
    ///
    /// Returns [`Error::Seed`](crate::Error::Seed) for malformed records.
    pub fn seed(&self, seed: &Seed) -> Result<()> {
        self.state().store.seed(seed)
    }

    /// Fail the next transport call with `error`. Queued failures are used
    /// in order, one per call.
    pub fn fail_next(&self, error: TransportError) {
        self.state().failures.push_back(error);
    }

    /// Calls received so far, oldest first
    #[must_use]
    pub fn calls(&self) -> Vec<AdaptorCall> {
        self.state().calls.clone()
    }

    /// Stored record, as the ledger would return it
    #[must_use]
    pub fn record(&self, resource_type: &str, id: &str) -> Option<Map<String, Json>> {
        self.state().store.get(resource_type, id).cloned()
    }

    /// Every stored record of `resource_type`, ordered by id
    #[must_use]
    pub fn records(&self, resource_type: &str) -> Vec<Map<String, Json>> {
        self.state().store.records(resource_type).cloned().collect()
    }

    #[must_use]
    pub fn matcher(&self) -> &ErrorMatcher {
        &self.matcher
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn call<F>(
        &self,
        method: &'static str,
        resource_type: &str,
        id: Option<&str>,
        f: F,
    ) -> std::result::Result<Response, TransportError>
    where
        F: FnOnce(&mut MemoryStore) -> std::result::Result<Map<String, Json>, TransportError>,
    {
        let mut state = self.state();
        state.calls.push(AdaptorCall {
            method,
            resource_type: resource_type.to_string(),
            id: id.map(str::to_string),
        });
        tracing::trace!(adaptor = %self.name, method, resource_type, id, "transport call");

        if let Some(error) = state.failures.pop_front() {
            tracing::debug!(adaptor = %self.name, method, %error, "injected failure");
            return Err(error);
        }

        match f(&mut state.store) {
            Ok(record) => Ok(Response::json(200, Json::Object(record))),
            Err(error) => {
                tracing::debug!(adaptor = %self.name, method, resource_type, %error, "ledger rejected call");
                Err(error)
            }
        }
    }
}

impl Adaptor for MemoryAdaptor {
    fn name(&self) -> &str {
        &self.name
    }

    fn create(&self, resource_type: &str, payload: &Map<String, Json>) -> std::result::Result<Response, TransportError> {
        self.call("create", resource_type, None, |store| store.create(resource_type, payload))
    }

    fn find(&self, resource_type: &str, id: &str) -> std::result::Result<Response, TransportError> {
        self.call("find", resource_type, Some(id), |store| store.find(resource_type, id))
    }

    fn update(
        &self,
        resource_type: &str,
        id: &str,
        payload: &Map<String, Json>,
    ) -> std::result::Result<Response, TransportError> {
        self.call("update", resource_type, Some(id), |store| store.update(resource_type, id, payload))
    }

    fn delete(&self, resource_type: &str, id: &str) -> std::result::Result<Response, TransportError> {
        self.call("delete", resource_type, Some(id), |store| {
            store.delete(resource_type, id)?;
            let mut reply = Map::new();
            reply.insert("Id".to_string(), Json::String(id.to_string()));
            reply.insert("status".to_string(), Json::String("Deleted".to_string()));
            Ok(reply)
        })
    }

    fn parse_operation_error(&self, error: &TransportError, operation: &OperationInfo) -> Option<DomainError> {
        self.matcher.recognize(error, operation)
    }
}
