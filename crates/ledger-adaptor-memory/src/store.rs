//! Record storage
//!
//! Records are stored as the JSON objects the ledger would return, with
//! `Id`, `SyncToken` and `MetaData` maintained by the store.

use std::collections::BTreeMap;

use chrono::{SecondsFormat, Utc};
use ledger_operation::{Response, TransportError};
use ledger_serializer::merge::deep_merge;
use serde_json::{Map, Value as Json, json};

use crate::{Error, Result};

/// Initial records keyed by resource type
pub type Seed = BTreeMap<String, Vec<Map<String, Json>>>;

type Record = Map<String, Json>;

/// Keys whose values must be unique within a resource type
const NAME_KEYS: [&str; 2] = ["Name", "DisplayName"];

/// Records of every resource type, with a shared id sequence
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: BTreeMap<String, BTreeMap<String, Record>>,
    next_id: u64,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert seed records as-is, keeping any `Id` they carry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Seed`] for an `Id` that is not a string or that is
    /// already taken.
    pub fn seed(&mut self, seed: &Seed) -> Result<()> {
        for (resource_type, records) in seed {
            for record in records {
                let id = match record.get("Id") {
                    None | Some(Json::Null) => self.next_id(),
                    Some(Json::String(id)) => {
                        if self.get(resource_type, id).is_some() {
                            return Err(Error::seed(resource_type, format!("duplicate Id '{id}'")));
                        }
                        if let Ok(numeric) = id.parse::<u64>() {
                            self.next_id = self.next_id.max(numeric);
                        }
                        id.clone()
                    }
                    Some(other) => {
                        return Err(Error::seed(resource_type, format!("Id must be a string, got {other}")));
                    }
                };

                let mut record = record.clone();
                record.insert("Id".to_string(), Json::String(id.clone()));
                record
                    .entry("SyncToken")
                    .or_insert_with(|| Json::String("0".to_string()));
                record
                    .entry("MetaData")
                    .or_insert_with(|| metadata(&timestamp()));

                tracing::debug!(resource_type, id, "seeded record");
                self.table_mut(resource_type).insert(id, record);
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn get(&self, resource_type: &str, id: &str) -> Option<&Record> {
        self.records.get(resource_type)?.get(id)
    }

    /// Records of one type, ordered by id
    pub fn records(&self, resource_type: &str) -> impl Iterator<Item = &Record> {
        self.records
            .get(resource_type)
            .into_iter()
            .flat_map(BTreeMap::values)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.values().map(BTreeMap::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store `payload` under a fresh id.
    ///
    /// # Errors
    ///
    /// Fails with status 400 when another record of the type has the same
    /// name.
    pub fn create(&mut self, resource_type: &str, payload: &Record) -> std::result::Result<Record, TransportError> {
        self.check_unique_name(resource_type, None, payload)?;

        let id = self.next_id();
        let now = timestamp();
        let mut record = payload.clone();
        record.insert("Id".to_string(), Json::String(id.clone()));
        record.insert("SyncToken".to_string(), Json::String("0".to_string()));
        record.insert("MetaData".to_string(), metadata(&now));

        self.table_mut(resource_type).insert(id, record.clone());
        Ok(record)
    }

    /// # Errors
    ///
    /// Fails with status 404 when no such record exists.
    pub fn find(&self, resource_type: &str, id: &str) -> std::result::Result<Record, TransportError> {
        self.get(resource_type, id)
            .cloned()
            .ok_or_else(|| not_found(resource_type, id))
    }

    /// Deep-merge `payload` into the stored record and bump its sync token.
    ///
    /// A payload carrying a `SyncToken` must carry the current one.
    ///
    /// # Errors
    ///
    /// Fails with status 404 for a missing record and 400 for a stale sync
    /// token or a duplicate name.
    pub fn update(
        &mut self,
        resource_type: &str,
        id: &str,
        payload: &Record,
    ) -> std::result::Result<Record, TransportError> {
        let current = self.find(resource_type, id)?;

        let stale = payload
            .get("SyncToken")
            .is_some_and(|token| current.get("SyncToken") != Some(token));
        if stale {
            return Err(fault(
                400,
                "Stale Object Error",
                format!("{resource_type} {id} was updated by another request"),
            ));
        }
        self.check_unique_name(resource_type, Some(id), payload)?;

        let mut record = current;
        deep_merge(&mut record, payload.clone());
        record.insert("Id".to_string(), Json::String(id.to_string()));
        record.insert("SyncToken".to_string(), Json::String(bump(record.get("SyncToken"))));
        let created = record
            .get("MetaData")
            .and_then(|meta| meta.get("CreateTime"))
            .and_then(Json::as_str)
            .map(str::to_string);
        let now = timestamp();
        record.insert(
            "MetaData".to_string(),
            json!({
                "CreateTime": created.unwrap_or_else(|| now.clone()),
                "LastUpdatedTime": now,
            }),
        );

        self.table_mut(resource_type).insert(id.to_string(), record.clone());
        Ok(record)
    }

    /// # Errors
    ///
    /// Fails with status 404 when no such record exists.
    pub fn delete(&mut self, resource_type: &str, id: &str) -> std::result::Result<Record, TransportError> {
        self.records
            .get_mut(resource_type)
            .and_then(|table| table.remove(id))
            .ok_or_else(|| not_found(resource_type, id))
    }

    fn next_id(&mut self) -> String {
        self.next_id += 1;
        self.next_id.to_string()
    }

    fn table_mut(&mut self, resource_type: &str) -> &mut BTreeMap<String, Record> {
        self.records.entry(resource_type.to_string()).or_default()
    }

    fn check_unique_name(
        &self,
        resource_type: &str,
        except: Option<&str>,
        payload: &Record,
    ) -> std::result::Result<(), TransportError> {
        for key in NAME_KEYS {
            let Some(name) = payload.get(key).and_then(Json::as_str) else {
                continue;
            };
            let taken = self.records(resource_type).any(|record| {
                record.get("Id").and_then(Json::as_str) != except
                    && record.get(key).and_then(Json::as_str) == Some(name)
            });
            if taken {
                return Err(fault(
                    400,
                    "Duplicate Name Exists Error",
                    format!("The name supplied already exists: {name}"),
                ));
            }
        }
        Ok(())
    }
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn metadata(now: &str) -> Json {
    json!({ "CreateTime": now, "LastUpdatedTime": now })
}

fn bump(token: Option<&Json>) -> String {
    let current = token
        .and_then(Json::as_str)
        .and_then(|token| token.parse::<u64>().ok())
        .unwrap_or(0);
    (current + 1).to_string()
}

fn not_found(resource_type: &str, id: &str) -> TransportError {
    fault(
        404,
        "Object Not Found",
        format!("No {resource_type} with Id {id}"),
    )
}

/// Ledger-style fault: the message leads with the error name so matchers can
/// key on it, and the response body carries the structured fault.
fn fault(status: u16, error: &str, detail: String) -> TransportError {
    let body = json!({
        "Fault": {
            "Error": [{ "Message": error, "Detail": detail }],
        }
    });
    TransportError::new(Some(status), format!("{error}: {detail}")).with_response(Response::json(status, body))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(value: Json) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_create_assigns_sequential_ids() {
        let mut store = MemoryStore::new();

        let first = store.create("account", &payload(json!({"Name": "Cash"}))).unwrap();
        let second = store.create("vendor", &payload(json!({"DisplayName": "Acme"}))).unwrap();

        assert_eq!(first["Id"], "1");
        assert_eq!(first["SyncToken"], "0");
        assert!(first["MetaData"]["CreateTime"].is_string());
        assert_eq!(second["Id"], "2");
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_duplicate_name_is_rejected() {
        let mut store = MemoryStore::new();
        store.create("account", &payload(json!({"Name": "Cash"}))).unwrap();

        let error = store.create("account", &payload(json!({"Name": "Cash"}))).unwrap_err();
        assert_eq!(error.status, Some(400));
        assert!(error.message.starts_with("Duplicate Name Exists Error"));
        assert!(error.response.is_some());

        // Names are unique per type only
        assert!(store.create("department", &payload(json!({"Name": "Cash"}))).is_ok());
    }

    #[test]
    fn test_update_merges_and_bumps_sync_token() {
        let mut store = MemoryStore::new();
        store
            .create("vendor", &payload(json!({"DisplayName": "Acme", "PrimaryEmailAddr": {"Address": "a@x"}})))
            .unwrap();

        let updated = store
            .update(
                "vendor",
                "1",
                &payload(json!({"SyncToken": "0", "PrimaryEmailAddr": {"Type": "work"}})),
            )
            .unwrap();

        assert_eq!(updated["SyncToken"], "1");
        assert_eq!(updated["DisplayName"], "Acme");
        assert_eq!(updated["PrimaryEmailAddr"], json!({"Address": "a@x", "Type": "work"}));
    }

    #[test]
    fn test_stale_sync_token_is_rejected() {
        let mut store = MemoryStore::new();
        store.create("vendor", &payload(json!({"DisplayName": "Acme"}))).unwrap();
        store.update("vendor", "1", &payload(json!({"GivenName": "A"}))).unwrap();

        let error = store
            .update("vendor", "1", &payload(json!({"SyncToken": "0", "GivenName": "B"})))
            .unwrap_err();
        assert_eq!(error.status, Some(400));
        assert!(error.message.starts_with("Stale Object Error"));
    }

    #[test]
    fn test_missing_records_are_not_found() {
        let mut store = MemoryStore::new();

        assert_eq!(store.find("account", "9").unwrap_err().status, Some(404));
        assert_eq!(store.delete("account", "9").unwrap_err().status, Some(404));
        assert_eq!(
            store.update("account", "9", &Record::new()).unwrap_err().status,
            Some(404)
        );
    }

    #[test]
    fn test_seed_keeps_ids_and_advances_sequence() {
        let mut store = MemoryStore::new();
        let seed = Seed::from([(
            "account".to_string(),
            vec![
                payload(json!({"Id": "41", "Name": "Cash"})),
                payload(json!({"Name": "Bank"})),
            ],
        )]);

        store.seed(&seed).unwrap();

        assert_eq!(store.find("account", "41").unwrap()["SyncToken"], "0");
        assert_eq!(store.find("account", "42").unwrap()["Name"], "Bank");
        let created = store.create("account", &payload(json!({"Name": "Card"}))).unwrap();
        assert_eq!(created["Id"], "43");
    }

    #[test]
    fn test_seed_rejects_non_string_id() {
        let mut store = MemoryStore::new();
        let seed = Seed::from([("account".to_string(), vec![payload(json!({"Id": 7}))])]);

        assert!(matches!(store.seed(&seed), Err(Error::Seed { .. })));
    }
}
