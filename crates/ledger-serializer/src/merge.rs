//! Deep merge of nested payload maps

use serde_json::{Map, Value as Json};

use crate::path::KeyPath;

/// Merge `source` into `target`; nested objects merge key by key and any
/// other value in `source` replaces the one in `target`.
pub fn deep_merge(target: &mut Map<String, Json>, source: Map<String, Json>) {
    for (key, value) in source {
        match (target.get_mut(&key), value) {
            (Some(Json::Object(existing)), Json::Object(incoming)) => {
                deep_merge(existing, incoming);
            }
            (_, value) => {
                target.insert(key, value);
            }
        }
    }
}

/// Copy keys from `found` into `target` that no mapping addresses.
///
/// A key addressed by a mapping exactly is left to the mapping. A key that
/// only prefixes mapped paths is descended into, so unmapped siblings inside a
/// partially mapped object survive.
pub fn merge_unmapped(target: &mut Map<String, Json>, found: &Map<String, Json>, mapped: &[&KeyPath]) {
    merge_unmapped_at(target, found, mapped, &[]);
}

fn merge_unmapped_at(
    target: &mut Map<String, Json>,
    found: &Map<String, Json>,
    mapped: &[&KeyPath],
    prefix: &[String],
) {
    for (key, value) in found {
        let mut path = prefix.to_vec();
        path.push(key.clone());

        let exact = mapped.iter().any(|m| m.segments() == path.as_slice());
        if exact {
            continue;
        }

        let beneath = mapped.iter().any(|m| m.starts_with(&path));
        match (beneath, value) {
            (false, _) => {
                target.entry(key.clone()).or_insert_with(|| value.clone());
            }
            (true, Json::Object(nested)) => match target.get_mut(key) {
                Some(Json::Object(child)) => merge_unmapped_at(child, nested, mapped, &path),
                Some(_) => {}
                None => {
                    // Only unmapped leaves bring a missing parent back
                    let mut child = Map::new();
                    merge_unmapped_at(&mut child, nested, mapped, &path);
                    if !child.is_empty() {
                        target.insert(key.clone(), Json::Object(child));
                    }
                }
            },
            (true, _) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Json) -> Map<String, Json> {
        match value {
            Json::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_deep_merge_keeps_siblings() {
        let mut target = object(json!({"A": {"x": 1}, "B": 2}));
        deep_merge(&mut target, object(json!({"A": {"y": 2}, "B": 3, "C": [1]})));

        assert_eq!(
            Json::Object(target),
            json!({"A": {"x": 1, "y": 2}, "B": 3, "C": [1]})
        );
    }

    #[test]
    fn test_merge_unmapped_skips_mapped_keys() {
        let name = KeyPath::parse("Name");
        let parent = KeyPath::parse("ParentRef.value");
        let mapped = [&name, &parent];

        let mut target = object(json!({"Name": "new"}));
        let found = object(json!({
            "Name": "old",
            "SyncToken": "4",
            "ParentRef": {"value": "9", "name": "Parent"},
        }));
        merge_unmapped(&mut target, &found, &mapped);

        assert_eq!(
            Json::Object(target),
            json!({"Name": "new", "SyncToken": "4", "ParentRef": {"name": "Parent"}})
        );
    }

    #[test]
    fn test_merge_unmapped_leaves_fully_mapped_parents_out() {
        let name = KeyPath::parse("Name");
        let parent = KeyPath::parse("ParentRef.value");
        let mapped = [&name, &parent];

        let mut target = object(json!({"Name": "new"}));
        let found = object(json!({"Name": "old", "ParentRef": {"value": "9"}, "SyncToken": "4"}));
        merge_unmapped(&mut target, &found, &mapped);

        assert_eq!(Json::Object(target), json!({"Name": "new", "SyncToken": "4"}));
    }

    #[test]
    fn test_merge_unmapped_does_not_override_target() {
        let mapped: [&KeyPath; 0] = [];
        let mut target = object(json!({"Memo": "mine"}));
        merge_unmapped(&mut target, &object(json!({"Memo": "theirs"})), &mapped);

        assert_eq!(target["Memo"], json!("mine"));
    }
}
