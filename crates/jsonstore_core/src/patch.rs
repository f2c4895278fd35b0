//! Patch merge: partial updates of stored documents.
//!
//! A patch is merged field by field into a target document:
//!
//! - object into object: merged recursively
//! - array into array: merged by position; scalar elements are replaced,
//!   object/array elements merged, the target grows when the patch is longer
//!   and keeps its trailing elements when the patch is shorter
//! - object into a field declared as keyed (a map, not a record): the whole
//!   map is replaced
//! - anything else, including `null` and type mismatches: replaced outright
//!
//! Field names match case-insensitively. Fields the target does not have are
//! added for dynamically-shaped documents. Typed documents are merged the
//! same way and then trimmed with [`retain_declared`] against the record's
//! own rendering, so only fields the record type declares are changed.

use crate::naming::{fold_key, same_name};
use serde_json::{Map, Value};

/// How a patch is applied.
#[derive(Debug, Clone, Default)]
pub struct MergeOptions {
    /// Add patch fields the target does not have.
    pub add_unknown_fields: bool,
    /// Field names whose object values are keyed maps, replaced wholesale.
    pub keyed_fields: Vec<String>,
    /// Casing for names of added fields.
    pub lower_camel_case: bool,
}

impl MergeOptions {
    /// Options for a target of the given shape.
    #[must_use]
    pub fn for_shape(dynamic: bool, lower_camel_case: bool) -> Self {
        Self {
            add_unknown_fields: dynamic,
            keyed_fields: Vec::new(),
            lower_camel_case,
        }
    }

    fn is_keyed(&self, name: &str) -> bool {
        self.keyed_fields.iter().any(|k| same_name(k, name))
    }
}

/// Merges `patch` into `target` in place.
pub fn merge(target: &mut Value, patch: &Value, options: &MergeOptions) {
    match (target, patch) {
        (Value::Object(t), Value::Object(p)) => merge_object(t, p, options),
        (target, patch) => *target = patch.clone(),
    }
}

fn merge_object(target: &mut Map<String, Value>, patch: &Map<String, Value>, options: &MergeOptions) {
    for (name, patch_value) in patch {
        let existing = if target.contains_key(name) {
            Some(name.clone())
        } else {
            target.keys().find(|k| same_name(k, name)).cloned()
        };

        match existing {
            Some(key) => {
                if let Some(slot) = target.get_mut(&key) {
                    merge_field(slot, patch_value, options.is_keyed(name), options);
                }
            }
            None if options.add_unknown_fields => {
                target.insert(fold_key(name, options.lower_camel_case), patch_value.clone());
            }
            None => {}
        }
    }
}

fn merge_field(slot: &mut Value, patch: &Value, keyed: bool, options: &MergeOptions) {
    match (slot, patch) {
        (Value::Object(t), Value::Object(p)) if !keyed => merge_object(t, p, options),
        (Value::Array(t), Value::Array(p)) => merge_list(t, p, options),
        (slot, patch) => *slot = patch.clone(),
    }
}

fn merge_list(target: &mut Vec<Value>, patch: &[Value], options: &MergeOptions) {
    for (index, patch_item) in patch.iter().enumerate() {
        match target.get_mut(index) {
            Some(slot) => merge_field(slot, patch_item, false, options),
            // A fresh element takes everything the patch supplies.
            None => target.push(patch_item.clone()),
        }
    }
}

/// Trims a merge result down to what a typed record declares.
///
/// `merged` is `stored` with a patch applied and `declared` is `merged` as
/// rendered through the record type. Fields the patch added survive only
/// when `declared` has them; declared fields keep the merged value, in
/// their declared form when the merge produced a record or list. Stored
/// fields the record does not declare are restored as stored. List elements
/// the patch appended take their declared form.
pub fn retain_declared(merged: &mut Value, stored: &Value, declared: &Value) {
    match (merged, stored, declared) {
        (Value::Object(merged), Value::Object(stored), Value::Object(declared)) => {
            retain_fields(merged, stored, declared);
        }
        (Value::Array(items), Value::Array(stored), Value::Array(declared)) => {
            for (index, item) in items.iter_mut().enumerate() {
                match (stored.get(index), declared.get(index)) {
                    (Some(stored), Some(declared)) => retain_declared(item, stored, declared),
                    (None, Some(declared)) => *item = declared.clone(),
                    _ => {}
                }
            }
        }
        (merged, _, declared) => {
            if merged.is_object() || merged.is_array() {
                *merged = declared.clone();
            }
        }
    }
}

fn retain_fields(merged: &mut Map<String, Value>, stored: &Map<String, Value>, declared: &Map<String, Value>) {
    merged.retain(|name, value| match (field(stored, name), field(declared, name)) {
        (Some(stored), Some(declared)) => {
            retain_declared(value, stored, declared);
            true
        }
        (Some(stored), None) => {
            *value = stored.clone();
            true
        }
        (None, Some(declared)) => {
            *value = declared.clone();
            true
        }
        (None, None) => false,
    });
}

fn field<'a>(map: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    map.get(name)
        .or_else(|| map.iter().find(|(k, _)| same_name(k, name)).map(|(_, v)| v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dynamic() -> MergeOptions {
        MergeOptions::for_shape(true, true)
    }

    fn typed() -> MergeOptions {
        MergeOptions::for_shape(false, true)
    }

    #[test]
    fn untouched_fields_survive_and_merge_is_idempotent() {
        let mut doc = json!({ "a": 1, "b": 2 });
        merge(&mut doc, &json!({ "b": 3 }), &typed());
        assert_eq!(doc, json!({ "a": 1, "b": 3 }));

        merge(&mut doc, &json!({ "b": 3 }), &typed());
        assert_eq!(doc, json!({ "a": 1, "b": 3 }));
    }

    #[test]
    fn nested_records_merge_recursively() {
        let mut doc = json!({ "work": { "name": "ACME", "address": "Street 1" } });
        merge(&mut doc, &json!({ "work": { "address": "Street 2" } }), &typed());
        assert_eq!(doc, json!({ "work": { "name": "ACME", "address": "Street 2" } }));
    }

    #[test]
    fn names_match_case_insensitively() {
        let mut doc = json!({ "Name": "x", "Age": 1 });
        merge(&mut doc, &json!({ "name": "y" }), &typed());
        assert_eq!(doc, json!({ "Name": "y", "Age": 1 }));
    }

    #[test]
    fn unknown_fields_depend_on_shape() {
        let mut typed_doc = json!({ "name": "x" });
        merge(&mut typed_doc, &json!({ "Extra": true }), &typed());
        assert_eq!(typed_doc, json!({ "name": "x" }));

        let mut dyn_doc = json!({ "name": "x" });
        merge(&mut dyn_doc, &json!({ "Extra": true }), &dynamic());
        assert_eq!(dyn_doc, json!({ "name": "x", "extra": true }));
    }

    #[test]
    fn lists_merge_by_position() {
        let mut doc = json!({ "scores": [1, 2, 3] });
        merge(&mut doc, &json!({ "scores": [9] }), &typed());
        assert_eq!(doc, json!({ "scores": [9, 2, 3] }));

        merge(&mut doc, &json!({ "scores": [9, 8, 7, 6] }), &typed());
        assert_eq!(doc, json!({ "scores": [9, 8, 7, 6] }));
    }

    #[test]
    fn list_elements_merge_recursively() {
        let mut doc = json!({ "friends": [{ "name": "A", "age": 1 }, { "name": "B", "age": 2 }] });
        merge(&mut doc, &json!({ "friends": [{ "age": 10 }] }), &typed());
        assert_eq!(
            doc,
            json!({ "friends": [{ "name": "A", "age": 10 }, { "name": "B", "age": 2 }] })
        );
    }

    #[test]
    fn list_grows_with_new_elements() {
        let mut doc = json!({ "friends": [{ "name": "A" }] });
        merge(&mut doc, &json!({ "friends": [{}, { "name": "B", "age": 3 }] }), &typed());
        assert_eq!(doc, json!({ "friends": [{ "name": "A" }, { "name": "B", "age": 3 }] }));
    }

    #[test]
    fn keyed_fields_are_replaced_wholesale() {
        let mut options = typed();
        options.keyed_fields.push("Props".into());

        let mut doc = json!({ "props": { "a": 1, "b": 2 }, "work": { "a": 1, "b": 2 } });
        merge(
            &mut doc,
            &json!({ "props": { "c": 3 }, "work": { "c": 3 } }),
            &options,
        );
        assert_eq!(doc["props"], json!({ "c": 3 }));
        assert_eq!(doc["work"], json!({ "a": 1, "b": 2 }));
    }

    #[test]
    fn null_clears_and_values_come_back() {
        let mut doc = json!({ "tags": ["a", "b"] });
        merge(&mut doc, &json!({ "tags": null }), &typed());
        assert_eq!(doc, json!({ "tags": null }));

        merge(&mut doc, &json!({ "tags": ["c"] }), &typed());
        assert_eq!(doc, json!({ "tags": ["c"] }));
    }

    #[test]
    fn type_mismatch_replaces() {
        let mut doc = json!({ "value": { "nested": 1 } });
        merge(&mut doc, &json!({ "value": 5 }), &typed());
        assert_eq!(doc, json!({ "value": 5 }));
    }

    #[test]
    fn non_object_target_is_replaced() {
        let mut item = json!(3);
        merge(&mut item, &json!({ "a": 1 }), &dynamic());
        assert_eq!(item, json!({ "a": 1 }));
    }

    #[test]
    fn retain_keeps_declared_additions_only() {
        let stored = json!({ "id": 1, "name": "Phil", "legacy": "x" });
        let mut merged = stored.clone();
        merge(
            &mut merged,
            &json!({ "city": "Oulu", "nickname": "P", "legacy": "y" }),
            &dynamic(),
        );
        let declared = json!({ "id": 1, "name": "Phil", "city": "Oulu" });

        retain_declared(&mut merged, &stored, &declared);
        assert_eq!(merged, json!({ "id": 1, "name": "Phil", "legacy": "x", "city": "Oulu" }));
    }

    #[test]
    fn retain_keeps_stored_spelling() {
        let stored = json!({ "Name": "Ann", "Age": 1 });
        let mut merged = stored.clone();
        merge(&mut merged, &json!({ "age": 2 }), &dynamic());
        let declared = json!({ "name": "Ann", "age": 2 });

        retain_declared(&mut merged, &stored, &declared);
        assert_eq!(merged, json!({ "Name": "Ann", "Age": 2 }));
    }

    #[test]
    fn retain_uses_declared_form_of_appended_elements() {
        let stored = json!({ "friends": [{ "name": "A", "age": 1 }] });
        let mut merged = stored.clone();
        merge(
            &mut merged,
            &json!({ "friends": [{}, { "name": "B", "age": 2, "extra": 1 }] }),
            &dynamic(),
        );
        let declared = json!({ "friends": [{ "name": "A", "age": 1 }, { "name": "B", "age": 2 }] });

        retain_declared(&mut merged, &stored, &declared);
        assert_eq!(merged, declared);
    }
}
