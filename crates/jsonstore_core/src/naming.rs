//! Field name casing.
//!
//! Only the first character of a name is ever changed; `firstName` and
//! `FirstName` are the two spellings of the same field.

use serde_json::{Map, Value};

/// Lowers (or uppers) the first character of `name`.
#[must_use]
pub fn fold_key(name: &str, lower_camel_case: bool) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if lower_camel_case => first.to_lowercase().chain(chars).collect(),
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Applies [`fold_key`] to every object key inside `value`, recursively.
#[must_use]
pub fn fold_keys(value: Value, lower_camel_case: bool) -> Value {
    match value {
        Value::Object(map) => {
            let folded: Map<String, Value> = map
                .into_iter()
                .map(|(k, v)| (fold_key(&k, lower_camel_case), fold_keys(v, lower_camel_case)))
                .collect();
            Value::Object(folded)
        }
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|v| fold_keys(v, lower_camel_case))
                .collect(),
        ),
        scalar => scalar,
    }
}

/// Case-insensitive name comparison.
#[must_use]
pub fn same_name(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b) || (!a.is_ascii() && a.to_lowercase() == b.to_lowercase())
}
