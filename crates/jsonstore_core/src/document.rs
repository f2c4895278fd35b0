//! Documents and their two shapes.
//!
//! Every document is held as a [`serde_json::Value`] object. Callers see it
//! either as a statically-typed record (any serde type implementing
//! [`Record`]) or as the dynamically-shaped `Value` itself. All engine logic
//! (matching, merging, identifier handling) runs on the `Value` form.

use crate::error::CoreResult;
use crate::naming::{fold_keys, same_name};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Types that can be stored as documents in a collection or as items.
///
/// Implemented for `serde_json::Value`, common scalars, `String`, and
/// `Option` and `Vec` of those.
///
/// Implement it for your serde types with an empty `impl`:
///
/// ```rust
/// use jsonstore_core::Record;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct User {
///     id: i64,
///     name: String,
/// }
///
/// impl Record for User {}
/// ```
///
/// `serde_json::Value` implements it as the dynamically-shaped record.
pub trait Record: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// True for the schema-free shape, whose fields are discovered at read
    /// time and may be added by updates.
    fn is_dynamic() -> bool {
        false
    }
}

impl Record for Value {
    fn is_dynamic() -> bool {
        true
    }
}

// Plain values, mostly stored as items.
macro_rules! impl_record {
    ($($ty:ty),* $(,)?) => {
        $(impl Record for $ty {})*
    };
}

impl_record!(String, bool, i8, i16, i32, i64, u8, u16, u32, u64, f32, f64);

impl<T: Record> Record for Option<T> {
    fn is_dynamic() -> bool {
        T::is_dynamic()
    }
}

impl<T: Record> Record for Vec<T> {
    fn is_dynamic() -> bool {
        T::is_dynamic()
    }
}

/// Converts a record into its stored form, folding field names.
///
/// # Errors
///
/// Returns an error if the record cannot be serialized.
pub fn to_document<T: Record>(item: &T, lower_camel_case: bool) -> CoreResult<Value> {
    Ok(fold_keys(serde_json::to_value(item)?, lower_camel_case))
}

/// Converts a stored document into a record.
///
/// Typed records see field names with a lower-case first character,
/// whatever casing the file uses.
///
/// # Errors
///
/// Returns an error if the document does not fit `T`.
pub fn from_document<T: Record>(doc: &Value) -> CoreResult<T> {
    let value = if T::is_dynamic() {
        doc.clone()
    } else {
        fold_keys(doc.clone(), true)
    };
    Ok(serde_json::from_value(value)?)
}

/// Looks a field up by case-insensitive name.
///
/// Returns `None` if `doc` is not an object or has no such field.
#[must_use]
pub fn get_field<'a>(doc: &'a Value, name: &str) -> Option<&'a Value> {
    let map = doc.as_object()?;
    map.get(name)
        .or_else(|| map.iter().find(|(k, _)| same_name(k, name)).map(|(_, v)| v))
}

/// Mutable variant of [`get_field`].
pub fn get_field_mut<'a>(doc: &'a mut Value, name: &str) -> Option<&'a mut Value> {
    let map = doc.as_object_mut()?;
    let key = if map.contains_key(name) {
        name.to_string()
    } else {
        map.keys().find(|k| same_name(k, name))?.clone()
    };
    map.get_mut(&key)
}

/// Whether `value` (recursively) holds a scalar whose text contains `needle`.
#[must_use]
pub fn contains_text(value: &Value, needle: &str, case_sensitive: bool) -> bool {
    if case_sensitive {
        walk_text(value, &|text| text.contains(needle))
    } else {
        let needle = needle.to_lowercase();
        walk_text(value, &|text| text.to_lowercase().contains(&needle))
    }
}

fn walk_text(value: &Value, test: &dyn Fn(&str) -> bool) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => test(if *b { "true" } else { "false" }),
        Value::Number(n) => test(&n.to_string()),
        Value::String(s) => test(s),
        Value::Array(items) => items.iter().any(|v| walk_text(v, test)),
        Value::Object(map) => map.values().any(|v| walk_text(v, test)),
    }
}
