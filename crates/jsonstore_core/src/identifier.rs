//! Identifier policy: the next synthetic key of a collection.
//!
//! Two identifier shapes are supported:
//!
//! - **Numeric**: one more than the largest numeric identifier in the
//!   collection, `0` when there is none.
//! - **Textual**: the identifier of the last document (in collection order)
//!   that has one, with its trailing decimal run incremented:
//!   `hello2` → `hello3`, `item` → `item1`, `a09` → `a10`. `"0"` when there
//!   is none.
//!
//! The shape is taken from the last document carrying an identifier. An
//! empty collection uses the shape of the document being inserted.

use crate::document::{get_field, get_field_mut};
use serde_json::Value;

/// Shape of generated identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdShape {
    /// Integer identifiers.
    Numeric,
    /// String identifiers with a numeric suffix.
    Textual,
}

impl IdShape {
    /// The shape suggested by an identifier value.
    #[must_use]
    pub fn of(value: Option<&Value>) -> Self {
        match value {
            Some(Value::String(_)) => Self::Textual,
            _ => Self::Numeric,
        }
    }
}

/// Whether an identifier value counts as "not set" on insert.
#[must_use]
pub fn is_unset(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::Number(n)) => n.as_f64() == Some(0.0),
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

/// Identifier of the last document that carries one.
fn last_populated<'a>(docs: &'a [Value], key: &str) -> Option<&'a Value> {
    docs.iter()
        .rev()
        .filter_map(|doc| get_field(doc, key))
        .find(|v| !v.is_null())
}

/// Computes the next identifier without changing anything.
#[must_use]
pub fn next_id(docs: &[Value], key: &str, empty_shape: IdShape) -> Value {
    match last_populated(docs, key) {
        None => match empty_shape {
            IdShape::Numeric => Value::from(0),
            IdShape::Textual => Value::from("0"),
        },
        Some(Value::String(last)) => Value::String(next_text_id(last)),
        Some(_) => {
            let max = docs
                .iter()
                .filter_map(|doc| get_field(doc, key))
                .filter_map(Value::as_i64)
                .max();
            Value::from(max.map_or(0, |m| m.saturating_add(1)))
        }
    }
}

/// Increments the trailing decimal run of `id`, dropping leading zeros.
#[must_use]
pub fn next_text_id(id: &str) -> String {
    let split = id
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map_or(id.len(), |(i, _)| i);
    let (base, digits) = id.split_at(split);

    let mut number: Vec<u8> = digits
        .trim_start_matches('0')
        .bytes()
        .map(|b| b - b'0')
        .collect();

    // Decimal add-one with carry; no width limit.
    let mut carry = true;
    for digit in number.iter_mut().rev() {
        if !carry {
            break;
        }
        if *digit == 9 {
            *digit = 0;
        } else {
            *digit += 1;
            carry = false;
        }
    }
    if carry {
        number.insert(0, 1);
    }

    let suffix: String = number.iter().map(|d| char::from(b'0' + d)).collect();
    format!("{base}{suffix}")
}

/// Fills in the identifier of a document about to be added after
/// `existing`. Returns whether an identifier was assigned.
///
/// Documents that already carry a set identifier are left alone. A document
/// without the key field at all is left alone when the collection uses
/// textual identifiers.
pub fn assign_id(doc: &mut Value, existing: &[Value], key: &str) -> bool {
    let current = get_field(doc, key);
    if !is_unset(current) {
        return false;
    }
    if current.is_none()
        && matches!(last_populated(existing, key), Some(Value::String(_)))
    {
        return false;
    }

    let next = next_id(existing, key, IdShape::of(current));
    if let Some(slot) = get_field_mut(doc, key) {
        *slot = next;
        return true;
    }
    match doc.as_object_mut() {
        Some(map) => {
            map.insert(key.to_string(), next);
            true
        }
        None => false,
    }
}
