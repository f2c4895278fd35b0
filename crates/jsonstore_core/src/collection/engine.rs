//! Collection operations over a list of documents.
//!
//! These functions run inside commit transforms, against the documents
//! freshly read from the store, never against a view's cache. Each one
//! returns whether it applied; on `Ok(false)` or an error the list is left
//! exactly as it was.

use crate::document::contains_text;
use crate::error::CoreResult;
use crate::identifier::assign_id;
use crate::patch::{merge, MergeOptions};
use serde_json::Value;

/// Document predicate used by mutations.
///
/// Typed views wrap the caller's predicate so it sees the record form; an
/// error (for example a document that does not fit the record type) aborts
/// the operation.
pub type Matcher = Box<dyn Fn(&Value) -> CoreResult<bool> + Send + Sync>;

/// Post-merge step of an update: receives the stored document and the
/// merged one, returns the document to keep.
pub type Conform = Box<dyn Fn(&Value, Value) -> CoreResult<Value> + Send + Sync>;

/// How many matching documents an operation touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// The first match in collection order.
    First,
    /// Every match.
    All,
}

/// Appends documents, filling in missing identifiers.
///
/// Each new document's identifier is computed against the list as it grows,
/// so a batch of documents without identifiers receives consecutive ones.
pub fn insert(docs: &mut Vec<Value>, new_docs: Vec<Value>, key_field: &str) -> bool {
    if new_docs.is_empty() {
        return false;
    }
    for mut doc in new_docs {
        assign_id(&mut doc, docs, key_field);
        docs.push(doc);
    }
    true
}

/// Substitutes matching documents with `replacement`.
///
/// Without a match, `upsert` appends the replacement instead.
///
/// # Errors
///
/// Returns the first error raised by `matcher`.
pub fn replace(
    docs: &mut Vec<Value>,
    matcher: &Matcher,
    replacement: Value,
    scope: Scope,
    upsert: bool,
    key_field: &str,
) -> CoreResult<bool> {
    let hits = matches(docs, matcher, scope)?;
    if hits.is_empty() {
        if !upsert {
            return Ok(false);
        }
        return Ok(insert(docs, vec![replacement], key_field));
    }
    for index in hits {
        docs[index] = replacement.clone();
    }
    Ok(true)
}

/// Merges `patch` into matching documents.
///
/// When `conform` is given, each merged document is passed to it together
/// with the stored one, and its result is what gets written back.
///
/// # Errors
///
/// Returns the first error raised by `matcher` or `conform`.
pub fn update(
    docs: &mut [Value],
    matcher: &Matcher,
    patch: &Value,
    scope: Scope,
    options: &MergeOptions,
    conform: Option<&Conform>,
) -> CoreResult<bool> {
    let hits = matches(docs, matcher, scope)?;
    let mut updated = Vec::with_capacity(hits.len());
    for &index in &hits {
        let mut merged = docs[index].clone();
        merge(&mut merged, patch, options);
        updated.push(match conform {
            Some(conform) => conform(&docs[index], merged)?,
            None => merged,
        });
    }
    for (index, doc) in hits.iter().zip(updated) {
        docs[*index] = doc;
    }
    Ok(!hits.is_empty())
}

/// Removes matching documents.
///
/// # Errors
///
/// Returns the first error raised by `matcher`.
pub fn delete(docs: &mut Vec<Value>, matcher: &Matcher, scope: Scope) -> CoreResult<bool> {
    let hits = matches(docs, matcher, scope)?;
    for &index in hits.iter().rev() {
        docs.remove(index);
    }
    Ok(!hits.is_empty())
}

/// Documents holding a scalar whose text contains `needle`.
pub fn find_text<'a>(
    docs: &'a [Value],
    needle: &'a str,
    case_sensitive: bool,
) -> impl Iterator<Item = &'a Value> + 'a {
    docs.iter()
        .filter(move |doc| contains_text(doc, needle, case_sensitive))
}

/// Indices of matching documents, ascending. Matching stops early for
/// [`Scope::First`].
fn matches(docs: &[Value], matcher: &Matcher, scope: Scope) -> CoreResult<Vec<usize>> {
    let mut hits = Vec::new();
    for (index, doc) in docs.iter().enumerate() {
        if matcher(doc)? {
            hits.push(index);
            if scope == Scope::First {
                break;
            }
        }
    }
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::get_field;
    use crate::error::CoreError;
    use serde_json::json;

    fn by_name(name: &'static str) -> Matcher {
        Box::new(move |doc| Ok(get_field(doc, "name").and_then(Value::as_str) == Some(name)))
    }

    fn users() -> Vec<Value> {
        vec![
            json!({ "id": 1, "name": "Phil", "age": 40 }),
            json!({ "id": 2, "name": "Ann", "age": 30 }),
            json!({ "id": 3, "name": "Phil", "age": 20 }),
        ]
    }

    #[test]
    fn sequential_inserts_number_from_zero() {
        let mut docs = Vec::new();
        for _ in 0..5 {
            assert!(insert(&mut docs, vec![json!({ "name": "x" })], "id"));
        }
        let ids: Vec<_> = docs.iter().map(|d| d["id"].clone()).collect();
        assert_eq!(ids, vec![json!(0), json!(1), json!(2), json!(3), json!(4)]);
    }

    #[test]
    fn insert_many_assigns_consecutive_ids() {
        let mut docs = users();
        insert(&mut docs, vec![json!({ "name": "a" }), json!({ "id": 0, "name": "b" })], "id");
        assert_eq!(docs[3]["id"], 4);
        assert_eq!(docs[4]["id"], 5);
        assert!(!insert(&mut docs, Vec::new(), "id"));
    }

    #[test]
    fn replace_without_match_or_upsert_changes_nothing() {
        let mut docs = users();
        let applied =
            replace(&mut docs, &by_name("Nobody"), json!({ "name": "New" }), Scope::First, false, "id")
                .unwrap();
        assert!(!applied);
        assert_eq!(docs, users());
    }

    #[test]
    fn replace_with_upsert_appends() {
        let mut docs = users();
        let applied =
            replace(&mut docs, &by_name("Nobody"), json!({ "name": "New" }), Scope::First, true, "id")
                .unwrap();
        assert!(applied);
        assert_eq!(docs.len(), 4);
        assert_eq!(docs[3], json!({ "name": "New", "id": 4 }));
    }

    #[test]
    fn replace_first_and_all() {
        let mut docs = users();
        replace(&mut docs, &by_name("Phil"), json!({ "id": 9, "name": "P" }), Scope::First, false, "id")
            .unwrap();
        assert_eq!(docs[0]["name"], "P");
        assert_eq!(docs[2]["name"], "Phil");

        let mut docs = users();
        replace(&mut docs, &by_name("Phil"), json!({ "id": 9, "name": "P" }), Scope::All, false, "id")
            .unwrap();
        assert_eq!(docs[0]["name"], "P");
        assert_eq!(docs[2]["name"], "P");
    }

    #[test]
    fn update_merges_into_matches() {
        let mut docs = users();
        let options = MergeOptions::for_shape(false, true);
        assert!(update(&mut docs, &by_name("Phil"), &json!({ "age": 1 }), Scope::All, &options, None).unwrap());
        assert_eq!(docs[0], json!({ "id": 1, "name": "Phil", "age": 1 }));
        assert_eq!(docs[2], json!({ "id": 3, "name": "Phil", "age": 1 }));
        assert_eq!(docs[1]["age"], 30);

        assert!(!update(&mut docs, &by_name("Zed"), &json!({ "age": 1 }), Scope::All, &options, None).unwrap());
    }

    #[test]
    fn conform_rejection_leaves_documents_alone() {
        let mut docs = users();
        let options = MergeOptions::for_shape(true, true);
        // Accepts the first merged document, rejects the second.
        let conform: Conform = Box::new(|stored: &Value, merged: Value| {
            if stored["id"] == 3 {
                Err(CoreError::invalid_operation("does not fit"))
            } else {
                Ok(merged)
            }
        });

        let result = update(
            &mut docs,
            &by_name("Phil"),
            &json!({ "age": 1 }),
            Scope::All,
            &options,
            Some(&conform),
        );
        assert!(result.is_err());
        assert_eq!(docs, users());
    }

    #[test]
    fn conform_result_is_written_back() {
        let mut docs = users();
        let options = MergeOptions::for_shape(true, true);
        let conform: Conform = Box::new(|_: &Value, mut merged: Value| {
            if let Some(map) = merged.as_object_mut() {
                map.remove("extra");
            }
            Ok(merged)
        });

        let patch = json!({ "age": 2, "extra": true });
        assert!(update(&mut docs, &by_name("Ann"), &patch, Scope::First, &options, Some(&conform)).unwrap());
        assert_eq!(docs[1], json!({ "id": 2, "name": "Ann", "age": 2 }));
    }

    #[test]
    fn delete_first_and_all() {
        let mut docs = users();
        assert!(delete(&mut docs, &by_name("Phil"), Scope::First).unwrap());
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1]["id"], 3);

        let mut docs = users();
        assert!(delete(&mut docs, &by_name("Phil"), Scope::All).unwrap());
        assert_eq!(docs, vec![json!({ "id": 2, "name": "Ann", "age": 30 })]);

        assert!(!delete(&mut docs, &by_name("Phil"), Scope::All).unwrap());
    }

    #[test]
    fn matcher_error_leaves_documents_alone() {
        let mut docs = users();
        let failing: Matcher = Box::new(|_| Err(CoreError::invalid_operation("bad")));
        assert!(delete(&mut docs, &failing, Scope::All).is_err());
        assert_eq!(docs, users());
    }

    #[test]
    fn text_search_walks_nested_values() {
        let docs = vec![
            json!({ "name": "Phil", "work": { "city": "Helsinki" } }),
            json!({ "name": "Ann", "tags": ["ok", "HELSINKI-north"] }),
            json!({ "name": "Bob", "age": 1984 }),
        ];
        assert_eq!(find_text(&docs, "helsinki", false).count(), 2);
        assert_eq!(find_text(&docs, "helsinki", true).count(), 0);
        assert_eq!(find_text(&docs, "198", true).count(), 1);
    }
}
