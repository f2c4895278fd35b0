//! The document tree: the parsed form of the whole store file.
//!
//! The root is a JSON object mapping top-level names either to a
//! collection (an array of documents) or to an item (any other value).

use crate::error::{CoreError, CoreResult};
use crate::naming::same_name;
use serde_json::{Map, Value};

/// Parsed content of a store file.
pub type Tree = Map<String, Value>;

/// What a top-level value is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// An array that is empty or starts with an object.
    Collection,
    /// Anything else.
    Item,
}

/// Classifies a top-level value.
#[must_use]
pub fn kind_of(value: &Value) -> ValueKind {
    match value {
        Value::Array(items) if items.first().map_or(true, Value::is_object) => {
            ValueKind::Collection
        }
        _ => ValueKind::Item,
    }
}

/// Parses store text. Blank text is an empty store.
///
/// # Errors
///
/// Returns an error if the text is not JSON or not a JSON object.
pub fn parse_tree(text: &str) -> CoreResult<Tree> {
    if text.trim().is_empty() {
        return Ok(Tree::new());
    }
    match serde_json::from_str::<Value>(text)? {
        Value::Object(map) => Ok(map),
        other => Err(CoreError::invalid_format(format!(
            "expected a JSON object at the root, found {}",
            type_name(&other)
        ))),
    }
}

/// Renders the tree as JSON text.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn render_tree(tree: &Tree, minify: bool) -> CoreResult<String> {
    let text = if minify {
        serde_json::to_string(tree)?
    } else {
        serde_json::to_string_pretty(tree)?
    };
    Ok(text)
}

/// Lists top-level names with their kind, in file order.
#[must_use]
pub fn keys(tree: &Tree, filter: Option<ValueKind>) -> Vec<(String, ValueKind)> {
    tree.iter()
        .map(|(name, value)| (name.clone(), kind_of(value)))
        .filter(|(_, kind)| filter.map_or(true, |f| f == *kind))
        .collect()
}

/// Lists the names of all collections, in file order.
#[must_use]
pub fn collection_names(tree: &Tree) -> Vec<String> {
    keys(tree, Some(ValueKind::Collection))
        .into_iter()
        .map(|(name, _)| name)
        .collect()
}

/// Finds the stored spelling of a top-level name: the exact name if
/// present, otherwise the first name equal to it ignoring case.
#[must_use]
pub fn find_key(tree: &Tree, name: &str) -> Option<String> {
    if tree.contains_key(name) {
        return Some(name.to_string());
    }
    tree.keys().find(|k| same_name(k, name)).cloned()
}

/// Returns the documents of the collection `name`, or nothing if it is
/// absent or holds an item.
#[must_use]
pub fn documents(tree: &Tree, name: &str) -> Vec<Value> {
    let value = find_key(tree, name).and_then(|key| tree.get(&key));
    match value {
        Some(value) if kind_of(value) == ValueKind::Collection => {
            value.as_array().cloned().unwrap_or_default()
        }
        _ => Vec::new(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn blank_text_is_empty_tree() {
        assert!(parse_tree("").unwrap().is_empty());
        assert!(parse_tree("  \n").unwrap().is_empty());
    }

    #[test]
    fn non_object_root_is_rejected() {
        let err = parse_tree("[1,2]").unwrap_err();
        assert!(matches!(err, CoreError::InvalidFormat { .. }));
        assert!(matches!(parse_tree("{oops"), Err(CoreError::Json(_))));
    }

    #[test]
    fn classify_top_level_values() {
        assert_eq!(kind_of(&json!([])), ValueKind::Collection);
        assert_eq!(kind_of(&json!([{ "id": 1 }])), ValueKind::Collection);
        assert_eq!(kind_of(&json!([1, 2])), ValueKind::Item);
        assert_eq!(kind_of(&json!("x")), ValueKind::Item);
        assert_eq!(kind_of(&json!({ "a": 1 })), ValueKind::Item);
    }

    #[test]
    fn keys_keep_file_order() {
        let tree = parse_tree(r#"{"user":[],"counter":3,"movies":[{"name":"x"}],"list":[1]}"#).unwrap();

        assert_eq!(
            keys(&tree, None),
            vec![
                ("user".to_string(), ValueKind::Collection),
                ("counter".to_string(), ValueKind::Item),
                ("movies".to_string(), ValueKind::Collection),
                ("list".to_string(), ValueKind::Item),
            ]
        );
        assert_eq!(collection_names(&tree), vec!["user", "movies"]);
        assert_eq!(keys(&tree, Some(ValueKind::Item)).len(), 2);
    }

    #[test]
    fn render_minified_and_pretty() {
        let tree = parse_tree(r#"{"a":[{"b":1}]}"#).unwrap();
        assert_eq!(render_tree(&tree, true).unwrap(), r#"{"a":[{"b":1}]}"#);
        assert!(render_tree(&tree, false).unwrap().contains('\n'));
    }

    #[test]
    fn documents_of_missing_collection_are_empty() {
        let tree = parse_tree(r#"{"a":[{"b":1}],"n":1}"#).unwrap();
        assert_eq!(documents(&tree, "a").len(), 1);
        assert!(documents(&tree, "missing").is_empty());
        assert!(documents(&tree, "n").is_empty());
    }

    #[test]
    fn names_resolve_ignoring_case() {
        let tree = parse_tree(r#"{"User":[{"b":1}],"scores":[1,2]}"#).unwrap();
        assert_eq!(find_key(&tree, "user").as_deref(), Some("User"));
        assert_eq!(find_key(&tree, "User").as_deref(), Some("User"));
        assert_eq!(find_key(&tree, "movies"), None);
        assert_eq!(documents(&tree, "user").len(), 1);
        assert!(documents(&tree, "scores").is_empty());
    }
}
