//! Inspect command implementation.

use jsonstore_core::{Store, StoreConfig, ValueKind};
use serde::Serialize;
use serde_json::Value;
use std::path::Path;

/// Store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Store file path.
    pub path: String,
    /// File size in bytes.
    pub file_size: u64,
    /// Whether the file is encrypted.
    pub encrypted: bool,
    /// Collections, in file order.
    pub collections: Vec<CollectionStats>,
    /// Names of top-level items, in file order.
    pub items: Vec<String>,
}

/// Statistics for a single collection.
#[derive(Debug, Serialize)]
pub struct CollectionStats {
    /// Collection name.
    pub name: String,
    /// Number of documents.
    pub document_count: usize,
    /// Identifier the next insert would receive.
    pub next_id: Value,
}

/// Runs the inspect command.
pub fn run(
    path: &Path,
    passphrase: Option<String>,
    key_field: Option<String>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let result = inspect(path, passphrase, key_field)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

/// Collects statistics without printing them.
pub fn inspect(
    path: &Path,
    passphrase: Option<String>,
    key_field: Option<String>,
) -> Result<InspectResult, Box<dyn std::error::Error>> {
    if !path.is_file() {
        return Err(format!("No store found at {}", path.display()).into());
    }

    let encrypted = passphrase.is_some();
    let mut config = StoreConfig::new();
    config.passphrase = passphrase;
    config.key_field = key_field;

    let store = Store::open(path, config)?;
    let mut result = InspectResult {
        path: path.display().to_string(),
        file_size: std::fs::metadata(path)?.len(),
        encrypted,
        collections: Vec::new(),
        items: Vec::new(),
    };

    for (name, kind) in store.keys(None) {
        match kind {
            ValueKind::Collection => {
                let collection = store.dynamic_collection(&name)?;
                result.collections.push(CollectionStats {
                    document_count: collection.count(),
                    next_id: collection.next_id(),
                    name,
                });
            }
            ValueKind::Item => result.items.push(name),
        }
    }
    store.close();

    Ok(result)
}

fn print_text_output(result: &InspectResult) {
    println!("jsonstore Inspection");
    println!("====================");
    println!();
    println!("Path:      {}", result.path);
    println!("Size:      {} bytes", format_size(result.file_size));
    println!("Encrypted: {}", if result.encrypted { "yes" } else { "no" });
    println!();
    println!("Collections:");
    if result.collections.is_empty() {
        println!("  (none)");
    }
    for col in &result.collections {
        println!(
            "  {} - {} documents, next id {}",
            col.name, col.document_count, col.next_id
        );
    }
    println!();
    println!("Items:");
    if result.items.is_empty() {
        println!("  (none)");
    }
    for item in &result.items {
        println!("  {item}");
    }
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{}", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn lists_collections_and_items() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(
            &path,
            r#"{"user":[{"id":1},{"id":5}],"counter":3,"movies":[],"tags":["a"]}"#,
        )
        .unwrap();

        let result = inspect(&path, None, None).unwrap();
        let names: Vec<_> = result.collections.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["user", "movies"]);
        assert_eq!(result.collections[0].document_count, 2);
        assert_eq!(result.collections[0].next_id, json!(6));
        assert_eq!(result.items, vec!["counter", "tags"]);
        assert!(!result.encrypted);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(inspect(&dir.path().join("nope.json"), None, None).is_err());
        assert!(!dir.path().join("nope.json").exists());
    }

    #[test]
    fn size_formatting() {
        assert_eq!(format_size(10), "10");
        assert_eq!(format_size(2048), "2.0 KB");
    }
}
