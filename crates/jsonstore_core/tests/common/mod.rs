//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use jsonstore_core::{Record, Store, StoreConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A file-backed store in a temporary directory.
pub struct TestStore {
    /// The store handle.
    pub store: Store,
    path: PathBuf,
    _temp_dir: TempDir,
}

impl TestStore {
    /// An empty store file with the default configuration.
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// An empty store file.
    pub fn with_config(config: StoreConfig) -> Self {
        Self::with_content("", config)
    }

    /// A store file that starts out holding `content`.
    pub fn with_content(content: &str, config: StoreConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("data.json");
        std::fs::write(&path, content).expect("Failed to seed store file");
        let store = Store::open(&path, config).expect("Failed to open store");
        Self {
            store,
            path,
            _temp_dir: temp_dir,
        }
    }

    /// Path of the store file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens another handle on the same file.
    pub fn reopen(&self, config: StoreConfig) -> Store {
        Store::open(&self.path, config).expect("Failed to reopen store")
    }

    /// Raw file content.
    pub fn raw(&self) -> String {
        std::fs::read_to_string(&self.path).expect("Failed to read store file")
    }
}

impl std::ops::Deref for TestStore {
    type Target = Store;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// Three users, as an indented store file.
pub const THREE_USERS: &str = r#"{
  "user": [
    { "id": 1, "name": "Phil", "age": 40, "city": "Helsinki" },
    { "id": 2, "name": "Ann", "age": 30, "city": "Tampere" },
    { "id": 3, "name": "Bob", "age": 20, "city": "Turku" }
  ],
  "movies": [],
  "counter": 7
}"#;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub age: i64,
    #[serde(default)]
    pub city: Option<String>,
}

impl Record for User {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Friend {
    pub name: String,
    pub age: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Family {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub friends: Option<Vec<Friend>>,
}

impl Record for Family {}

pub fn user(name: &str, age: i64) -> User {
    User {
        id: 0,
        name: name.to_string(),
        age,
        city: None,
    }
}
