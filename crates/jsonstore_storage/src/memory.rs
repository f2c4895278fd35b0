//! In-memory text store for testing.

use crate::backend::TextStore;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// An in-memory text store.
///
/// This store keeps its content in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral stores that don't need persistence
///
/// Writes can be made to fail on demand so persist-failure paths can be
/// exercised without touching the file system.
///
/// # Example
///
/// ```rust
/// use jsonstore_storage::{InMemoryTextStore, TextStore};
///
/// let store = InMemoryTextStore::with_text("{}");
/// assert_eq!(store.read_text().unwrap(), "{}");
/// assert_eq!(store.write_count(), 0);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryTextStore {
    text: RwLock<String>,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl InMemoryTextStore {
    /// Creates a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory store with pre-existing content.
    #[must_use]
    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            text: RwLock::new(text.into()),
            ..Self::default()
        }
    }

    /// Makes every following write fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Returns how many writes succeeded so far.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl TextStore for InMemoryTextStore {
    fn read_text(&self) -> StorageResult<String> {
        Ok(self.text.read().clone())
    }

    fn write_text(&self, text: &str) -> StorageResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "writes disabled on in-memory store",
            )));
        }
        *self.text.write() = text.to_string();
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
