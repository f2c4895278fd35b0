//! Text store trait definition.

use crate::error::StorageResult;

/// A whole-content text store for jsonstore.
///
/// Text stores are **opaque string stores**. A store holds exactly one
/// text blob: `read_text` returns all of it, `write_text` replaces all of it.
/// jsonstore owns the interpretation of the text (JSON, encryption envelope).
///
/// # Invariants
///
/// - `read_text` returns exactly the text of the last successful `write_text`
///   (or the initial content if none happened)
/// - A failed `write_text` leaves the previous content intact
/// - Stores must be `Send + Sync` so the commit worker can own them
///
/// # Implementors
///
/// - [`super::InMemoryTextStore`] - For testing
/// - [`super::FileTextStore`] - For persistent storage
/// - [`super::EncryptedTextStore`] - Encrypting wrapper around another store
pub trait TextStore: Send + Sync {
    /// Reads the complete content.
    ///
    /// # Errors
    ///
    /// Returns an error if the content cannot be read within the retry
    /// budget, or an I/O error occurs.
    fn read_text(&self) -> StorageResult<String>;

    /// Replaces the complete content.
    ///
    /// After this returns successfully the new content is durable.
    ///
    /// # Errors
    ///
    /// Returns an error if the content cannot be written within the retry
    /// budget, or an I/O error occurs.
    fn write_text(&self, text: &str) -> StorageResult<()>;

    /// Describes where the content lives, for logs and error messages.
    fn location(&self) -> String;
}

impl<T: TextStore + ?Sized> TextStore for std::sync::Arc<T> {
    fn read_text(&self) -> StorageResult<String> {
        (**self).read_text()
    }

    fn write_text(&self, text: &str) -> StorageResult<()> {
        (**self).write_text(text)
    }

    fn location(&self) -> String {
        (**self).location()
    }
}
