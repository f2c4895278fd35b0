//! Encrypted text store wrapper.
//!
//! Wraps any other [`TextStore`] and keeps its content in the
//! OpenSSL-compatible [`Cipher`] envelope.
//!
//! ## Behaviour
//!
//! - Writes encrypt the whole text with a fresh salt
//! - Reads decrypt; an empty inner store reads as empty text
//! - The cipher turns a wrong passphrase or a corrupted envelope into empty
//!   text; a non-empty envelope that decrypts to nothing is reported here as
//!   [`StorageError::Encryption`] instead of being mistaken for an empty store

use crate::backend::TextStore;
use crate::cipher::Cipher;
use crate::error::{StorageError, StorageResult};

/// A text store that encrypts everything it writes to an inner store.
///
/// # Example
///
/// ```rust
/// use jsonstore_storage::{Cipher, EncryptedTextStore, InMemoryTextStore, TextStore};
///
/// let store = EncryptedTextStore::new(Box::new(InMemoryTextStore::new()), Cipher::new("pw"));
/// store.write_text("{\"a\":1}").unwrap();
/// assert_eq!(store.read_text().unwrap(), "{\"a\":1}");
/// ```
pub struct EncryptedTextStore {
    inner: Box<dyn TextStore>,
    cipher: Cipher,
}

impl EncryptedTextStore {
    /// Creates a new encrypted store wrapping the given inner store.
    #[must_use]
    pub fn new(inner: Box<dyn TextStore>, cipher: Cipher) -> Self {
        Self { inner, cipher }
    }

    /// Reads the raw envelope from the inner store without decrypting it.
    ///
    /// # Errors
    ///
    /// Propagates errors from the inner store.
    pub fn read_envelope(&self) -> StorageResult<String> {
        self.inner.read_text()
    }
}

impl TextStore for EncryptedTextStore {
    fn read_text(&self) -> StorageResult<String> {
        let envelope = self.inner.read_text()?;
        if envelope.trim().is_empty() {
            return Ok(String::new());
        }
        let text = self.cipher.decrypt(&envelope);
        if text.is_empty() {
            return Err(StorageError::Encryption(format!(
                "content of {} did not decrypt; wrong passphrase or not encrypted",
                self.inner.location()
            )));
        }
        Ok(text)
    }

    fn write_text(&self, text: &str) -> StorageResult<()> {
        let envelope = self.cipher.encrypt(text)?;
        self.inner.write_text(&envelope)
    }

    fn location(&self) -> String {
        format!("{} (encrypted)", self.inner.location())
    }
}
