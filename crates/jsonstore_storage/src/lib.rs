//! # jsonstore Storage
//!
//! Whole-file text storage and at-rest encryption for jsonstore.
//!
//! This crate provides the lowest-level storage abstraction for jsonstore.
//! Text stores are **opaque string stores** - they read and replace the
//! complete content of one file and do not interpret it.
//!
//! ## Design Principles
//!
//! - Stores hold exactly one text blob (read whole, write whole)
//! - No knowledge of JSON, collections or documents
//! - Must be `Send + Sync` so a background worker can own them
//! - Transient "file in use" conditions are retried inside the store
//!
//! ## Available Stores
//!
//! - [`InMemoryTextStore`] - For testing and ephemeral stores
//! - [`FileTextStore`] - For persistent storage using OS file APIs
//! - [`EncryptedTextStore`] - Wrapper that applies the [`Cipher`] envelope
//!
//! ## Example
//!
//! ```rust
//! use jsonstore_storage::{InMemoryTextStore, TextStore};
//!
//! let store = InMemoryTextStore::new();
//! store.write_text("{\"user\":[]}").unwrap();
//! assert_eq!(store.read_text().unwrap(), "{\"user\":[]}");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod cipher;
mod encrypted;
mod error;
mod file;
mod memory;

pub use backend::TextStore;
pub use cipher::{derive_key_iv, Cipher, IV_SIZE, KEY_SIZE, SALT_MARKER, SALT_SIZE};
pub use encrypted::EncryptedTextStore;
pub use error::{StorageError, StorageResult};
pub use file::{FileTextStore, DEFAULT_RETRY_BUDGET};
pub use memory::InMemoryTextStore;
