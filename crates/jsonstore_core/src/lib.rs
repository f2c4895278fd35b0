//! # jsonstore Core
//!
//! Embedded document store backed by a single JSON file.
//!
//! This crate provides:
//! - [`Store`] handles over a file, an in-memory buffer or any
//!   [`TextStore`](jsonstore_storage::TextStore)
//! - Typed and dynamically-shaped [`Collection`] views with predicate-based
//!   CRUD, full-text search and identifier generation
//! - Root-level items
//! - A commit pipeline that serializes all writes of a handle into batched
//!   whole-file rewrites
//! - Optional at-rest encryption compatible with `openssl enc -aes-256-cbc`
//!
//! ## Example
//!
//! ```rust
//! use jsonstore_core::{Store, StoreConfig};
//! use serde_json::json;
//!
//! let store = Store::open_in_memory(StoreConfig::default()).unwrap();
//! let users = store.dynamic_collection("user").unwrap();
//!
//! users.insert_one(json!({ "name": "Phil" })).unwrap();
//! users.insert_one(json!({ "name": "Ann" })).unwrap();
//!
//! assert_eq!(users.count(), 2);
//! assert_eq!(users.next_id(), json!(2));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod collection;
mod config;
mod document;
mod error;
mod identifier;
mod naming;
mod patch;
mod pipeline;
mod store;
mod tree;

pub use collection::Collection;
pub use config::{StoreConfig, DEFAULT_BATCH_LIMIT};
pub use document::{contains_text, from_document, get_field, get_field_mut, to_document, Record};
pub use error::{CoreError, CoreResult};
pub use identifier::{assign_id, is_unset, next_id, next_text_id, IdShape};
pub use naming::{fold_key, fold_keys, same_name};
pub use patch::{merge, retain_declared, MergeOptions};
pub use pipeline::{CommitPipeline, CommitTicket, Persistence, Transform};
pub use store::Store;
pub use tree::{
    collection_names, documents, find_key, keys, kind_of, parse_tree, render_tree, Tree,
    ValueKind,
};
