//! Store handle: one JSON file, its snapshot and its commit pipeline.

use crate::collection::Collection;
use crate::config::StoreConfig;
use crate::document::{from_document, to_document, Record};
use crate::error::{CoreError, CoreResult};
use crate::naming::{fold_key, fold_keys};
use crate::patch::{merge, MergeOptions};
use crate::pipeline::{CommitPipeline, CommitTicket, Persistence, Transform};
use crate::tree::{self, find_key, parse_tree, ValueKind};
use jsonstore_storage::{Cipher, EncryptedTextStore, FileTextStore, InMemoryTextStore, TextStore};
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// State shared by a store handle, its clones and its collection views.
pub(crate) struct StoreInner {
    pub(crate) config: StoreConfig,
    pub(crate) key_field: String,
    pub(crate) persistence: Arc<Persistence>,
    pub(crate) pipeline: CommitPipeline,
}

/// The main store handle.
///
/// A store is one JSON object held in a file. Top-level names map either to
/// a collection (an array of documents) or to an item (any other value).
///
/// Reads are served from an in-memory snapshot and never wait for writes.
/// Every mutation is queued on the handle's commit pipeline, applied to the
/// latest stored content and written back before the call returns (or the
/// returned future resolves). Mutations report `Ok(false)` when their
/// precondition did not hold; errors are reserved for serialization, I/O
/// and persist failures.
///
/// # Example
///
/// ```rust,ignore
/// use jsonstore_core::{Store, StoreConfig};
/// use serde_json::json;
///
/// let store = Store::open("data.json", StoreConfig::default())?;
/// let users = store.dynamic_collection("user")?;
/// users.insert_one(json!({ "name": "Teddy" }))?;
///
/// store.insert_item("counter", 1)?;
/// let counter: i64 = store.get_item("counter")?;
///
/// store.close();
/// ```
///
/// `Store` is cheap to clone; clones share the pipeline. The pipeline stops
/// when the last clone (and the last collection view) is dropped, or on
/// [`close`](Self::close).
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    /// Opens (or creates) the store file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened, read or parsed.
    pub fn open(path: impl AsRef<Path>, config: StoreConfig) -> CoreResult<Self> {
        let file = FileTextStore::open(path.as_ref(), config.retry_budget)?;
        Self::open_with_backend(Box::new(file), config)
    }

    /// Opens a store that lives only in memory.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit worker cannot be started.
    pub fn open_in_memory(config: StoreConfig) -> CoreResult<Self> {
        Self::open_with_backend(Box::new(InMemoryTextStore::new()), config)
    }

    /// Opens a store over any text store.
    ///
    /// When the configuration carries a passphrase, the backend is wrapped
    /// so that its content is the encrypted envelope.
    ///
    /// # Errors
    ///
    /// Returns an error if the content cannot be read or parsed.
    pub fn open_with_backend(backend: Box<dyn TextStore>, config: StoreConfig) -> CoreResult<Self> {
        let backend: Box<dyn TextStore> = match &config.passphrase {
            Some(passphrase) => Box::new(EncryptedTextStore::new(backend, Cipher::new(passphrase))),
            None => backend,
        };

        let persistence = Arc::new(Persistence::open(backend, config.writes_minified())?);
        let pipeline = CommitPipeline::start(Arc::clone(&persistence), config.batch_limit)?;
        info!(
            location = %persistence.location(),
            keys = persistence.snapshot().len(),
            "opened store"
        );

        Ok(Self {
            inner: Arc::new(StoreInner {
                key_field: config.resolved_key_field(),
                config,
                persistence,
                pipeline,
            }),
        })
    }

    /// The configuration the store was opened with.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// The identifier field name in effect.
    #[must_use]
    pub fn key_field(&self) -> &str {
        &self.inner.key_field
    }

    /// Where the store content lives.
    #[must_use]
    pub fn location(&self) -> String {
        self.inner.persistence.location()
    }

    /// Whether mutations are queued or executing.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.inner.pipeline.is_busy()
    }

    /// Whether the store still accepts mutations.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.inner.pipeline.is_open()
    }

    /// Re-reads the store content into the snapshot.
    ///
    /// Collection views keep their own cache; call
    /// [`Collection::reload`] or open a new view to see the new content.
    ///
    /// # Errors
    ///
    /// Returns an error if the content cannot be read or parsed.
    pub fn reload(&self) -> CoreResult<()> {
        self.inner.persistence.reload()?;
        Ok(())
    }

    /// Waits for queued mutations, then stops the commit pipeline.
    ///
    /// Later mutations fail with [`CoreError::StoreClosed`]; reads keep
    /// answering from the last snapshot. Calling it again does nothing.
    pub fn close(&self) {
        if self.inner.pipeline.is_open() {
            self.inner.pipeline.shutdown();
            info!(location = %self.location(), "closed store");
        }
    }

    // --- whole store ---

    /// Replaces the whole content of the store with `json`.
    ///
    /// # Errors
    ///
    /// Returns an error if `json` is not a JSON object, or the write fails.
    pub fn update_all(&self, json: &str) -> CoreResult<bool> {
        settle(self.update_all_ticket(json))
    }

    /// Async twin of [`update_all`](Self::update_all).
    pub fn update_all_async(&self, json: &str) -> impl Future<Output = CoreResult<bool>> + Send {
        settle_async(self.update_all_ticket(json))
    }

    /// Top-level names and their kind, in file order.
    #[must_use]
    pub fn keys(&self, filter: Option<ValueKind>) -> Vec<(String, ValueKind)> {
        tree::keys(&self.inner.persistence.snapshot(), filter)
    }

    /// Names of all collections, in file order.
    #[must_use]
    pub fn list_collection_names(&self) -> Vec<String> {
        tree::collection_names(&self.inner.persistence.snapshot())
    }

    // --- collections ---

    /// A typed view on the collection `name`.
    ///
    /// The collection does not need to exist; it is created by the first
    /// insert.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is configured to reload before reads
    /// and the reload fails.
    pub fn collection<T: Record>(&self, name: &str) -> CoreResult<Collection<T>> {
        if self.inner.config.reload_before_read {
            self.inner.persistence.reload()?;
        }
        Ok(Collection::new(Arc::clone(&self.inner), name))
    }

    /// A dynamically-shaped view on the collection `name`.
    ///
    /// # Errors
    ///
    /// See [`collection`](Self::collection).
    pub fn dynamic_collection(&self, name: &str) -> CoreResult<Collection<Value>> {
        self.collection(name)
    }

    // --- items ---

    /// Reads the item `key`.
    ///
    /// For an absent key, a type that can be read from `null` (such as
    /// `Option<_>` or `Value`) yields that; any other type fails with
    /// [`CoreError::KeyNotFound`].
    ///
    /// # Errors
    ///
    /// Returns an error if the key is absent (see above) or the stored value
    /// does not fit `T`.
    pub fn get_item<T: Record>(&self, key: &str) -> CoreResult<T> {
        let snapshot = self.inner.persistence.snapshot();
        match find_key(&snapshot, key).and_then(|k| snapshot.get(&k)) {
            Some(value) => from_document(value),
            None => serde_json::from_value(Value::Null).map_err(|_| CoreError::key_not_found(key)),
        }
    }

    /// Stores a new item. Returns `false` if `key` already exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be serialized or the write
    /// fails.
    pub fn insert_item<T: Record>(&self, key: &str, value: T) -> CoreResult<bool> {
        settle(self.insert_item_ticket(key, &value))
    }

    /// Async twin of [`insert_item`](Self::insert_item).
    pub fn insert_item_async<T: Record>(
        &self,
        key: &str,
        value: T,
    ) -> impl Future<Output = CoreResult<bool>> + Send {
        settle_async(self.insert_item_ticket(key, &value))
    }

    /// Replaces the item `key`. Without such an item, `upsert` stores it;
    /// otherwise the result is `false`.
    ///
    /// # Errors
    ///
    /// See [`insert_item`](Self::insert_item).
    pub fn replace_item<T: Record>(&self, key: &str, value: T, upsert: bool) -> CoreResult<bool> {
        settle(self.replace_item_ticket(key, &value, upsert))
    }

    /// Async twin of [`replace_item`](Self::replace_item).
    pub fn replace_item_async<T: Record>(
        &self,
        key: &str,
        value: T,
        upsert: bool,
    ) -> impl Future<Output = CoreResult<bool>> + Send {
        settle_async(self.replace_item_ticket(key, &value, upsert))
    }

    /// Merges `patch` into the item `key`. An object patch on an object
    /// item is merged field by field; anything else replaces the item.
    /// Returns `false` if there is no such item.
    ///
    /// # Errors
    ///
    /// See [`insert_item`](Self::insert_item).
    pub fn update_item(&self, key: &str, patch: impl Serialize) -> CoreResult<bool> {
        settle(self.update_item_ticket(key, &patch))
    }

    /// Async twin of [`update_item`](Self::update_item).
    pub fn update_item_async(
        &self,
        key: &str,
        patch: impl Serialize,
    ) -> impl Future<Output = CoreResult<bool>> + Send {
        settle_async(self.update_item_ticket(key, &patch))
    }

    /// Removes the top-level value `key`. Returns `false` if it is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn delete_item(&self, key: &str) -> CoreResult<bool> {
        settle(Ok(self.delete_item_ticket(key)))
    }

    /// Async twin of [`delete_item`](Self::delete_item).
    pub fn delete_item_async(&self, key: &str) -> impl Future<Output = CoreResult<bool>> + Send {
        settle_async(Ok(self.delete_item_ticket(key)))
    }

    // --- internals ---

    fn submit(&self, transform: Transform) -> CommitTicket {
        self.inner.pipeline.submit(transform)
    }

    fn update_all_ticket(&self, json: &str) -> CoreResult<CommitTicket> {
        let replacement = parse_tree(json)?;
        Ok(self.submit(Box::new(move |tree| {
            *tree = replacement;
            Ok(true)
        })))
    }

    fn insert_item_ticket<T: Record>(&self, key: &str, value: &T) -> CoreResult<CommitTicket> {
        let lower = self.inner.config.lower_camel_case;
        let value = to_document(value, lower)?;
        let key = fold_key(key, lower);
        Ok(self.submit(Box::new(move |tree| {
            if find_key(tree, &key).is_some() {
                return Ok(false);
            }
            tree.insert(key, value);
            Ok(true)
        })))
    }

    fn replace_item_ticket<T: Record>(
        &self,
        key: &str,
        value: &T,
        upsert: bool,
    ) -> CoreResult<CommitTicket> {
        let lower = self.inner.config.lower_camel_case;
        let value = to_document(value, lower)?;
        let key = fold_key(key, lower);
        Ok(self.submit(Box::new(move |tree| match find_key(tree, &key) {
            Some(existing) => {
                tree.insert(existing, value);
                Ok(true)
            }
            None if upsert => {
                tree.insert(key, value);
                Ok(true)
            }
            None => Ok(false),
        })))
    }

    fn update_item_ticket(&self, key: &str, patch: &impl Serialize) -> CoreResult<CommitTicket> {
        let lower = self.inner.config.lower_camel_case;
        let patch = fold_keys(serde_json::to_value(patch)?, lower);
        let options = MergeOptions::for_shape(true, lower);
        let key = key.to_string();
        Ok(self.submit(Box::new(move |tree| {
            let Some(existing) = find_key(tree, &key) else {
                return Ok(false);
            };
            match tree.get_mut(&existing) {
                Some(value) => {
                    merge(value, &patch, &options);
                    Ok(true)
                }
                None => Ok(false),
            }
        })))
    }

    fn delete_item_ticket(&self, key: &str) -> CommitTicket {
        let key = key.to_string();
        self.submit(Box::new(move |tree| {
            Ok(find_key(tree, &key).is_some_and(|existing| tree.shift_remove(&existing).is_some()))
        }))
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("location", &self.location())
            .field("key_field", &self.inner.key_field)
            .field("is_open", &self.is_open())
            .finish_non_exhaustive()
    }
}

fn settle(ticket: CoreResult<CommitTicket>) -> CoreResult<bool> {
    ticket?.wait()
}

async fn settle_async(ticket: CoreResult<CommitTicket>) -> CoreResult<bool> {
    ticket?.wait_async().await
}
