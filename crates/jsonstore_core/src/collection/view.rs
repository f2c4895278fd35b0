//! Typed and dynamic collection views.

use super::engine::{self, Conform, Matcher, Scope};
use crate::document::{from_document, get_field, to_document, Record};
use crate::error::{CoreError, CoreResult};
use crate::identifier::{next_id, IdShape};
use crate::naming::{fold_key, fold_keys};
use crate::patch::{retain_declared, MergeOptions};
use crate::pipeline::CommitTicket;
use crate::store::StoreInner;
use crate::tree::{documents, find_key, kind_of, ValueKind};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

/// A view on one named collection of a store.
///
/// `Collection<T>` reads documents as `T`; `Collection<Value>` is the
/// dynamically-shaped view. Filtering uses plain closures:
///
/// ```rust,ignore
/// let users = store.collection::<User>("user")?;
///
/// let adults = users.find(|u| u.age >= 18)?;
/// users.update_one(|u| u.name == "Phil", json!({ "age": 41 }))?;
/// ```
///
/// Reads are served from a cached copy of the collection, materialized on
/// first access and refreshed after each successful mutation made through
/// this view (or a clone of it) and on [`reload`](Self::reload).
/// Mutations always apply to the latest stored state, not to the cache.
pub struct Collection<T: Record> {
    store: Arc<StoreInner>,
    name: String,
    cache: Arc<RwLock<Option<Vec<Value>>>>,
    keyed_fields: Vec<String>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Record> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            name: self.name.clone(),
            cache: Arc::clone(&self.cache),
            keyed_fields: self.keyed_fields.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Record> std::fmt::Debug for Collection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .field("keyed_fields", &self.keyed_fields)
            .finish_non_exhaustive()
    }
}

impl<T: Record> Collection<T> {
    pub(crate) fn new(store: Arc<StoreInner>, name: &str) -> Self {
        let name = fold_key(name, store.config.lower_camel_case);
        Self {
            store,
            name,
            cache: Arc::new(RwLock::new(None)),
            keyed_fields: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// The collection name, with the store's casing applied.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declares fields whose object values are keyed maps rather than
    /// nested records. Updates replace such a map wholesale instead of
    /// merging into it.
    #[must_use]
    pub fn keyed_fields<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keyed_fields.extend(names.into_iter().map(Into::into));
        self
    }

    // --- reads ---

    /// Number of documents.
    #[must_use]
    pub fn count(&self) -> usize {
        self.with_docs(<[Value]>::len)
    }

    /// Every document, in collection order.
    ///
    /// # Errors
    ///
    /// Returns an error if a document does not fit `T`.
    pub fn all(&self) -> CoreResult<Vec<T>> {
        self.with_docs(|docs| docs.iter().map(from_document::<T>).collect())
    }

    /// Documents for which `predicate` holds.
    ///
    /// Dynamic predicates see field names in the store's casing, whatever
    /// casing the file uses.
    ///
    /// # Errors
    ///
    /// Returns an error if a document does not fit `T`.
    pub fn find(&self, predicate: impl Fn(&T) -> bool) -> CoreResult<Vec<T>> {
        let lower = self.store.config.lower_camel_case;
        let mut found = Vec::new();
        for doc in self.with_docs(<[Value]>::to_vec) {
            let candidate = matchable::<T>(&doc, lower)?;
            if predicate(&candidate) {
                found.push(stored_form(&doc, candidate)?);
            }
        }
        Ok(found)
    }

    /// The first document for which `predicate` holds.
    ///
    /// # Errors
    ///
    /// Returns an error if a document does not fit `T`.
    pub fn find_one(&self, predicate: impl Fn(&T) -> bool) -> CoreResult<Option<T>> {
        let lower = self.store.config.lower_camel_case;
        for doc in self.with_docs(<[Value]>::to_vec) {
            let candidate = matchable::<T>(&doc, lower)?;
            if predicate(&candidate) {
                return stored_form(&doc, candidate).map(Some);
            }
        }
        Ok(None)
    }

    /// The first document whose key field equals `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the document does not fit `T`.
    pub fn find_by_id(&self, id: impl Into<Value>) -> CoreResult<Option<T>> {
        let id = id.into();
        let key_field = &self.store.key_field;
        self.with_docs(|docs| {
            docs.iter()
                .find(|doc| get_field(doc, key_field) == Some(&id))
                .map(from_document::<T>)
                .transpose()
        })
    }

    /// Documents holding a value whose text contains `text`, searching
    /// nested records and lists too.
    ///
    /// # Errors
    ///
    /// Returns an error if a document does not fit `T`.
    pub fn find_text(&self, text: &str, case_sensitive: bool) -> CoreResult<Vec<T>> {
        self.with_docs(|docs| {
            engine::find_text(docs, text, case_sensitive)
                .map(from_document::<T>)
                .collect()
        })
    }

    /// The identifier the next inserted document would receive.
    ///
    /// An empty collection reports the numeric floor `0`.
    #[must_use]
    pub fn next_id(&self) -> Value {
        let key_field = &self.store.key_field;
        self.with_docs(|docs| next_id(docs, key_field, IdShape::Numeric))
    }

    /// Re-reads the store and refreshes this view.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn reload(&self) -> CoreResult<()> {
        let tree = self.store.persistence.reload()?;
        *self.cache.write() = Some(documents(&tree, &self.name));
        Ok(())
    }

    // --- mutations ---

    /// Appends a document, assigning an identifier if it has none.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be serialized or the batch
    /// could not be written.
    pub fn insert_one(&self, item: T) -> CoreResult<bool> {
        self.settle(self.insert_ticket(vec![item]))
    }

    /// Async twin of [`insert_one`](Self::insert_one).
    pub fn insert_one_async(&self, item: T) -> impl Future<Output = CoreResult<bool>> + Send + '_ {
        self.settle_async(self.insert_ticket(vec![item]))
    }

    /// Appends several documents in one commit.
    ///
    /// # Errors
    ///
    /// See [`insert_one`](Self::insert_one).
    pub fn insert_many(&self, items: impl IntoIterator<Item = T>) -> CoreResult<bool> {
        self.settle(self.insert_ticket(items.into_iter().collect()))
    }

    /// Async twin of [`insert_many`](Self::insert_many).
    pub fn insert_many_async(
        &self,
        items: impl IntoIterator<Item = T>,
    ) -> impl Future<Output = CoreResult<bool>> + Send + '_ {
        self.settle_async(self.insert_ticket(items.into_iter().collect()))
    }

    /// Replaces the first matching document. Without a match, `upsert`
    /// appends `item` instead; otherwise nothing changes and the result is
    /// `false`.
    ///
    /// # Errors
    ///
    /// Returns an error if a stored document does not fit `T`, or the batch
    /// could not be written.
    pub fn replace_one(
        &self,
        predicate: impl Fn(&T) -> bool + Send + Sync + 'static,
        item: T,
        upsert: bool,
    ) -> CoreResult<bool> {
        self.settle(self.replace_ticket(self.matcher(predicate), &item, Scope::First, upsert))
    }

    /// Async twin of [`replace_one`](Self::replace_one).
    pub fn replace_one_async(
        &self,
        predicate: impl Fn(&T) -> bool + Send + Sync + 'static,
        item: T,
        upsert: bool,
    ) -> impl Future<Output = CoreResult<bool>> + Send + '_ {
        self.settle_async(self.replace_ticket(self.matcher(predicate), &item, Scope::First, upsert))
    }

    /// Replaces every matching document with `item`.
    ///
    /// # Errors
    ///
    /// See [`replace_one`](Self::replace_one).
    pub fn replace_many(
        &self,
        predicate: impl Fn(&T) -> bool + Send + Sync + 'static,
        item: T,
        upsert: bool,
    ) -> CoreResult<bool> {
        self.settle(self.replace_ticket(self.matcher(predicate), &item, Scope::All, upsert))
    }

    /// Async twin of [`replace_many`](Self::replace_many).
    pub fn replace_many_async(
        &self,
        predicate: impl Fn(&T) -> bool + Send + Sync + 'static,
        item: T,
        upsert: bool,
    ) -> impl Future<Output = CoreResult<bool>> + Send + '_ {
        self.settle_async(self.replace_ticket(self.matcher(predicate), &item, Scope::All, upsert))
    }

    /// Replaces the document whose key field equals `id`.
    ///
    /// # Errors
    ///
    /// See [`replace_one`](Self::replace_one).
    pub fn replace_by_id(&self, id: impl Into<Value>, item: T) -> CoreResult<bool> {
        let matcher = self.id_matcher(id.into());
        self.settle(self.replace_ticket(matcher, &item, Scope::First, false))
    }

    /// Async twin of [`replace_by_id`](Self::replace_by_id).
    pub fn replace_by_id_async(
        &self,
        id: impl Into<Value>,
        item: T,
    ) -> impl Future<Output = CoreResult<bool>> + Send + '_ {
        let matcher = self.id_matcher(id.into());
        self.settle_async(self.replace_ticket(matcher, &item, Scope::First, false))
    }

    /// Merges `patch` into the first matching document.
    ///
    /// `patch` is any serializable value holding the fields to change, most
    /// often a `json!` object.
    ///
    /// # Errors
    ///
    /// Returns an error if the patch cannot be serialized, a stored
    /// document does not fit `T`, or the batch could not be written.
    pub fn update_one(
        &self,
        predicate: impl Fn(&T) -> bool + Send + Sync + 'static,
        patch: impl Serialize,
    ) -> CoreResult<bool> {
        self.settle(self.update_ticket(self.matcher(predicate), &patch, Scope::First))
    }

    /// Async twin of [`update_one`](Self::update_one).
    pub fn update_one_async(
        &self,
        predicate: impl Fn(&T) -> bool + Send + Sync + 'static,
        patch: impl Serialize,
    ) -> impl Future<Output = CoreResult<bool>> + Send + '_ {
        self.settle_async(self.update_ticket(self.matcher(predicate), &patch, Scope::First))
    }

    /// Merges `patch` into every matching document.
    ///
    /// # Errors
    ///
    /// See [`update_one`](Self::update_one).
    pub fn update_many(
        &self,
        predicate: impl Fn(&T) -> bool + Send + Sync + 'static,
        patch: impl Serialize,
    ) -> CoreResult<bool> {
        self.settle(self.update_ticket(self.matcher(predicate), &patch, Scope::All))
    }

    /// Async twin of [`update_many`](Self::update_many).
    pub fn update_many_async(
        &self,
        predicate: impl Fn(&T) -> bool + Send + Sync + 'static,
        patch: impl Serialize,
    ) -> impl Future<Output = CoreResult<bool>> + Send + '_ {
        self.settle_async(self.update_ticket(self.matcher(predicate), &patch, Scope::All))
    }

    /// Merges `patch` into the document whose key field equals `id`.
    ///
    /// # Errors
    ///
    /// See [`update_one`](Self::update_one).
    pub fn update_by_id(&self, id: impl Into<Value>, patch: impl Serialize) -> CoreResult<bool> {
        let matcher = self.id_matcher(id.into());
        self.settle(self.update_ticket(matcher, &patch, Scope::First))
    }

    /// Async twin of [`update_by_id`](Self::update_by_id).
    pub fn update_by_id_async(
        &self,
        id: impl Into<Value>,
        patch: impl Serialize,
    ) -> impl Future<Output = CoreResult<bool>> + Send + '_ {
        let matcher = self.id_matcher(id.into());
        self.settle_async(self.update_ticket(matcher, &patch, Scope::First))
    }

    /// Removes the first matching document.
    ///
    /// # Errors
    ///
    /// Returns an error if a stored document does not fit `T`, or the batch
    /// could not be written.
    pub fn delete_one(&self, predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> CoreResult<bool> {
        self.settle(Ok(self.delete_ticket(self.matcher(predicate), Scope::First)))
    }

    /// Async twin of [`delete_one`](Self::delete_one).
    pub fn delete_one_async(
        &self,
        predicate: impl Fn(&T) -> bool + Send + Sync + 'static,
    ) -> impl Future<Output = CoreResult<bool>> + Send + '_ {
        self.settle_async(Ok(self.delete_ticket(self.matcher(predicate), Scope::First)))
    }

    /// Removes every matching document.
    ///
    /// # Errors
    ///
    /// See [`delete_one`](Self::delete_one).
    pub fn delete_many(&self, predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> CoreResult<bool> {
        self.settle(Ok(self.delete_ticket(self.matcher(predicate), Scope::All)))
    }

    /// Async twin of [`delete_many`](Self::delete_many).
    pub fn delete_many_async(
        &self,
        predicate: impl Fn(&T) -> bool + Send + Sync + 'static,
    ) -> impl Future<Output = CoreResult<bool>> + Send + '_ {
        self.settle_async(Ok(self.delete_ticket(self.matcher(predicate), Scope::All)))
    }

    /// Removes the document whose key field equals `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch could not be written.
    pub fn delete_by_id(&self, id: impl Into<Value>) -> CoreResult<bool> {
        let matcher = self.id_matcher(id.into());
        self.settle(Ok(self.delete_ticket(matcher, Scope::First)))
    }

    /// Async twin of [`delete_by_id`](Self::delete_by_id).
    pub fn delete_by_id_async(
        &self,
        id: impl Into<Value>,
    ) -> impl Future<Output = CoreResult<bool>> + Send + '_ {
        let matcher = self.id_matcher(id.into());
        self.settle_async(Ok(self.delete_ticket(matcher, Scope::First)))
    }

    // --- internals ---

    /// Wraps a record predicate so it runs on stored documents.
    fn matcher(&self, predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Matcher {
        let lower = self.store.config.lower_camel_case;
        Box::new(move |doc| Ok(predicate(&matchable::<T>(doc, lower)?)))
    }

    fn with_docs<R>(&self, f: impl FnOnce(&[Value]) -> R) -> R {
        if let Some(docs) = self.cache.read().as_ref() {
            return f(docs);
        }
        let mut cache = self.cache.write();
        let docs = cache
            .get_or_insert_with(|| documents(&self.store.persistence.snapshot(), &self.name));
        f(docs)
    }

    fn id_matcher(&self, id: Value) -> Matcher {
        let key_field = self.store.key_field.clone();
        Box::new(move |doc| Ok(get_field(doc, &key_field) == Some(&id)))
    }

    fn insert_ticket(&self, items: Vec<T>) -> CoreResult<CommitTicket> {
        let lower = self.store.config.lower_camel_case;
        let new_docs = items
            .iter()
            .map(|item| to_document(item, lower))
            .collect::<CoreResult<Vec<_>>>()?;
        let key_field = self.store.key_field.clone();
        Ok(self.submit(move |docs| Ok(engine::insert(docs, new_docs, &key_field))))
    }

    fn replace_ticket(
        &self,
        matcher: Matcher,
        item: &T,
        scope: Scope,
        upsert: bool,
    ) -> CoreResult<CommitTicket> {
        let replacement = to_document(item, self.store.config.lower_camel_case)?;
        let key_field = self.store.key_field.clone();
        Ok(self.submit(move |docs| {
            engine::replace(docs, &matcher, replacement, scope, upsert, &key_field)
        }))
    }

    fn update_ticket(
        &self,
        matcher: Matcher,
        patch: &impl Serialize,
        scope: Scope,
    ) -> CoreResult<CommitTicket> {
        let lower = self.store.config.lower_camel_case;
        let patch = fold_keys(serde_json::to_value(patch)?, lower);
        let options = MergeOptions {
            keyed_fields: self.keyed_fields.clone(),
            ..MergeOptions::for_shape(true, lower)
        };
        let conform = (!T::is_dynamic()).then(|| declared_shape::<T>(lower));
        Ok(self.submit(move |docs| {
            engine::update(docs, &matcher, &patch, scope, &options, conform.as_ref())
        }))
    }

    fn delete_ticket(&self, matcher: Matcher, scope: Scope) -> CommitTicket {
        self.submit(move |docs| engine::delete(docs, &matcher, scope))
    }

    /// Queues a change to this collection's documents.
    ///
    /// The change runs on a copy of the documents read from the latest
    /// stored tree; the copy is written back only if the change applied. An
    /// absent collection starts out empty and is created by the first change
    /// that applies.
    fn submit<F>(&self, change: F) -> CommitTicket
    where
        F: FnOnce(&mut Vec<Value>) -> CoreResult<bool> + Send + 'static,
    {
        let name = self.name.clone();
        self.store.pipeline.submit(Box::new(move |tree| {
            let slot = find_key(tree, &name);
            let mut docs = match slot.as_ref().and_then(|key| tree.get(key)) {
                None => Vec::new(),
                Some(value) if kind_of(value) == ValueKind::Collection => {
                    value.as_array().cloned().unwrap_or_default()
                }
                Some(_) => {
                    return Err(CoreError::invalid_operation(format!(
                        "`{name}` holds an item, not a collection"
                    )))
                }
            };
            if !change(&mut docs)? {
                return Ok(false);
            }
            tree.insert(slot.unwrap_or(name), Value::Array(docs));
            Ok(true)
        }))
    }

    fn settle(&self, ticket: CoreResult<CommitTicket>) -> CoreResult<bool> {
        let outcome = ticket?.wait();
        self.refresh_after(outcome)
    }

    async fn settle_async(&self, ticket: CoreResult<CommitTicket>) -> CoreResult<bool> {
        let outcome = ticket?.wait_async().await;
        self.refresh_after(outcome)
    }

    fn refresh_after(&self, outcome: CoreResult<bool>) -> CoreResult<bool> {
        if matches!(outcome, Ok(true)) {
            let tree = self.store.persistence.snapshot();
            *self.cache.write() = Some(documents(&tree, &self.name));
        }
        outcome
    }
}

/// The form a predicate sees: the record itself for typed views, the
/// document with field names folded to the store's casing for dynamic ones.
fn matchable<T: Record>(doc: &Value, lower_camel_case: bool) -> CoreResult<T> {
    if T::is_dynamic() {
        from_document::<T>(&fold_keys(doc.clone(), lower_camel_case))
    } else {
        from_document::<T>(doc)
    }
}

/// What a read returns for a matched document: dynamic views hand back the
/// stored spelling rather than the folded copy the predicate saw.
fn stored_form<T: Record>(doc: &Value, candidate: T) -> CoreResult<T> {
    if T::is_dynamic() {
        from_document::<T>(doc)
    } else {
        Ok(candidate)
    }
}

/// Keeps a typed update within what `T` declares. A merged document that
/// no longer fits `T` fails the update, so nothing is written.
fn declared_shape<T: Record>(lower_camel_case: bool) -> Conform {
    Box::new(move |stored: &Value, mut merged: Value| {
        let declared = to_document(&from_document::<T>(&merged)?, lower_camel_case)?;
        retain_declared(&mut merged, stored, &declared);
        Ok(merged)
    })
}
