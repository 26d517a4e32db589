//! Store driver trait and collection handles.

use crate::error::StoreResult;
use crate::filter::{Filter, Projection};
use crate::namespace::Namespace;
use docjar_codec::{Document, DocumentId};
use std::fmt;
use std::sync::Arc;

/// A document store driver.
///
/// Drivers store whole documents per collection. They guarantee that a
/// single-document write is atomic and nothing more: there are no
/// multi-document transactions at this layer.
///
/// # Invariants
///
/// - `insert` returns the `_id` the document was stored under
/// - `find` returns documents in the collection's natural order
/// - A write affecting one document is atomic
/// - Drivers must be `Send + Sync` for sharing across coordinators
///
/// # Implementors
///
/// - [`super::InMemoryStore`] - For testing and embedding
pub trait DocumentStore: Send + Sync {
    /// Returns every document matching `filter`, projected.
    ///
    /// # Errors
    ///
    /// Returns an error if the documents cannot be read.
    fn find(
        &self,
        namespace: &Namespace,
        filter: &Filter,
        projection: &Projection,
    ) -> StoreResult<Vec<Document>>;

    /// Returns the first document matching `filter`, projected.
    ///
    /// # Errors
    ///
    /// Returns an error if the documents cannot be read.
    fn find_one(
        &self,
        namespace: &Namespace,
        filter: &Filter,
        projection: &Projection,
    ) -> StoreResult<Option<Document>> {
        Ok(self
            .find(namespace, filter, projection)?
            .into_iter()
            .next())
    }

    /// Counts the documents matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns an error if the documents cannot be read.
    fn count(&self, namespace: &Namespace, filter: &Filter) -> StoreResult<u64> {
        let found = self.find(namespace, filter, &Projection::id_only())?;
        Ok(found.len() as u64)
    }

    /// Inserts a document.
    ///
    /// A fresh `_id` is generated when the document has none.
    ///
    /// # Errors
    ///
    /// Returns an error if a document with the same `_id` exists, or if
    /// the document cannot be written.
    fn insert(&self, namespace: &Namespace, document: Document) -> StoreResult<DocumentId>;

    /// Replaces the first document matching `filter`.
    ///
    /// The replaced document keeps its `_id`. When nothing matches and
    /// `upsert` is set, the document is inserted instead, under the `_id`
    /// pinned by the filter if there is one. Returns the number of
    /// documents written (0 or 1).
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be written.
    fn replace(
        &self,
        namespace: &Namespace,
        filter: &Filter,
        document: Document,
        upsert: bool,
    ) -> StoreResult<u64>;

    /// Deletes every document matching `filter`, returning how many.
    ///
    /// # Errors
    ///
    /// Returns an error if the documents cannot be deleted.
    fn delete(&self, namespace: &Namespace, filter: &Filter) -> StoreResult<u64>;
}

/// A store handle bound to one collection.
///
/// Handles are cheap to clone and may be shared across threads.
#[derive(Clone)]
pub struct CollectionHandle {
    store: Arc<dyn DocumentStore>,
    namespace: Namespace,
}

impl CollectionHandle {
    /// Binds a store to a namespace.
    pub fn new(store: Arc<dyn DocumentStore>, namespace: Namespace) -> Self {
        Self { store, namespace }
    }

    /// The bound namespace.
    #[must_use]
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// The database name.
    #[must_use]
    pub fn database(&self) -> &str {
        self.namespace.database()
    }

    /// The collection name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.namespace.collection()
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// See [`DocumentStore::find`].
    ///
    /// # Errors
    ///
    /// Returns an error if the documents cannot be read.
    pub fn find(&self, filter: &Filter, projection: &Projection) -> StoreResult<Vec<Document>> {
        self.store.find(&self.namespace, filter, projection)
    }

    /// See [`DocumentStore::find_one`].
    ///
    /// # Errors
    ///
    /// Returns an error if the documents cannot be read.
    pub fn find_one(
        &self,
        filter: &Filter,
        projection: &Projection,
    ) -> StoreResult<Option<Document>> {
        self.store.find_one(&self.namespace, filter, projection)
    }

    /// Reads one document by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be read.
    pub fn get(&self, id: DocumentId) -> StoreResult<Option<Document>> {
        self.find_one(&Filter::by_id(id), &Projection::All)
    }

    /// See [`DocumentStore::count`].
    ///
    /// # Errors
    ///
    /// Returns an error if the documents cannot be read.
    pub fn count(&self, filter: &Filter) -> StoreResult<u64> {
        self.store.count(&self.namespace, filter)
    }

    /// See [`DocumentStore::insert`].
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be written.
    pub fn insert(&self, document: Document) -> StoreResult<DocumentId> {
        self.store.insert(&self.namespace, document)
    }

    /// See [`DocumentStore::replace`].
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be written.
    pub fn replace(&self, filter: &Filter, document: Document, upsert: bool) -> StoreResult<u64> {
        self.store.replace(&self.namespace, filter, document, upsert)
    }

    /// See [`DocumentStore::delete`].
    ///
    /// # Errors
    ///
    /// Returns an error if the documents cannot be deleted.
    pub fn delete(&self, filter: &Filter) -> StoreResult<u64> {
        self.store.delete(&self.namespace, filter)
    }
}

impl fmt::Debug for CollectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionHandle")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}
