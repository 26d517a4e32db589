//! In-memory document store.

use crate::backend::DocumentStore;
use crate::error::{StoreError, StoreResult};
use crate::filter::{Filter, Projection};
use crate::namespace::Namespace;
use docjar_codec::{decode_document, encode_document, Document, DocumentId, Value, ID_FIELD};
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::trace;

type Collection = Vec<(DocumentId, Vec<u8>)>;

/// An in-memory document store.
///
/// Each collection keeps its documents as canonical CBOR in insertion
/// order, which is the order `find` returns them in. A replaced document
/// keeps its position.
///
/// This store is suitable for:
/// - Unit tests
/// - Integration tests
/// - Embedding where nothing needs to outlive the process
///
/// # Thread Safety
///
/// This store is thread-safe and can be shared across threads. Every
/// single-document write happens under one write lock.
///
/// # Example
///
/// ```rust
/// use docjar_codec::doc;
/// use docjar_store::{DocumentStore, Filter, InMemoryStore, Namespace, Projection};
///
/// let store = InMemoryStore::new();
/// let ns = Namespace::new("app", "people");
/// let id = store.insert(&ns, doc! { "name" => "one" }).unwrap();
/// let found = store.find_one(&ns, &Filter::by_id(id), &Projection::All).unwrap();
/// assert!(found.is_some());
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    collections: RwLock<HashMap<Namespace, Collection>>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every document of a collection in natural order.
    ///
    /// # Errors
    ///
    /// Returns an error if a stored document cannot be decoded.
    pub fn documents(&self, namespace: &Namespace) -> StoreResult<Vec<Document>> {
        let collections = self.collections.read();
        collections
            .get(namespace)
            .map_or(&[][..], Vec::as_slice)
            .iter()
            .map(|(_, bytes)| decode_document(bytes).map_err(StoreError::from))
            .collect()
    }

    /// Returns the number of documents in a collection.
    #[must_use]
    pub fn document_count(&self, namespace: &Namespace) -> usize {
        self.collections.read().get(namespace).map_or(0, Vec::len)
    }

    /// Returns every namespace holding at least one document, sorted.
    #[must_use]
    pub fn namespaces(&self) -> Vec<Namespace> {
        let mut namespaces: Vec<_> = self
            .collections
            .read()
            .iter()
            .filter(|(_, docs)| !docs.is_empty())
            .map(|(ns, _)| ns.clone())
            .collect();
        namespaces.sort();
        namespaces
    }

    /// Removes every document from every collection.
    pub fn clear(&self) {
        self.collections.write().clear();
    }

    fn decode_matching(
        collection: &Collection,
        filter: &Filter,
    ) -> StoreResult<Vec<(usize, Document)>> {
        let mut matched = Vec::new();
        for (position, (id, bytes)) in collection.iter().enumerate() {
            // Skip decoding when the filter pins another id.
            if filter.id().is_some_and(|wanted| wanted != *id) {
                continue;
            }
            let document = decode_document(bytes)?;
            if filter.matches(&document) {
                matched.push((position, document));
            }
        }
        Ok(matched)
    }
}

fn with_id(mut document: Document, id: DocumentId) -> Document {
    document.insert(ID_FIELD, id);
    document
}

fn document_id(document: &Document) -> StoreResult<Option<DocumentId>> {
    match document.get(ID_FIELD) {
        None => Ok(None),
        Some(Value::Id(id)) => Ok(Some(*id)),
        Some(other) => Err(StoreError::invalid_document(format!(
            "_id must be an id, found {}",
            other.type_name()
        ))),
    }
}

impl DocumentStore for InMemoryStore {
    fn find(
        &self,
        namespace: &Namespace,
        filter: &Filter,
        projection: &Projection,
    ) -> StoreResult<Vec<Document>> {
        let collections = self.collections.read();
        let Some(collection) = collections.get(namespace) else {
            return Ok(Vec::new());
        };
        Ok(Self::decode_matching(collection, filter)?
            .into_iter()
            .map(|(_, document)| projection.apply(document))
            .collect())
    }

    fn insert(&self, namespace: &Namespace, document: Document) -> StoreResult<DocumentId> {
        let id = document_id(&document)?.unwrap_or_else(DocumentId::new);
        let bytes = encode_document(&with_id(document, id))?;

        let mut collections = self.collections.write();
        let collection = collections.entry(namespace.clone()).or_default();
        if collection.iter().any(|(existing, _)| *existing == id) {
            return Err(StoreError::DuplicateId {
                namespace: namespace.to_string(),
                id,
            });
        }
        collection.push((id, bytes));
        trace!(%namespace, %id, "inserted document");
        Ok(id)
    }

    fn replace(
        &self,
        namespace: &Namespace,
        filter: &Filter,
        document: Document,
        upsert: bool,
    ) -> StoreResult<u64> {
        let requested = document_id(&document)?;

        let mut collections = self.collections.write();
        let collection = collections.entry(namespace.clone()).or_default();

        let first = Self::decode_matching(collection, filter)?.into_iter().next();
        if let Some((position, _)) = first {
            let id = collection[position].0;
            if requested.is_some_and(|requested| requested != id) {
                return Err(StoreError::invalid_document("replacement may not change _id"));
            }
            collection[position].1 = encode_document(&with_id(document, id))?;
            trace!(%namespace, %id, "replaced document");
            return Ok(1);
        }

        if !upsert {
            return Ok(0);
        }

        let id = requested
            .or_else(|| filter.id())
            .unwrap_or_else(DocumentId::new);
        if collection.iter().any(|(existing, _)| *existing == id) {
            return Err(StoreError::DuplicateId {
                namespace: namespace.to_string(),
                id,
            });
        }
        collection.push((id, encode_document(&with_id(document, id))?));
        trace!(%namespace, %id, "upserted document");
        Ok(1)
    }

    fn delete(&self, namespace: &Namespace, filter: &Filter) -> StoreResult<u64> {
        let mut collections = self.collections.write();
        let Some(collection) = collections.get_mut(namespace) else {
            return Ok(0);
        };
        let matched: Vec<usize> = Self::decode_matching(collection, filter)?
            .into_iter()
            .map(|(position, _)| position)
            .collect();
        for position in matched.iter().rev() {
            collection.remove(*position);
        }
        trace!(%namespace, count = matched.len(), "deleted documents");
        Ok(matched.len() as u64)
    }
}
