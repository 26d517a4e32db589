//! Collection handle that flushes before reading.

use crate::error::CoreResult;
use crate::transaction::Coordinator;
use docjar_codec::{Document, DocumentId};
use docjar_store::{CollectionHandle, Filter, Namespace, Projection};
use std::fmt;

/// A [`CollectionHandle`] bound to a coordinator.
///
/// Every read flushes the coordinator's registered objects first, so a
/// transaction always reads its own pending writes. Writes pass straight
/// through.
#[derive(Clone)]
pub struct FlushingCollection {
    coordinator: Coordinator,
    handle: CollectionHandle,
}

impl FlushingCollection {
    /// Wraps a raw handle.
    pub fn new(coordinator: Coordinator, handle: CollectionHandle) -> Self {
        Self { coordinator, handle }
    }

    /// The bound namespace.
    #[must_use]
    pub fn namespace(&self) -> &Namespace {
        self.handle.namespace()
    }

    /// The wrapped handle, which does not flush.
    #[must_use]
    pub fn raw(&self) -> &CollectionHandle {
        &self.handle
    }

    /// The owning coordinator.
    #[must_use]
    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    /// Flushes, then finds every matching document.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush or the read fails.
    pub fn find(&self, filter: &Filter, projection: &Projection) -> CoreResult<Vec<Document>> {
        self.coordinator.flush()?;
        Ok(self.handle.find(filter, projection)?)
    }

    /// Flushes, then finds the first matching document.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush or the read fails.
    pub fn find_one(
        &self,
        filter: &Filter,
        projection: &Projection,
    ) -> CoreResult<Option<Document>> {
        self.coordinator.flush()?;
        Ok(self.handle.find_one(filter, projection)?)
    }

    /// Flushes, then reads one document by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush or the read fails.
    pub fn get(&self, id: DocumentId) -> CoreResult<Option<Document>> {
        self.coordinator.flush()?;
        Ok(self.handle.get(id)?)
    }

    /// Flushes, then counts matching documents.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush or the read fails.
    pub fn count(&self, filter: &Filter) -> CoreResult<u64> {
        self.coordinator.flush()?;
        Ok(self.handle.count(filter)?)
    }

    /// Inserts without flushing.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn insert(&self, document: Document) -> CoreResult<DocumentId> {
        Ok(self.handle.insert(document)?)
    }

    /// Replaces without flushing.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn replace(&self, filter: &Filter, document: Document, upsert: bool) -> CoreResult<u64> {
        Ok(self.handle.replace(filter, document, upsert)?)
    }

    /// Deletes without flushing.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn delete(&self, filter: &Filter) -> CoreResult<u64> {
        Ok(self.handle.delete(filter)?)
    }
}

impl fmt::Debug for FlushingCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlushingCollection")
            .field("namespace", self.handle.namespace())
            .finish_non_exhaustive()
    }
}
