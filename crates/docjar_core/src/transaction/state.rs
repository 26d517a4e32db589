//! Per-transaction bookkeeping.

use crate::object::PersistentObject;
use docjar_codec::{Document, DocumentRef};
use std::collections::{HashMap, HashSet};

/// Everything a coordinator tracks for the current transaction.
///
/// Queues compare objects by identity, never by state.
#[derive(Debug)]
pub(crate) struct TransactionState {
    /// Whether the next operation must join the ambient transaction.
    needs_to_join: bool,
    /// Live instance per reference.
    identity: HashMap<DocumentRef, PersistentObject>,
    /// Changed objects waiting for flush, in registration order.
    registered: Vec<PersistentObject>,
    /// Objects inserted during this transaction.
    inserted: Vec<PersistentObject>,
    /// Stored objects removed during this transaction.
    removed: Vec<PersistentObject>,
    /// Every reference deleted during this transaction.
    deleted: HashSet<DocumentRef>,
    /// Pre-transaction body of every document touched; `None` if it did
    /// not exist.
    snapshots: HashMap<DocumentRef, Option<Document>>,
}

impl Default for TransactionState {
    fn default() -> Self {
        Self {
            needs_to_join: true,
            identity: HashMap::new(),
            registered: Vec::new(),
            inserted: Vec::new(),
            removed: Vec::new(),
            deleted: HashSet::new(),
            snapshots: HashMap::new(),
        }
    }
}

fn position(queue: &[PersistentObject], object: &PersistentObject) -> Option<usize> {
    queue.iter().position(|o| o.same(object))
}

impl TransactionState {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Joins the transaction, returning true if it was not joined yet.
    pub(crate) fn join(&mut self) -> bool {
        std::mem::replace(&mut self.needs_to_join, false)
    }

    pub(crate) fn needs_to_join(&self) -> bool {
        self.needs_to_join
    }

    /// Queues an object, returning false if it was already queued.
    pub(crate) fn register(&mut self, object: &PersistentObject) -> bool {
        if position(&self.registered, object).is_some() {
            return false;
        }
        self.registered.push(object.clone());
        true
    }

    pub(crate) fn unregister(&mut self, object: &PersistentObject) {
        if let Some(i) = position(&self.registered, object) {
            self.registered.remove(i);
        }
    }

    pub(crate) fn next_registered(&self) -> Option<PersistentObject> {
        self.registered.first().cloned()
    }

    pub(crate) fn registered(&self) -> &[PersistentObject] {
        &self.registered
    }

    pub(crate) fn record_inserted(&mut self, object: &PersistentObject) {
        if position(&self.inserted, object).is_none() {
            self.inserted.push(object.clone());
        }
    }

    pub(crate) fn is_inserted(&self, object: &PersistentObject) -> bool {
        position(&self.inserted, object).is_some()
    }

    /// Forgets an inserted object, returning true if it was inserted.
    pub(crate) fn take_inserted(&mut self, object: &PersistentObject) -> bool {
        match position(&self.inserted, object) {
            Some(i) => {
                self.inserted.remove(i);
                true
            }
            None => false,
        }
    }

    pub(crate) fn inserted(&self) -> &[PersistentObject] {
        &self.inserted
    }

    pub(crate) fn record_removed(&mut self, object: &PersistentObject) {
        if position(&self.removed, object).is_none() {
            self.removed.push(object.clone());
        }
    }

    pub(crate) fn removed(&self) -> &[PersistentObject] {
        &self.removed
    }

    pub(crate) fn record_deleted(&mut self, reference: DocumentRef) {
        self.deleted.insert(reference);
    }

    pub(crate) fn is_deleted(&self, reference: &DocumentRef) -> bool {
        self.deleted.contains(reference)
    }

    pub(crate) fn has_snapshot(&self, reference: &DocumentRef) -> bool {
        self.snapshots.contains_key(reference)
    }

    /// Records the pre-transaction body unless one is already recorded.
    pub(crate) fn capture(&mut self, reference: DocumentRef, document: Option<Document>) {
        self.snapshots.entry(reference).or_insert(document);
    }

    pub(crate) fn cached(&self, reference: &DocumentRef) -> Option<PersistentObject> {
        self.identity.get(reference).cloned()
    }

    /// Caches an instance, returning the one that ends up cached.
    pub(crate) fn cache(
        &mut self,
        reference: DocumentRef,
        object: &PersistentObject,
    ) -> PersistentObject {
        self.identity
            .entry(reference)
            .or_insert_with(|| object.clone())
            .clone()
    }

    pub(crate) fn cached_count(&self) -> usize {
        self.identity.len()
    }

    /// Hands out what abort needs and resets everything.
    pub(crate) fn take_for_abort(
        &mut self,
    ) -> (HashMap<DocumentRef, Option<Document>>, Vec<PersistentObject>) {
        let snapshots = std::mem::take(&mut self.snapshots);
        let inserted = std::mem::take(&mut self.inserted);
        self.reset();
        (snapshots, inserted)
    }

    /// Drops all bookkeeping, including the identity map.
    pub(crate) fn reset(&mut self) {
        *self = Self::new();
    }
}
