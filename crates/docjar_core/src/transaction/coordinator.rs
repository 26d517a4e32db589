//! The transactional object-document coordinator.

use crate::collection::FlushingCollection;
use crate::config::CoordinatorConfig;
use crate::error::{CoreError, CoreResult};
use crate::mapping::{DocumentMapper, StateReader, StateWriter};
use crate::object::PersistentObject;
use crate::transaction::state::TransactionState;
use crate::transaction::TransactionParticipant;
use crate::types::{Serial, SortKey, TransactionId};
use docjar_codec::{Document, DocumentRef};
use docjar_store::{CollectionHandle, DocumentStore, Filter, Namespace, Projection};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, trace, warn};

/// Name reported in every coordinator's sort key.
pub const SORT_KEY_NAME: &str = "DocumentCoordinator";

/// Called the first time a coordinator is used in a transaction.
pub type JoinHook = Arc<dyn Fn(&Coordinator) + Send + Sync>;

struct CoordinatorInner {
    store: Arc<dyn DocumentStore>,
    config: CoordinatorConfig,
    detect_conflicts: AtomicBool,
    writer: Arc<dyn StateWriter>,
    reader: Arc<dyn StateReader>,
    on_join: Option<JoinHook>,
    state: Mutex<TransactionState>,
}

/// Keeps in-memory objects and a document store consistent across a
/// transaction.
///
/// The coordinator provides:
/// - An identity map: at most one live object per reference
/// - A queue of changed objects, written on flush in registration order
/// - Optimistic conflict detection through per-document serials
/// - Compensating abort: documents touched in the transaction are put
///   back the way they were, and documents it created are deleted
///
/// The store only guarantees atomic single-document writes, so abort is
/// only exact if no other transaction touched the same documents in the
/// meantime.
///
/// A coordinator serves one transaction at a time. It is a cheap handle;
/// clones share the same state.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<CoordinatorInner>,
}

/// A non-owning handle to a [`Coordinator`], held by bound objects.
#[derive(Clone)]
pub struct WeakCoordinator(Weak<CoordinatorInner>);

impl WeakCoordinator {
    /// The coordinator, if it is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<Coordinator> {
        self.0.upgrade().map(|inner| Coordinator { inner })
    }
}

impl fmt::Debug for WeakCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WeakCoordinator")
    }
}

/// Builds a [`Coordinator`].
pub struct CoordinatorBuilder {
    store: Arc<dyn DocumentStore>,
    config: CoordinatorConfig,
    writer: Option<Arc<dyn StateWriter>>,
    reader: Option<Arc<dyn StateReader>>,
    on_join: Option<JoinHook>,
}

impl CoordinatorBuilder {
    /// Sets the configuration.
    #[must_use]
    pub fn config(mut self, config: CoordinatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Uses one mapper as both writer and reader.
    #[must_use]
    pub fn mapper(mut self, mapper: Arc<DocumentMapper>) -> Self {
        self.writer = Some(Arc::clone(&mapper) as Arc<dyn StateWriter>);
        self.reader = Some(mapper);
        self
    }

    /// Sets the state writer.
    #[must_use]
    pub fn writer(mut self, writer: Arc<dyn StateWriter>) -> Self {
        self.writer = Some(writer);
        self
    }

    /// Sets the state reader.
    #[must_use]
    pub fn reader(mut self, reader: Arc<dyn StateReader>) -> Self {
        self.reader = Some(reader);
        self
    }

    /// Sets a hook run whenever the coordinator joins a transaction.
    #[must_use]
    pub fn on_join(mut self, hook: impl Fn(&Coordinator) + Send + Sync + 'static) -> Self {
        self.on_join = Some(Arc::new(hook));
        self
    }

    /// Builds the coordinator. A missing writer or reader defaults to a
    /// [`DocumentMapper`] using the configured serial field.
    #[must_use]
    pub fn build(self) -> Coordinator {
        let mapper = Arc::new(DocumentMapper::new(self.config.serial_field.clone()));
        let writer = self
            .writer
            .unwrap_or_else(|| Arc::clone(&mapper) as Arc<dyn StateWriter>);
        let reader = self.reader.unwrap_or(mapper);
        Coordinator {
            inner: Arc::new(CoordinatorInner {
                store: self.store,
                detect_conflicts: AtomicBool::new(self.config.detect_conflicts),
                config: self.config,
                writer,
                reader,
                on_join: self.on_join,
                state: Mutex::new(TransactionState::new()),
            }),
        }
    }
}

impl Coordinator {
    /// Creates a coordinator with the default configuration.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::builder(store).build()
    }

    /// Starts building a coordinator.
    pub fn builder(store: Arc<dyn DocumentStore>) -> CoordinatorBuilder {
        CoordinatorBuilder {
            store,
            config: CoordinatorConfig::default(),
            writer: None,
            reader: None,
            on_join: None,
        }
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &CoordinatorConfig {
        &self.inner.config
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.inner.store
    }

    /// The state writer.
    #[must_use]
    pub fn writer(&self) -> &Arc<dyn StateWriter> {
        &self.inner.writer
    }

    /// Returns true if conflicts are currently detected.
    #[must_use]
    pub fn detect_conflicts(&self) -> bool {
        self.inner.detect_conflicts.load(Ordering::SeqCst)
    }

    /// Turns conflict detection on or off.
    pub fn set_detect_conflicts(&self, value: bool) {
        self.inner.detect_conflicts.store(value, Ordering::SeqCst);
    }

    /// A non-owning handle.
    #[must_use]
    pub fn downgrade(&self) -> WeakCoordinator {
        WeakCoordinator(Arc::downgrade(&self.inner))
    }

    /// Returns true if both handles refer to the same coordinator.
    #[must_use]
    pub fn same(&self, other: &Coordinator) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// A collection whose reads flush pending writes first.
    #[must_use]
    pub fn get_collection(&self, database: &str, collection: &str) -> FlushingCollection {
        FlushingCollection::new(self.clone(), self.raw_collection(database, collection))
    }

    /// A collection handle that bypasses flushing.
    #[must_use]
    pub fn raw_collection(&self, database: &str, collection: &str) -> CollectionHandle {
        CollectionHandle::new(
            Arc::clone(&self.inner.store),
            Namespace::new(database, collection),
        )
    }

    /// The flushing collection an object is (or will be) stored in.
    #[must_use]
    pub fn collection_for(&self, object: &PersistentObject) -> FlushingCollection {
        let namespace = self.namespace_for(object);
        self.get_collection(namespace.database(), namespace.collection())
    }

    fn namespace_for(&self, object: &PersistentObject) -> Namespace {
        let class = object.class();
        Namespace::new(
            class.database().unwrap_or(&self.inner.config.default_database),
            class.collection(),
        )
    }

    fn handle_for(&self, reference: &DocumentRef) -> CollectionHandle {
        self.raw_collection(reference.database(), reference.collection())
    }

    fn serial_of(&self, document: &Document) -> Serial {
        Serial::from_value(document.get(&self.inner.config.serial_field))
    }

    /// Marks the state joined and runs the join hook the first time.
    fn join(&self, state: &mut TransactionState) -> bool {
        let joined = state.join();
        if joined {
            debug!("coordinator joined transaction");
        }
        joined
    }

    fn after_join(&self, joined: bool) {
        if joined {
            if let Some(hook) = &self.inner.on_join {
                hook(self);
            }
        }
    }

    /// Queues a changed object for the next flush.
    ///
    /// A sub-object queues the object that stores it. Registering an
    /// object twice is a no-op. The object is bound to this coordinator.
    pub fn register(&self, object: &PersistentObject) {
        let target = object.storage_root();
        if target.coordinator().map_or(true, |c| !c.same(self)) {
            target.bind(self);
        }
        let joined = {
            let mut state = self.inner.state.lock();
            let joined = self.join(&mut state);
            let deleted = target
                .reference()
                .is_some_and(|reference| state.is_deleted(&reference));
            // A deleted document must not be written back by flush.
            if !deleted && state.register(&target) {
                trace!(object = ?target, "registered object");
            }
            joined
        };
        self.after_join(joined);
    }

    /// Stores a transient object right away and returns its reference.
    ///
    /// # Errors
    ///
    /// Returns an error if the object already has a reference, is a
    /// sub-object, or cannot be written.
    pub fn insert(&self, object: &PersistentObject) -> CoreResult<DocumentRef> {
        if let Some(reference) = object.reference() {
            return Err(CoreError::AlreadyStored { reference });
        }
        if object.owner().is_some() {
            return Err(CoreError::invalid_operation(
                "sub-objects are stored inside their owner",
            ));
        }

        let namespace = self.namespace_for(object);
        let mut document = self.inner.writer.get_state(object)?;
        document.insert(self.inner.config.serial_field.clone(), Serial::INITIAL.to_value());
        let id = self.inner.store.insert(&namespace, document)?;

        let reference = DocumentRef::new(namespace.database(), namespace.collection(), id);
        object.stored_as(reference.clone(), Serial::INITIAL);
        object.bind(self);

        let joined = {
            let mut state = self.inner.state.lock();
            let joined = self.join(&mut state);
            state.cache(reference.clone(), object);
            state.record_inserted(object);
            state.unregister(object);
            joined
        };
        self.after_join(joined);
        debug!(%reference, type_name = object.type_name(), "inserted object");
        Ok(reference)
    }

    /// Deletes a stored object's document right away.
    ///
    /// An object inserted in this transaction is simply forgotten;
    /// otherwise its pre-transaction document is kept for abort.
    ///
    /// # Errors
    ///
    /// Returns an error if the object is transient or the delete fails.
    pub fn remove(&self, object: &PersistentObject) -> CoreResult<()> {
        let reference = object
            .reference()
            .ok_or_else(|| CoreError::not_stored(object.type_name()))?;
        let handle = self.handle_for(&reference);

        let (was_inserted, needs_snapshot) = {
            let mut state = self.inner.state.lock();
            let was_inserted = state.take_inserted(object);
            (was_inserted, !was_inserted && !state.has_snapshot(&reference))
        };
        if needs_snapshot {
            let current = handle.get(reference.id())?;
            self.inner.state.lock().capture(reference.clone(), current);
        }

        handle.delete(&Filter::by_id(reference.id()))?;

        let joined = {
            let mut state = self.inner.state.lock();
            let joined = self.join(&mut state);
            state.unregister(object);
            state.record_deleted(reference.clone());
            if !was_inserted {
                state.record_removed(object);
            }
            joined
        };
        self.after_join(joined);
        debug!(%reference, was_inserted, "removed object");
        Ok(())
    }

    /// The live object for a reference, read through a flushing
    /// collection when it is not cached yet.
    ///
    /// # Errors
    ///
    /// Returns an error if no document exists for the reference, or if
    /// the flush or read fails.
    pub fn load(&self, reference: &DocumentRef) -> CoreResult<PersistentObject> {
        if let Some(object) = self.cached(reference) {
            return Ok(object);
        }
        let document = self
            .get_collection(reference.database(), reference.collection())
            .find_one(&Filter::by_id(reference.id()), &Projection::All)?
            .ok_or_else(|| CoreError::not_found(reference.to_string()))?;
        self.load_document(reference, &document)
    }

    /// The live object for a document that was already read.
    ///
    /// A cached instance wins over the document.
    ///
    /// # Errors
    ///
    /// Returns an error if the reader rejects the document.
    pub fn load_document(
        &self,
        reference: &DocumentRef,
        document: &Document,
    ) -> CoreResult<PersistentObject> {
        if let Some(object) = self.cached(reference) {
            return Ok(object);
        }
        let object = self.inner.reader.new_ghost(reference)?;
        self.inner.reader.set_state(&object, document)?;
        object.synced(self.serial_of(document));
        object.bind(self);
        Ok(self.inner.state.lock().cache(reference.clone(), &object))
    }

    /// The live object for a reference without reading it: a ghost whose
    /// state loads on first access.
    ///
    /// # Errors
    ///
    /// Returns an error if the reader cannot make a ghost.
    pub fn ghost(&self, reference: &DocumentRef) -> CoreResult<PersistentObject> {
        if let Some(object) = self.cached(reference) {
            return Ok(object);
        }
        let object = self.inner.reader.new_ghost(reference)?;
        object.bind(self);
        Ok(self.inner.state.lock().cache(reference.clone(), &object))
    }

    /// Loads an object's state from its stored document.
    ///
    /// # Errors
    ///
    /// Returns an error if the object is transient, its document is gone,
    /// or the read fails.
    pub fn setstate(&self, object: &PersistentObject) -> CoreResult<()> {
        let reference = object
            .reference()
            .ok_or_else(|| CoreError::not_stored(object.type_name()))?;
        let document = self
            .handle_for(&reference)
            .get(reference.id())?
            .ok_or_else(|| CoreError::not_found(reference.to_string()))?;
        self.inner.reader.set_state(object, &document)?;
        object.synced(self.serial_of(&document));

        let joined = {
            let mut state = self.inner.state.lock();
            state.cache(reference.clone(), object);
            self.join(&mut state)
        };
        self.after_join(joined);
        trace!(%reference, "loaded object state");
        Ok(())
    }

    /// Historical states are not kept; always fails.
    ///
    /// # Errors
    ///
    /// Always returns [`CoreError::UnsupportedHistory`].
    pub fn oldstate(&self, object: &PersistentObject, _tid: TransactionId) -> CoreResult<Document> {
        match object.reference() {
            Some(reference) => Err(CoreError::UnsupportedHistory { reference }),
            None => Err(CoreError::not_stored(object.type_name())),
        }
    }

    /// Writes every registered object, in registration order.
    ///
    /// Objects written before a failure stay written.
    ///
    /// # Errors
    ///
    /// Returns a conflict error if detection is on and a document changed
    /// underneath, or any store error.
    pub fn flush(&self) -> CoreResult<()> {
        let mut written = 0usize;
        loop {
            let next = self.inner.state.lock().next_registered();
            let Some(object) = next else { break };
            let root = object.storage_root();
            if !root.same(&object) {
                // Attached after it was queued: its owner writes it.
                self.inner.state.lock().unregister(&object);
                self.register(&root);
                continue;
            }
            self.write(&object)?;
            written += 1;
        }
        if written > 0 {
            debug!(written, "flushed registered objects");
        }
        Ok(())
    }

    /// Writes one object now and returns its reference. A transient
    /// object is inserted.
    ///
    /// # Errors
    ///
    /// Same as [`Coordinator::flush`] for a single object.
    pub fn dump(&self, object: &PersistentObject) -> CoreResult<DocumentRef> {
        self.write(object)
    }

    fn write(&self, object: &PersistentObject) -> CoreResult<DocumentRef> {
        let Some(reference) = object.reference() else {
            return self.insert(object);
        };
        let handle = self.handle_for(&reference);
        let detect = self.detect_conflicts();

        let needs_snapshot = {
            let state = self.inner.state.lock();
            !state.has_snapshot(&reference) && !state.is_inserted(object)
        };
        if needs_snapshot || detect {
            let current = handle.get(reference.id())?;
            if detect {
                self.check_serial(object, &reference, current.as_ref())?;
            }
            if needs_snapshot {
                self.inner.state.lock().capture(reference.clone(), current);
            }
        }

        let mut document = self.inner.writer.get_state(object)?;
        let serial = object.serial().next();
        document.insert(self.inner.config.serial_field.clone(), serial.to_value());
        handle.replace(&Filter::by_id(reference.id()), document, true)?;
        object.synced(serial);

        self.inner.state.lock().unregister(object);
        trace!(%reference, %serial, "wrote object");
        Ok(reference)
    }

    fn check_serial(
        &self,
        object: &PersistentObject,
        reference: &DocumentRef,
        stored: Option<&Document>,
    ) -> CoreResult<()> {
        // A missing document is about to be created, not overwritten.
        let Some(stored) = stored else {
            return Ok(());
        };
        let current = self.serial_of(stored);
        let start = object.serial();
        if current != start {
            warn!(%reference, %start, %current, "conflicting write detected");
            return Err(CoreError::conflict(
                reference.clone(),
                object.type_name(),
                start,
                current,
            ));
        }
        Ok(())
    }

    /// Drops all transaction bookkeeping, including the identity map.
    pub fn reset(&self) {
        self.inner.state.lock().reset();
    }

    /// The cached instance for a reference.
    #[must_use]
    pub fn cached(&self, reference: &DocumentRef) -> Option<PersistentObject> {
        self.inner.state.lock().cached(reference)
    }

    /// Number of cached instances.
    #[must_use]
    pub fn cached_count(&self) -> usize {
        self.inner.state.lock().cached_count()
    }

    /// Objects waiting for flush, in order.
    #[must_use]
    pub fn registered_objects(&self) -> Vec<PersistentObject> {
        self.inner.state.lock().registered().to_vec()
    }

    /// Objects inserted in this transaction.
    #[must_use]
    pub fn inserted_objects(&self) -> Vec<PersistentObject> {
        self.inner.state.lock().inserted().to_vec()
    }

    /// Stored objects removed in this transaction.
    #[must_use]
    pub fn removed_objects(&self) -> Vec<PersistentObject> {
        self.inner.state.lock().removed().to_vec()
    }

    /// Returns true if the next use joins a new transaction.
    #[must_use]
    pub fn needs_to_join(&self) -> bool {
        self.inner.state.lock().needs_to_join()
    }

    /// Returns true if a pre-transaction snapshot exists for a reference.
    #[must_use]
    pub fn has_snapshot(&self, reference: &DocumentRef) -> bool {
        self.inner.state.lock().has_snapshot(reference)
    }

    fn compensate(&self) -> CoreResult<()> {
        let (snapshots, inserted) = self.inner.state.lock().take_for_abort();
        let mut first_error: Option<CoreError> = None;

        for (reference, snapshot) in &snapshots {
            let handle = self.handle_for(reference);
            let filter = Filter::by_id(reference.id());
            let result = match snapshot {
                Some(document) => handle.replace(&filter, document.clone(), true),
                None => handle.delete(&filter),
            };
            if let Err(err) = result {
                warn!(%reference, error = %err, "failed to restore snapshot");
                first_error.get_or_insert(err.into());
            }
        }

        for object in &inserted {
            let Some(reference) = object.reference() else {
                continue;
            };
            if snapshots.contains_key(&reference) {
                continue;
            }
            if let Err(err) = self.handle_for(&reference).delete(&Filter::by_id(reference.id())) {
                warn!(%reference, error = %err, "failed to delete inserted document");
                first_error.get_or_insert(err.into());
            }
        }

        debug!(
            restored = snapshots.len(),
            inserted = inserted.len(),
            "aborted transaction"
        );
        first_error.map_or(Ok(()), Err)
    }
}

impl TransactionParticipant for Coordinator {
    fn tpc_begin(&self, _tx: TransactionId) -> CoreResult<()> {
        Ok(())
    }

    fn commit(&self, tx: TransactionId) -> CoreResult<()> {
        if !self.detect_conflicts() {
            return Ok(());
        }
        let registered = self.registered_objects();
        for object in &registered {
            let Some(reference) = object.reference() else {
                continue;
            };
            let stored = self.handle_for(&reference).get(reference.id())?;
            self.check_serial(object, &reference, stored.as_ref())?;
        }
        debug!(%tx, checked = registered.len(), "validated registered objects");
        Ok(())
    }

    fn tpc_vote(&self, _tx: TransactionId) -> CoreResult<()> {
        Ok(())
    }

    fn tpc_finish(&self, tx: TransactionId) -> CoreResult<()> {
        self.flush()?;
        self.reset();
        debug!(%tx, "finished transaction");
        Ok(())
    }

    fn abort(&self, _tx: TransactionId) -> CoreResult<()> {
        self.compensate()
    }

    fn tpc_abort(&self, _tx: TransactionId) -> CoreResult<()> {
        self.compensate()
    }

    fn sort_key(&self) -> SortKey {
        SortKey::new(SORT_KEY_NAME, self.inner.config.sort_ordinal)
    }
}

impl fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("config", &self.inner.config)
            .field("detect_conflicts", &self.detect_conflicts())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ClassMapping;
    use docjar_codec::{doc, DocumentId, Value, ID_FIELD};
    use docjar_store::InMemoryStore;

    fn setup() -> (Arc<InMemoryStore>, Coordinator) {
        let store = Arc::new(InMemoryStore::new());
        let coordinator = Coordinator::new(store.clone());
        (store, coordinator)
    }

    fn person(name: &str) -> PersistentObject {
        PersistentObject::new(ClassMapping::new("Person", "people"), doc! { "name" => name })
    }

    fn people() -> Namespace {
        Namespace::new("docjar", "people")
    }

    #[test]
    fn insert_writes_immediately_with_initial_serial() {
        let (store, c) = setup();
        let obj = person("one");
        let reference = c.insert(&obj).unwrap();

        assert_eq!(reference.database(), "docjar");
        assert_eq!(reference.collection(), "people");
        assert_eq!(obj.reference(), Some(reference.clone()));
        assert_eq!(obj.serial(), Serial::INITIAL);
        assert!(!obj.is_changed());

        let docs = store.documents(&people()).unwrap();
        assert_eq!(
            docs,
            vec![doc! { ID_FIELD => reference.id(), "name" => "one", "_serial" => 1i64 }]
        );
        assert!(c.inserted_objects()[0].same(&obj));
        assert!(!c.needs_to_join());
    }

    #[test]
    fn insert_twice_fails() {
        let (_, c) = setup();
        let obj = person("one");
        c.insert(&obj).unwrap();
        assert!(matches!(c.insert(&obj), Err(CoreError::AlreadyStored { .. })));
    }

    #[test]
    fn class_database_overrides_default() {
        let (store, c) = setup();
        let obj = PersistentObject::new(
            ClassMapping::new("Log", "logs").with_database("audit"),
            doc! {},
        );
        let reference = c.insert(&obj).unwrap();
        assert_eq!(reference.database(), "audit");
        assert_eq!(store.document_count(&Namespace::new("audit", "logs")), 1);
    }

    #[test]
    fn load_returns_cached_instance() {
        let (_, c) = setup();
        let obj = person("one");
        let reference = c.insert(&obj).unwrap();
        assert!(c.load(&reference).unwrap().same(&obj));
    }

    #[test]
    fn load_unknown_reference_is_not_found() {
        let (_, c) = setup();
        let reference = DocumentRef::new("docjar", "people", DocumentId::new());
        assert!(matches!(c.load(&reference), Err(CoreError::NotFound { .. })));
    }

    #[test]
    fn load_reads_serial_and_state() {
        let (store, c) = setup();
        let id = store
            .insert(&people(), doc! { "name" => "stored", "_serial" => 4i64 })
            .unwrap();
        let reference = DocumentRef::new("docjar", "people", id);

        let obj = c.load(&reference).unwrap();
        assert_eq!(obj.serial(), Serial::new(4));
        assert_eq!(obj.state().unwrap(), doc! { "name" => "stored" });
        assert!(obj.coordinator().unwrap().same(&c));
    }

    #[test]
    fn mutation_registers_and_flush_bumps_serial() {
        let (store, c) = setup();
        let obj = person("one");
        let reference = c.insert(&obj).unwrap();

        obj.set("name", "two").unwrap();
        assert!(c.registered_objects()[0].same(&obj));

        c.flush().unwrap();
        assert_eq!(obj.serial(), Serial::new(2));
        assert!(!obj.is_changed());
        assert!(c.registered_objects().is_empty());

        let stored = store.documents(&people()).unwrap();
        assert_eq!(stored[0].get("name"), Some(&Value::from("two")));
        assert_eq!(stored[0].get("_serial"), Some(&Value::Integer(2)));
        // inserted objects never get a snapshot
        assert!(!c.has_snapshot(&reference));
    }

    #[test]
    fn flush_of_registered_transient_object_inserts_it() {
        let (store, c) = setup();
        let obj = person("new");
        c.register(&obj);
        c.flush().unwrap();
        assert!(obj.is_stored());
        assert_eq!(obj.serial(), Serial::INITIAL);
        assert_eq!(store.document_count(&people()), 1);
    }

    #[test]
    fn flush_writes_object_attached_after_it_was_queued_through_its_owner() {
        let (store, c) = setup();
        let home = PersistentObject::new(ClassMapping::new("Address", "addresses"), doc! {});
        home.set("city", "Oslo").unwrap();
        c.register(&home);

        let owner = person("owner");
        owner.attach("home", &home).unwrap();
        c.flush().unwrap();

        assert!(owner.is_stored());
        assert!(!home.is_stored());
        assert!(c.registered_objects().is_empty());
        let docs = store.documents(&people()).unwrap();
        assert_eq!(docs[0].get("home"), Some(&Value::from(doc! { "city" => "Oslo" })));
        assert_eq!(store.document_count(&Namespace::new("docjar", "addresses")), 0);

        // later flushing reads are not blocked
        assert!(c.get_collection("docjar", "people").count(&Filter::new()).is_ok());
    }

    #[test]
    fn setstate_activates_ghosts() {
        let (store, c) = setup();
        let id = store
            .insert(&people(), doc! { "name" => "ghosted", "_serial" => 2i64 })
            .unwrap();
        let reference = DocumentRef::new("docjar", "people", id);

        let ghost = c.ghost(&reference).unwrap();
        assert!(ghost.is_ghost());
        assert!(c.needs_to_join());
        assert_eq!(ghost.get("name").unwrap(), Some(Value::from("ghosted")));
        assert!(!ghost.is_ghost());
        assert_eq!(ghost.serial(), Serial::new(2));
        assert!(!c.needs_to_join());
    }

    #[test]
    fn oldstate_is_unsupported() {
        let (_, c) = setup();
        let obj = person("one");
        c.insert(&obj).unwrap();
        assert!(matches!(
            c.oldstate(&obj, TransactionId::new(1)),
            Err(CoreError::UnsupportedHistory { .. })
        ));
    }

    #[test]
    fn remove_transient_fails() {
        let (_, c) = setup();
        assert!(matches!(c.remove(&person("x")), Err(CoreError::NotStored { .. })));
    }

    #[test]
    fn remove_of_stored_object_keeps_snapshot() {
        let (store, c) = setup();
        let id = store.insert(&people(), doc! { "name" => "old", "_serial" => 1i64 }).unwrap();
        let reference = DocumentRef::new("docjar", "people", id);
        let obj = c.load(&reference).unwrap();

        c.remove(&obj).unwrap();
        assert_eq!(store.document_count(&people()), 0);
        assert!(c.has_snapshot(&reference));
        assert!(c.removed_objects()[0].same(&obj));
    }

    #[test]
    fn join_hook_runs_once_per_transaction() {
        use std::sync::atomic::AtomicUsize;

        let joins = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&joins);
        let c = Coordinator::builder(Arc::new(InMemoryStore::new()))
            .on_join(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .build();

        c.register(&person("a"));
        c.register(&person("b"));
        assert_eq!(joins.load(Ordering::SeqCst), 1);

        c.tpc_finish(TransactionId::new(1)).unwrap();
        c.register(&person("c"));
        assert_eq!(joins.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn sort_key_is_constant() {
        let (_, c) = setup();
        assert_eq!(c.sort_key(), SortKey::new(SORT_KEY_NAME, 0));
        assert_eq!(c.sort_key(), c.sort_key());
    }
}
