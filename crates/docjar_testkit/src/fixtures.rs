//! Test fixtures and coordinator helpers.
//!
//! Provides convenience functions for setting up coordinators over an
//! in-memory store and for comparing whole store contents.

use docjar_codec::{doc, Document, DocumentId, DocumentRef};
use docjar_core::{ClassMapping, Coordinator, CoordinatorConfig, PersistentObject};
use docjar_store::{DocumentStore, InMemoryStore, Namespace};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Database every fixture uses.
pub const TEST_DATABASE: &str = "docjar";

/// A coordinator over a fresh in-memory store.
pub struct TestCoordinator {
    /// The store, for direct inspection.
    pub store: Arc<InMemoryStore>,
    /// The coordinator under test.
    pub coordinator: Coordinator,
}

impl TestCoordinator {
    /// A coordinator with the default configuration.
    pub fn memory() -> Self {
        Self::with_config(CoordinatorConfig::default())
    }

    /// A coordinator with conflict detection on.
    pub fn detecting() -> Self {
        Self::with_config(CoordinatorConfig::default().detect_conflicts(true))
    }

    /// A coordinator with a custom configuration.
    pub fn with_config(config: CoordinatorConfig) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let coordinator = Coordinator::builder(store.clone()).config(config).build();
        Self { store, coordinator }
    }

    /// A second coordinator over the same store, standing in for a
    /// concurrent transaction.
    pub fn sibling(&self) -> Coordinator {
        Coordinator::builder(self.store.clone())
            .config(self.coordinator.config().clone())
            .build()
    }

    /// Every document in the store, see [`store_contents`].
    pub fn contents(&self) -> StoreContents {
        store_contents(&self.store)
    }

    /// Writes a document straight to the store and returns its reference.
    pub fn seed(&self, collection: &str, document: Document) -> DocumentRef {
        let namespace = Namespace::new(TEST_DATABASE, collection);
        let id = self
            .store
            .insert(&namespace, document)
            .expect("Failed to seed document");
        DocumentRef::new(TEST_DATABASE, collection, id)
    }
}

impl std::ops::Deref for TestCoordinator {
    type Target = Coordinator;

    fn deref(&self) -> &Self::Target {
        &self.coordinator
    }
}

/// Runs a test with a fresh coordinator.
///
/// # Example
///
/// ```rust
/// use docjar_testkit::{person, with_coordinator};
///
/// with_coordinator(|t| {
///     let reference = t.insert(&person("one")).unwrap();
///     assert!(t.cached(&reference).is_some());
/// });
/// ```
pub fn with_coordinator<F, R>(f: F) -> R
where
    F: FnOnce(&TestCoordinator) -> R,
{
    let t = TestCoordinator::memory();
    f(&t)
}

/// Store contents keyed by namespace, each collection sorted by id so that
/// restored documents compare equal regardless of store order.
pub type StoreContents = BTreeMap<String, Vec<(DocumentId, Document)>>;

/// Every non-empty collection of an in-memory store.
pub fn store_contents(store: &InMemoryStore) -> StoreContents {
    store
        .namespaces()
        .into_iter()
        .map(|namespace| {
            let mut documents: Vec<(DocumentId, Document)> = store
                .documents(&namespace)
                .expect("Failed to read documents")
                .into_iter()
                .filter_map(|d| d.id().map(|id| (id, d)))
                .collect();
            documents.sort_by_key(|(id, _)| *id.as_bytes());
            (namespace.to_string(), documents)
        })
        .collect()
}

/// The class used by [`person`].
pub fn person_class() -> ClassMapping {
    ClassMapping::new("Person", "people")
}

/// A transient person named `name`.
pub fn person(name: &str) -> PersistentObject {
    PersistentObject::new(person_class(), doc! { "name" => name })
}

/// A transient address in `city`.
pub fn address(city: &str) -> PersistentObject {
    PersistentObject::new(ClassMapping::new("Address", "addresses"), doc! { "city" => city })
}

/// Parses a coordinator configuration from JSON.
pub fn config_from_json(json: &str) -> CoordinatorConfig {
    serde_json::from_str(json).expect("Invalid configuration JSON")
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;
    use docjar_core::{TransactionId, TransactionParticipant};

    /// A coordinator whose store already holds `count` committed people,
    /// named `person-0`, `person-1`, and so on. Returns their references.
    pub fn committed_people(count: usize) -> (TestCoordinator, Vec<DocumentRef>) {
        let t = TestCoordinator::memory();
        let references = (0..count)
            .map(|i| t.insert(&person(&format!("person-{i}"))).expect("Failed to insert"))
            .collect();
        t.tpc_finish(TransactionId::new(0)).expect("Failed to finish");
        (t, references)
    }
}
