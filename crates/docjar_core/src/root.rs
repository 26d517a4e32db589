//! Named entry points into the object graph.

use crate::error::{CoreError, CoreResult};
use crate::object::PersistentObject;
use crate::transaction::Coordinator;
use docjar_codec::{Document, Value};
use docjar_store::{CollectionHandle, Condition, Filter, Projection};
use tracing::debug;

const NAME_FIELD: &str = "name";
const REF_FIELD: &str = "ref";

/// A name to object mapping kept in its own collection.
///
/// Each entry is a `{name, ref}` document. Root writes go straight to the
/// store and are not undone by an abort, since a rooted object needs a
/// reference the moment it is rooted.
#[derive(Debug, Clone)]
pub struct Root {
    coordinator: Coordinator,
    handle: CollectionHandle,
}

impl Root {
    /// The root configured on the coordinator.
    pub fn new(coordinator: &Coordinator) -> Self {
        let config = coordinator.config();
        let database = config.effective_root_database().to_string();
        let collection = config.root_collection.clone();
        Self::at(coordinator, &database, &collection)
    }

    /// A root kept in a specific collection.
    pub fn at(coordinator: &Coordinator, database: &str, collection: &str) -> Self {
        Self {
            coordinator: coordinator.clone(),
            handle: coordinator.raw_collection(database, collection),
        }
    }

    fn entry(&self, name: &str) -> CoreResult<Option<Document>> {
        Ok(self
            .handle
            .find_one(&Self::name_filter(name), &Projection::All)?)
    }

    fn name_filter(name: &str) -> Filter {
        Filter::new().eq(NAME_FIELD, name)
    }

    /// Every root name, in store order.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    pub fn keys(&self) -> CoreResult<Vec<String>> {
        let documents = self.handle.find(
            &Filter::new().with(NAME_FIELD, Condition::Exists(true)),
            &Projection::fields([NAME_FIELD]),
        )?;
        Ok(documents
            .iter()
            .filter_map(|d| d.get(NAME_FIELD).and_then(Value::as_text).map(str::to_string))
            .collect())
    }

    /// The object rooted under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if the name is not rooted or the
    /// rooted document is gone.
    pub fn get(&self, name: &str) -> CoreResult<PersistentObject> {
        let entry = self
            .entry(name)?
            .ok_or_else(|| CoreError::not_found(format!("root {name:?}")))?;
        let reference = entry
            .get(REF_FIELD)
            .and_then(Value::as_reference)
            .ok_or_else(|| CoreError::invalid_state(format!("root {name:?} holds no reference")))?;
        self.coordinator.load(reference)
    }

    /// Roots `object` under `name`, replacing any previous entry. A
    /// transient object is inserted first.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert or the write fails.
    pub fn set(&self, name: &str, object: &PersistentObject) -> CoreResult<()> {
        let reference = match object.reference() {
            Some(reference) => reference,
            None => self.coordinator.insert(object)?,
        };
        let mut entry = Document::new();
        entry.insert(NAME_FIELD, name);
        entry.insert(REF_FIELD, reference.clone());
        self.handle.replace(&Self::name_filter(name), entry, true)?;
        debug!(%name, %reference, "rooted object");
        Ok(())
    }

    /// Removes the entry for `name`. The object itself stays stored.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if the name is not rooted.
    pub fn remove(&self, name: &str) -> CoreResult<()> {
        if self.handle.delete(&Self::name_filter(name))? == 0 {
            return Err(CoreError::not_found(format!("root {name:?}")));
        }
        debug!(%name, "unrooted object");
        Ok(())
    }

    /// Returns true if `name` is rooted.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    pub fn contains(&self, name: &str) -> CoreResult<bool> {
        Ok(self.entry(name)?.is_some())
    }

    /// Number of rooted names.
    ///
    /// # Errors
    ///
    /// Returns an error if the count fails.
    pub fn len(&self) -> CoreResult<u64> {
        Ok(self.handle.count(&Filter::new())?)
    }

    /// Returns true if nothing is rooted.
    ///
    /// # Errors
    ///
    /// Returns an error if the count fails.
    pub fn is_empty(&self) -> CoreResult<bool> {
        Ok(self.len()? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoordinatorConfig;
    use crate::object::ClassMapping;
    use docjar_codec::doc;
    use docjar_store::{InMemoryStore, Namespace};
    use std::sync::Arc;

    fn folder(title: &str) -> PersistentObject {
        PersistentObject::new(ClassMapping::new("Folder", "folders"), doc! { "title" => title })
    }

    #[test]
    fn set_get_override_remove() {
        let c = Coordinator::new(Arc::new(InMemoryStore::new()));
        let root = Root::new(&c);
        assert!(root.keys().unwrap().is_empty());

        let foo = folder("foo");
        root.set("foo", &foo).unwrap();
        assert_eq!(root.keys().unwrap(), vec!["foo".to_string()]);
        assert!(root.get("foo").unwrap().same(&foo));

        let foo2 = folder("foo2");
        root.set("foo", &foo2).unwrap();
        assert_eq!(root.len().unwrap(), 1);
        assert!(root.get("foo").unwrap().same(&foo2));

        root.remove("foo").unwrap();
        assert!(root.is_empty().unwrap());
        assert!(!root.contains("foo").unwrap());
        assert!(matches!(root.remove("foo"), Err(CoreError::NotFound { .. })));
        assert!(matches!(root.get("foo"), Err(CoreError::NotFound { .. })));
    }

    #[test]
    fn configured_location() {
        let store = Arc::new(InMemoryStore::new());
        let c = Coordinator::builder(store.clone())
            .config(CoordinatorConfig::new().root_database("meta").root_collection("proot"))
            .build();
        Root::new(&c).set("a", &folder("a")).unwrap();
        assert_eq!(store.document_count(&Namespace::new("meta", "proot")), 1);
    }
}
