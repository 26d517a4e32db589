//! Persistent objects.

use crate::error::{CoreError, CoreResult};
use crate::object::contained::{AttributeValue, LazyAttribute, Parent, Resolution};
use crate::transaction::{Coordinator, WeakCoordinator};
use crate::types::Serial;
use docjar_codec::{Document, DocumentRef, Value};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::{Arc, Weak};

/// How a type of object maps onto the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassMapping {
    type_name: String,
    collection: String,
    database: Option<String>,
    name_attribute: Option<String>,
    parent_attribute: Option<String>,
}

impl ClassMapping {
    /// Maps `type_name` onto `collection` in the default database.
    pub fn new(type_name: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            collection: collection.into(),
            database: None,
            name_attribute: None,
            parent_attribute: None,
        }
    }

    /// Stores objects of this type in a specific database.
    #[must_use]
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Resolves an object's name from this field of its state.
    #[must_use]
    pub fn with_name_attribute(mut self, field: impl Into<String>) -> Self {
        self.name_attribute = Some(field.into());
        self
    }

    /// Resolves an object's parent from this field of its state.
    #[must_use]
    pub fn with_parent_attribute(mut self, field: impl Into<String>) -> Self {
        self.parent_attribute = Some(field.into());
        self
    }

    /// The type name, used in conflict reports.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// The collection objects are stored in.
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// The database objects are stored in, if not the default one.
    #[must_use]
    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    fn name_resolution(&self) -> LazyAttribute<String> {
        self.name_attribute
            .as_ref()
            .map_or_else(LazyAttribute::new, LazyAttribute::attribute)
    }

    fn parent_resolution(&self) -> LazyAttribute<Parent> {
        self.parent_attribute
            .as_ref()
            .map_or_else(LazyAttribute::new, LazyAttribute::attribute)
    }
}

struct ObjectMeta {
    reference: Option<DocumentRef>,
    serial: Serial,
    changed: bool,
    ghost: bool,
    coordinator: Option<WeakCoordinator>,
    owner: Option<(Weak<ObjectInner>, String)>,
    sub_objects: Vec<(String, PersistentObject)>,
    name: LazyAttribute<String>,
    parent: LazyAttribute<Parent>,
}

struct ObjectInner {
    class: ClassMapping,
    // Lock order: `meta` may be taken before `state`, never after.
    state: RwLock<Document>,
    meta: Mutex<ObjectMeta>,
}

/// An application object whose state lives in a document.
///
/// A `PersistentObject` is a shared handle: clones refer to the same
/// object, and [`PersistentObject::same`] compares identity. An object
/// is transient until inserted; from then on it carries exactly one
/// [`DocumentRef`], which never changes.
///
/// Mutations flag the object changed and register it with its
/// coordinator. Reading a ghost (an object whose state has not been
/// loaded yet) loads it through the coordinator first.
#[derive(Clone)]
pub struct PersistentObject {
    inner: Arc<ObjectInner>,
}

/// Builds a [`PersistentObject`] with custom name/parent resolution.
pub struct ObjectBuilder {
    class: ClassMapping,
    state: Document,
    name: LazyAttribute<String>,
    parent: LazyAttribute<Parent>,
}

impl ObjectBuilder {
    /// Sets the initial state.
    #[must_use]
    pub fn state(mut self, state: Document) -> Self {
        self.state = state;
        self
    }

    /// Sets how the name is resolved.
    #[must_use]
    pub fn name(mut self, name: LazyAttribute<String>) -> Self {
        self.name = name;
        self
    }

    /// Sets how the parent is resolved.
    #[must_use]
    pub fn parent(mut self, parent: LazyAttribute<Parent>) -> Self {
        self.parent = parent;
        self
    }

    /// Builds a transient object.
    #[must_use]
    pub fn build(self) -> PersistentObject {
        PersistentObject::from_parts(self.class, self.state, None, self.name, self.parent)
    }
}

impl PersistentObject {
    /// Creates a transient object.
    #[must_use]
    pub fn new(class: ClassMapping, state: Document) -> Self {
        Self::builder(class).state(state).build()
    }

    /// Starts building a transient object.
    #[must_use]
    pub fn builder(class: ClassMapping) -> ObjectBuilder {
        ObjectBuilder {
            name: class.name_resolution(),
            parent: class.parent_resolution(),
            class,
            state: Document::new(),
        }
    }

    /// Creates a ghost for a stored document. Its state is loaded on
    /// first access.
    #[must_use]
    pub fn ghost(class: ClassMapping, reference: DocumentRef) -> Self {
        let name = class.name_resolution();
        let parent = class.parent_resolution();
        Self::from_parts(class, Document::new(), Some(reference), name, parent)
    }

    fn from_parts(
        class: ClassMapping,
        state: Document,
        reference: Option<DocumentRef>,
        name: LazyAttribute<String>,
        parent: LazyAttribute<Parent>,
    ) -> Self {
        let ghost = reference.is_some();
        Self {
            inner: Arc::new(ObjectInner {
                class,
                state: RwLock::new(state),
                meta: Mutex::new(ObjectMeta {
                    reference,
                    serial: Serial::ZERO,
                    changed: false,
                    ghost,
                    coordinator: None,
                    owner: None,
                    sub_objects: Vec::new(),
                    name,
                    parent,
                }),
            }),
        }
    }

    /// The class mapping.
    #[must_use]
    pub fn class(&self) -> &ClassMapping {
        &self.inner.class
    }

    /// The type name.
    #[must_use]
    pub fn type_name(&self) -> &str {
        self.inner.class.type_name()
    }

    /// Returns true if both handles refer to the same object.
    #[must_use]
    pub fn same(&self, other: &PersistentObject) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// The document reference, once stored.
    #[must_use]
    pub fn reference(&self) -> Option<DocumentRef> {
        self.inner.meta.lock().reference.clone()
    }

    /// Returns true once the object has a reference.
    #[must_use]
    pub fn is_stored(&self) -> bool {
        self.inner.meta.lock().reference.is_some()
    }

    /// The serial this instance last read or wrote.
    #[must_use]
    pub fn serial(&self) -> Serial {
        self.inner.meta.lock().serial
    }

    /// Returns true if the object has unwritten changes.
    #[must_use]
    pub fn is_changed(&self) -> bool {
        self.inner.meta.lock().changed
    }

    /// Returns true if the state has not been loaded yet.
    #[must_use]
    pub fn is_ghost(&self) -> bool {
        self.inner.meta.lock().ghost
    }

    /// The coordinator this object is bound to, if it is still alive.
    #[must_use]
    pub fn coordinator(&self) -> Option<Coordinator> {
        self.inner
            .meta
            .lock()
            .coordinator
            .as_ref()
            .and_then(WeakCoordinator::upgrade)
    }

    /// Binds the object to a coordinator. Later mutations register with it.
    pub fn bind(&self, coordinator: &Coordinator) {
        self.inner.meta.lock().coordinator = Some(coordinator.downgrade());
    }

    /// Reads a field, loading a ghost first.
    ///
    /// # Errors
    ///
    /// Returns an error if a ghost cannot be loaded.
    pub fn get(&self, field: &str) -> CoreResult<Option<Value>> {
        self.activate()?;
        Ok(self.inner.state.read().get(field).cloned())
    }

    /// A copy of the whole state, loading a ghost first.
    ///
    /// # Errors
    ///
    /// Returns an error if a ghost cannot be loaded.
    pub fn state(&self) -> CoreResult<Document> {
        self.activate()?;
        Ok(self.inner.state.read().clone())
    }

    /// Sets a field and marks the object changed.
    ///
    /// # Errors
    ///
    /// Returns an error if a ghost cannot be loaded.
    pub fn set(&self, field: impl Into<String>, value: impl Into<Value>) -> CoreResult<()> {
        self.activate()?;
        self.inner.state.write().insert(field, value);
        self.mark_changed();
        Ok(())
    }

    /// Removes a field, returning its value. Marks the object changed
    /// only when the field was present.
    ///
    /// # Errors
    ///
    /// Returns an error if a ghost cannot be loaded.
    pub fn unset(&self, field: &str) -> CoreResult<Option<Value>> {
        self.activate()?;
        let removed = self.inner.state.write().remove(field);
        if removed.is_some() {
            self.mark_changed();
        }
        Ok(removed)
    }

    /// Applies an arbitrary change to the state and marks the object changed.
    ///
    /// # Errors
    ///
    /// Returns an error if a ghost cannot be loaded.
    pub fn update<R>(&self, change: impl FnOnce(&mut Document) -> R) -> CoreResult<R> {
        self.activate()?;
        let result = change(&mut self.inner.state.write());
        self.mark_changed();
        Ok(result)
    }

    /// Flags the object changed and registers it with its coordinator.
    ///
    /// A sub-object flags its owner instead.
    pub fn mark_changed(&self) {
        let (owner, coordinator) = {
            let mut meta = self.inner.meta.lock();
            meta.changed = true;
            (
                meta.owner.as_ref().and_then(|(owner, _)| owner.upgrade()),
                meta.coordinator.as_ref().and_then(WeakCoordinator::upgrade),
            )
        };
        if let Some(owner) = owner {
            PersistentObject { inner: owner }.mark_changed();
        } else if let Some(coordinator) = coordinator {
            coordinator.register(self);
        }
    }

    /// Embeds `sub` in this object's document under `field`.
    ///
    /// The sub-object is never stored on its own: its state is written
    /// inline with its owner's, and changing it marks the owner changed.
    ///
    /// # Errors
    ///
    /// Returns an error if `sub` is stored, already owned elsewhere, or
    /// is this object.
    pub fn attach(&self, field: impl Into<String>, sub: &PersistentObject) -> CoreResult<()> {
        if self.same(sub) {
            return Err(CoreError::invalid_operation("an object cannot own itself"));
        }
        if let Some(reference) = sub.reference() {
            return Err(CoreError::AlreadyStored { reference });
        }
        let field = field.into();
        {
            let mut sub_meta = sub.inner.meta.lock();
            if let Some((owner, _)) = &sub_meta.owner {
                if !owner.ptr_eq(&Arc::downgrade(&self.inner)) {
                    return Err(CoreError::invalid_operation(
                        "sub-object already belongs to another object",
                    ));
                }
            }
            sub_meta.owner = Some((Arc::downgrade(&self.inner), field.clone()));
        }
        {
            let mut meta = self.inner.meta.lock();
            meta.sub_objects.retain(|(f, s)| *f != field && !s.same(sub));
            meta.sub_objects.push((field, sub.clone()));
        }
        self.mark_changed();
        Ok(())
    }

    /// The owner of a sub-object.
    #[must_use]
    pub fn owner(&self) -> Option<PersistentObject> {
        self.inner
            .meta
            .lock()
            .owner
            .as_ref()
            .and_then(|(owner, _)| owner.upgrade())
            .map(|inner| PersistentObject { inner })
    }

    /// The topmost owner, or the object itself when it is not a sub-object.
    #[must_use]
    pub fn storage_root(&self) -> PersistentObject {
        let mut current = self.clone();
        while let Some(owner) = current.owner() {
            current = owner;
        }
        current
    }

    /// Attached sub-objects with their field names.
    #[must_use]
    pub fn sub_objects(&self) -> Vec<(String, PersistentObject)> {
        self.inner.meta.lock().sub_objects.clone()
    }

    /// The attached sub-object under `field`.
    #[must_use]
    pub fn sub_object(&self, field: &str) -> Option<PersistentObject> {
        self.inner
            .meta
            .lock()
            .sub_objects
            .iter()
            .find(|(f, _)| f == field)
            .map(|(_, sub)| sub.clone())
    }

    /// The object's name, resolved and memoized on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if resolving reads a ghost that cannot be loaded.
    pub fn name(&self) -> CoreResult<Option<String>> {
        self.resolve(|meta| &mut meta.name)
    }

    /// Assigns the name, calling the configured setter.
    pub fn set_name(&self, name: Option<String>) {
        self.assign(|meta| &mut meta.name, name);
    }

    /// The object's parent, resolved and memoized on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if resolving reads a ghost that cannot be loaded.
    pub fn parent(&self) -> CoreResult<Option<Parent>> {
        self.resolve(|meta| &mut meta.parent)
    }

    /// Assigns the parent, calling the configured setter.
    pub fn set_parent(&self, parent: Option<Parent>) {
        self.assign(|meta| &mut meta.parent, parent);
    }

    fn resolve<T: AttributeValue>(
        &self,
        pick: fn(&mut ObjectMeta) -> &mut LazyAttribute<T>,
    ) -> CoreResult<Option<T>> {
        let resolution = {
            let mut meta = self.inner.meta.lock();
            let attribute = pick(&mut meta);
            if let Some(value) = attribute.cached() {
                return Ok(Some(value.clone()));
            }
            attribute.resolution().clone()
        };

        let resolved = match resolution {
            Resolution::None => None,
            Resolution::Attribute(field) => self
                .get(&field)?
                .as_ref()
                .and_then(T::from_attribute),
            Resolution::Getter(getter) => getter(self),
        };

        if let Some(value) = &resolved {
            pick(&mut self.inner.meta.lock()).remember(Some(value.clone()));
        }
        Ok(resolved)
    }

    fn assign<T: AttributeValue>(
        &self,
        pick: fn(&mut ObjectMeta) -> &mut LazyAttribute<T>,
        value: Option<T>,
    ) {
        let setter = pick(&mut self.inner.meta.lock()).setter();
        if let Some(setter) = setter {
            setter(self, value.as_ref());
        }
        pick(&mut self.inner.meta.lock()).remember(value);
    }

    /// Fills in name and parent that do not resolve to anything, without
    /// calling setters, for objects a container has just located.
    ///
    /// # Errors
    ///
    /// Returns an error if resolving reads a ghost that cannot be loaded.
    pub(crate) fn locate(&self, name: Option<String>, parent: Option<Parent>) -> CoreResult<()> {
        if name.is_some() && self.name()?.is_none() {
            self.inner.meta.lock().name.remember(name);
        }
        if parent.is_some() && self.parent()?.is_none() {
            self.inner.meta.lock().parent.remember(parent);
        }
        Ok(())
    }

    fn activate(&self) -> CoreResult<()> {
        let coordinator = {
            let meta = self.inner.meta.lock();
            if !meta.ghost {
                return Ok(());
            }
            meta.coordinator.as_ref().and_then(WeakCoordinator::upgrade)
        };
        match coordinator {
            Some(coordinator) => coordinator.setstate(self),
            None => Err(CoreError::invalid_state(format!(
                "ghost of type {} is not bound to a live coordinator",
                self.type_name()
            ))),
        }
    }

    /// The state as it is in memory, without loading a ghost.
    pub(crate) fn raw_state(&self) -> Document {
        self.inner.state.read().clone()
    }

    /// Replaces the state and clears the ghost flag.
    pub(crate) fn apply_state(&self, state: Document) {
        let mut meta = self.inner.meta.lock();
        *self.inner.state.write() = state;
        meta.ghost = false;
    }

    /// Records the reference and serial assigned by an insert.
    pub(crate) fn stored_as(&self, reference: DocumentRef, serial: Serial) {
        let mut meta = self.inner.meta.lock();
        meta.reference = Some(reference);
        meta.serial = serial;
        meta.changed = false;
        meta.ghost = false;
    }

    /// Records a serial read from or written to the store.
    pub(crate) fn synced(&self, serial: Serial) {
        let mut meta = self.inner.meta.lock();
        meta.serial = serial;
        meta.changed = false;
    }
}

impl fmt::Debug for PersistentObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let meta = self.inner.meta.lock();
        f.debug_struct("PersistentObject")
            .field("type", &self.inner.class.type_name)
            .field("reference", &meta.reference)
            .field("serial", &meta.serial)
            .field("changed", &meta.changed)
            .field("ghost", &meta.ghost)
            .finish_non_exhaustive()
    }
}
