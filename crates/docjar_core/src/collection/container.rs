//! Dict-like views over a collection.

use crate::collection::FlushingCollection;
use crate::error::{CoreError, CoreResult};
use crate::object::{ClassMapping, Parent, PersistentObject};
use crate::transaction::Coordinator;
use docjar_codec::{Document, DocumentId, DocumentRef, Value, ID_FIELD};
use docjar_store::{Condition, Filter, Projection};
use parking_lot::Mutex;
use std::fmt;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::debug;

/// Default mapping key field.
pub const DEFAULT_MAPPING_KEY: &str = "key";

/// Default parent key field.
pub const DEFAULT_PARENT_KEY: &str = "parent";

/// Prefix of synthesized owner identities.
pub const FOREIGN_OWNER_PREFIX: &str = "oid-";

/// Field of a stored container binding holding its own reference.
const BINDING_FIELD: &str = "binding";

/// The object a scoped container belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Owner {
    /// An object stored in the document store; scoped by its reference.
    Stored(DocumentRef),
    /// An object persisted elsewhere, known by an opaque object id.
    Foreign(Vec<u8>),
}

impl Owner {
    /// The owner identity of a stored object.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotStored`] if the object has no reference.
    pub fn of(object: &PersistentObject) -> CoreResult<Self> {
        object
            .storage_root()
            .reference()
            .map(Owner::Stored)
            .ok_or_else(|| CoreError::not_stored(object.type_name()))
    }

    /// The value stored in the parent key field.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Owner::Stored(reference) => Value::Ref(reference.clone()),
            Owner::Foreign(oid) => {
                let mut text = String::with_capacity(FOREIGN_OWNER_PREFIX.len() + oid.len() * 2);
                text.push_str(FOREIGN_OWNER_PREFIX);
                for byte in oid {
                    let _ = write!(text, "{byte:02x}");
                }
                Value::Text(text)
            }
        }
    }

    /// Reads an owner back from a parent key value.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Ref(reference) => Some(Owner::Stored(reference.clone())),
            Value::Text(text) => {
                let hex = text.strip_prefix(FOREIGN_OWNER_PREFIX)?;
                if hex.len() % 2 != 0 {
                    return None;
                }
                (0..hex.len())
                    .step_by(2)
                    .map(|i| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok())
                    .collect::<Option<Vec<u8>>>()
                    .map(Owner::Foreign)
            }
            _ => None,
        }
    }
}

/// Container flavours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContainerKind {
    /// Scoped to one owner through the parent key.
    #[default]
    Scoped,
    /// Sees the whole collection, whatever the owner.
    AllItems,
    /// Scoped like [`ContainerKind::Scoped`], with its own binding kept
    /// inline in its parent's document.
    SubDocument,
}

impl ContainerKind {
    fn as_str(self) -> &'static str {
        match self {
            ContainerKind::Scoped => "scoped",
            ContainerKind::AllItems => "all_items",
            ContainerKind::SubDocument => "sub_document",
        }
    }

    fn parse(text: &str) -> Option<Self> {
        match text {
            "scoped" => Some(ContainerKind::Scoped),
            "all_items" => Some(ContainerKind::AllItems),
            "sub_document" => Some(ContainerKind::SubDocument),
            _ => None,
        }
    }
}

struct ContainerInner {
    coordinator: Coordinator,
    database: String,
    collection: String,
    mapping_key: Option<String>,
    parent_key: Option<String>,
    owner: Option<Owner>,
    remove_documents: bool,
    kind: ContainerKind,
    name: Mutex<Option<String>>,
    parent: Mutex<Option<DocumentRef>>,
    binding: Mutex<Option<DocumentRef>>,
}

/// A filtered, lazily materializing mapping from keys to stored objects.
///
/// Membership lives entirely in the store: a document belongs to the
/// container when its mapping key field is set and, for scoped
/// containers, its parent key field holds the owner's identity. Objects
/// are materialized through the coordinator, so a key always resolves to
/// the transaction's live instance.
///
/// Without a mapping key, keys are the documents' ids.
///
/// A scoped container built without an [`Owner`] is top-level: it is
/// its own owner, identified by its stored binding (see
/// [`Container::reference`]), which is written on first use.
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

/// Builds a [`Container`].
#[derive(Debug)]
pub struct ContainerBuilder {
    coordinator: Coordinator,
    collection: String,
    database: Option<String>,
    mapping_key: Option<String>,
    parent_key: Option<String>,
    owner: Option<Owner>,
    remove_documents: bool,
    kind: ContainerKind,
}

impl ContainerBuilder {
    /// Sets the database; defaults to the coordinator's default database.
    #[must_use]
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Sets the mapping key field.
    #[must_use]
    pub fn mapping_key(mut self, field: impl Into<String>) -> Self {
        self.mapping_key = Some(field.into());
        self
    }

    /// Uses document ids as keys instead of a mapping key field.
    #[must_use]
    pub fn id_keys(mut self) -> Self {
        self.mapping_key = None;
        self
    }

    /// Sets the parent key field.
    #[must_use]
    pub fn parent_key(mut self, field: impl Into<String>) -> Self {
        self.parent_key = Some(field.into());
        self
    }

    /// Sets the owner the container is scoped to.
    #[must_use]
    pub fn owner(mut self, owner: Owner) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Whether deleting a key deletes the document too. Defaults to true.
    #[must_use]
    pub fn remove_documents(mut self, remove: bool) -> Self {
        self.remove_documents = remove;
        self
    }

    /// Drops owner scoping: the container sees the whole collection.
    #[must_use]
    pub fn all_items(mut self) -> Self {
        self.kind = ContainerKind::AllItems;
        self.parent_key = None;
        self
    }

    /// Keeps the container's binding inline in its parent's document.
    #[must_use]
    pub fn sub_document(mut self) -> Self {
        self.kind = ContainerKind::SubDocument;
        self
    }

    /// Builds the container.
    #[must_use]
    pub fn build(self) -> Container {
        let database = self
            .database
            .unwrap_or_else(|| self.coordinator.config().default_database.clone());
        Container {
            inner: Arc::new(ContainerInner {
                coordinator: self.coordinator,
                database,
                collection: self.collection,
                mapping_key: self.mapping_key,
                parent_key: self.parent_key,
                owner: self.owner,
                remove_documents: self.remove_documents,
                kind: self.kind,
                name: Mutex::new(None),
                parent: Mutex::new(None),
                binding: Mutex::new(None),
            }),
        }
    }
}

impl Container {
    /// Starts building a container over `collection`.
    pub fn builder(coordinator: &Coordinator, collection: impl Into<String>) -> ContainerBuilder {
        ContainerBuilder {
            coordinator: coordinator.clone(),
            collection: collection.into(),
            database: None,
            mapping_key: Some(DEFAULT_MAPPING_KEY.to_string()),
            parent_key: Some(DEFAULT_PARENT_KEY.to_string()),
            owner: None,
            remove_documents: true,
            kind: ContainerKind::Scoped,
        }
    }

    /// Returns true if both handles refer to the same container.
    #[must_use]
    pub fn same(&self, other: &Container) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// The coordinator objects are materialized through.
    #[must_use]
    pub fn coordinator(&self) -> &Coordinator {
        &self.inner.coordinator
    }

    /// The database name.
    #[must_use]
    pub fn database(&self) -> &str {
        &self.inner.database
    }

    /// The collection name.
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.inner.collection
    }

    /// The mapping key field, if keys are not document ids.
    #[must_use]
    pub fn mapping_key(&self) -> Option<&str> {
        self.inner.mapping_key.as_deref()
    }

    /// The parent key field, if the container is scoped.
    #[must_use]
    pub fn parent_key(&self) -> Option<&str> {
        self.inner.parent_key.as_deref()
    }

    /// The owner the container is scoped to.
    #[must_use]
    pub fn owner(&self) -> Option<&Owner> {
        self.inner.owner.as_ref()
    }

    /// The flavour.
    #[must_use]
    pub fn kind(&self) -> ContainerKind {
        self.inner.kind
    }

    /// Returns true if the container's binding is stored inline.
    #[must_use]
    pub fn is_sub_document(&self) -> bool {
        self.inner.kind == ContainerKind::SubDocument
    }

    /// The container's own name within its parent.
    #[must_use]
    pub fn name(&self) -> Option<String> {
        self.inner.name.lock().clone()
    }

    /// Sets the container's own name.
    pub fn set_name(&self, name: Option<String>) {
        *self.inner.name.lock() = name;
    }

    /// The document the container itself belongs to.
    #[must_use]
    pub fn parent(&self) -> Option<DocumentRef> {
        self.inner.parent.lock().clone()
    }

    /// Sets the document the container itself belongs to.
    pub fn set_parent(&self, parent: Option<DocumentRef>) {
        *self.inner.parent.lock() = parent;
    }

    /// The collection, flushing before reads.
    #[must_use]
    pub fn get_collection(&self) -> FlushingCollection {
        self.inner
            .coordinator
            .get_collection(&self.inner.database, &self.inner.collection)
    }

    /// The reference of the container's own stored binding.
    ///
    /// The binding ([`Container::to_document`]) is inserted through the
    /// coordinator the first time it is needed, so an aborted transaction
    /// discards it. Reopen the container with [`Container::open`].
    ///
    /// # Errors
    ///
    /// Returns an error if the binding cannot be inserted.
    pub fn reference(&self) -> CoreResult<DocumentRef> {
        if let Some(reference) = self.inner.binding.lock().clone() {
            return Ok(reference);
        }
        let class = ClassMapping::new("Container", &self.inner.coordinator.config().container_collection)
            .with_database(self.inner.database.clone());
        let binding = PersistentObject::new(class, self.to_document());
        let reference = self.inner.coordinator.insert(&binding)?;
        binding.set(BINDING_FIELD, reference.clone())?;

        let existing = {
            let mut slot = self.inner.binding.lock();
            match &*slot {
                Some(existing) => Some(existing.clone()),
                None => {
                    *slot = Some(reference.clone());
                    None
                }
            }
        };
        if let Some(existing) = existing {
            self.inner.coordinator.remove(&binding)?;
            return Ok(existing);
        }
        debug!(collection = %self.inner.collection, %reference, "stored container binding");
        Ok(reference)
    }

    /// Reopens a container from its stored binding.
    ///
    /// # Errors
    ///
    /// Returns an error if the binding cannot be loaded or is not a
    /// container binding.
    pub fn open(coordinator: &Coordinator, reference: &DocumentRef) -> CoreResult<Self> {
        let mut document = coordinator.load(reference)?.state()?;
        document.insert(BINDING_FIELD, reference.clone());
        Self::from_document(coordinator, &document)
    }

    fn parent_value(&self) -> CoreResult<Value> {
        let owner = match &self.inner.owner {
            Some(owner) => owner.clone(),
            None => Owner::Stored(self.reference()?),
        };
        Ok(self.inner.coordinator.writer().owner_value(&owner))
    }

    /// The filter every query of this container starts from.
    ///
    /// # Errors
    ///
    /// Returns an error if a top-level container cannot store its binding.
    pub fn items_filter(&self) -> CoreResult<Filter> {
        let mut filter = Filter::new();
        if let Some(mapping_key) = &self.inner.mapping_key {
            filter.set(mapping_key.clone(), Condition::Exists(true));
        }
        if let Some(parent_key) = &self.inner.parent_key {
            filter.set(parent_key.clone(), Condition::Eq(self.parent_value()?));
        }
        Ok(filter)
    }

    fn scoped(&self, extra: &Filter) -> CoreResult<Filter> {
        let mut filter = extra.clone();
        filter.merge_missing(&self.items_filter()?);
        Ok(filter)
    }

    fn key_filter(&self, key: &str) -> CoreResult<Filter> {
        let mut filter = self.items_filter()?;
        match &self.inner.mapping_key {
            Some(mapping_key) => filter.set(mapping_key.clone(), Condition::Eq(key.into())),
            None => {
                let id: DocumentId = key
                    .parse()
                    .map_err(|_| CoreError::invalid_key(format!("{key:?} is not a document id")))?;
                filter.set(ID_FIELD, Condition::Eq(id.into()));
            }
        }
        Ok(filter)
    }

    fn key_projection(&self) -> Projection {
        match &self.inner.mapping_key {
            Some(mapping_key) => Projection::fields([mapping_key.as_str()]),
            None => Projection::id_only(),
        }
    }

    fn key_of(&self, document: &Document) -> Option<String> {
        match &self.inner.mapping_key {
            Some(mapping_key) => document
                .get(mapping_key)
                .and_then(Value::as_text)
                .map(str::to_string),
            None => document.id().map(|id| id.to_string()),
        }
    }

    /// Materializes a matched document and fills in its name and parent.
    fn load_one(&self, document: &Document) -> CoreResult<PersistentObject> {
        let id = document
            .id()
            .ok_or_else(|| CoreError::invalid_state("matched document has no id"))?;
        let reference = DocumentRef::new(&self.inner.database, &self.inner.collection, id);
        let object = self.inner.coordinator.load_document(&reference, document)?;
        object.locate(self.key_of(document), Some(Parent::Container(self.clone())))?;
        Ok(object)
    }

    /// The object stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if nothing is stored under the key.
    pub fn get(&self, key: &str) -> CoreResult<PersistentObject> {
        let filter = self.key_filter(key)?;
        let document = self
            .get_collection()
            .find_one(&filter, &Projection::All)?
            .ok_or_else(|| CoreError::not_found(format!("key {key:?} in {}", self.inner.collection)))?;
        self.load_one(&document)
    }

    /// Like [`Container::get`], returning `None` when the key is unbound.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup itself fails.
    pub fn try_get(&self, key: &str) -> CoreResult<Option<PersistentObject>> {
        match self.get(key) {
            Ok(object) => Ok(Some(object)),
            Err(CoreError::NotFound { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn derive_key(&self, value: &PersistentObject) -> CoreResult<String> {
        match &self.inner.mapping_key {
            Some(mapping_key) => match value.get(mapping_key)? {
                Some(Value::Text(key)) => Ok(key),
                _ => Err(CoreError::invalid_key(format!(
                    "object has no text {mapping_key:?} field to use as key"
                ))),
            },
            None => {
                let reference = match value.reference() {
                    Some(reference) => reference,
                    None => self.inner.coordinator.insert(value)?,
                };
                Ok(reference.id().to_string())
            }
        }
    }

    /// Binds `value` under `key` and returns the key.
    ///
    /// Without a key, it is read from the value's mapping key field, or is
    /// the value's document id when keys are ids. Binding the same object
    /// to the same key again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidKey`] for an empty or underivable key,
    /// [`CoreError::DuplicateKey`] if another object is bound to the key,
    /// or any error of the underlying insert or lookup.
    pub fn set(&self, key: Option<&str>, value: &PersistentObject) -> CoreResult<String> {
        if self.inner.mapping_key.is_none() {
            if let Some(key) = key {
                let matches = value
                    .reference()
                    .is_some_and(|reference| reference.id().to_string() == key);
                if !matches {
                    return Err(CoreError::invalid_key(format!(
                        "{key:?} is not the document id of the value"
                    )));
                }
            }
        }
        let key = match key {
            Some(key) => key.to_string(),
            None => self.derive_key(value)?,
        };
        if key.is_empty() {
            return Err(CoreError::invalid_key("keys must be non-empty text"));
        }

        if let Some(old) = self.try_get(&key)? {
            if !old.same(value) {
                return Err(CoreError::duplicate_key(key));
            }
            // Locating the match fills in a parent that did not resolve.
            if value.parent()?.is_some_and(|parent| parent.is_container(self)) {
                return Ok(key);
            }
        }
        let placed = value.parent()?.is_some_and(|parent| parent.is_container(self));

        if value.name()?.as_deref() != Some(key.as_str()) {
            value.set_name(Some(key.clone()));
        }
        if !placed {
            value.set_parent(Some(Parent::Container(self.clone())));
        }

        if !value.is_stored() {
            self.inner.coordinator.insert(value)?;
        }
        if let Some(mapping_key) = &self.inner.mapping_key {
            value.set(mapping_key.clone(), key.as_str())?;
        }
        if let Some(parent_key) = &self.inner.parent_key {
            value.set(parent_key.clone(), self.parent_value()?)?;
        }
        debug!(collection = %self.inner.collection, %key, "bound object");
        Ok(key)
    }

    /// Binds `value` under its derived key and returns the key.
    ///
    /// # Errors
    ///
    /// Same as [`Container::set`].
    pub fn add(&self, value: &PersistentObject) -> CoreResult<String> {
        self.set(None, value)
    }

    /// Unbinds `key`, deleting the document unless the container only
    /// unmarks documents.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if nothing is bound to the key.
    pub fn delete(&self, key: &str) -> CoreResult<()> {
        let value = self.get(key)?;
        if let Some(mapping_key) = &self.inner.mapping_key {
            value.unset(mapping_key)?;
        }
        if let Some(parent_key) = &self.inner.parent_key {
            value.unset(parent_key)?;
        }
        if self.inner.remove_documents {
            self.inner.coordinator.remove(&value)?;
        }
        value.set_name(None);
        value.set_parent(None);
        debug!(
            collection = %self.inner.collection,
            %key,
            removed = self.inner.remove_documents,
            "unbound object"
        );
        Ok(())
    }

    /// Returns true if something is bound to `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    pub fn contains(&self, key: &str) -> CoreResult<bool> {
        let filter = match self.key_filter(key) {
            Ok(filter) => filter,
            Err(CoreError::InvalidKey { .. }) => return Ok(false),
            Err(err) => return Err(err),
        };
        Ok(self
            .get_collection()
            .find_one(&filter, &Projection::id_only())?
            .is_some())
    }

    /// Every bound key, in store order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn keys(&self) -> CoreResult<Vec<String>> {
        let mut filter = Filter::new();
        if let Some(mapping_key) = &self.inner.mapping_key {
            filter.set(mapping_key.clone(), Condition::Ne(Value::Null));
        }
        let documents = self.raw_find(&filter, &self.key_projection())?;
        Ok(documents.iter().filter_map(|d| self.key_of(d)).collect())
    }

    /// Iterates over the bound keys.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn iter(&self) -> CoreResult<std::vec::IntoIter<String>> {
        Ok(self.keys()?.into_iter())
    }

    /// Every bound `(key, object)` pair, materialized.
    ///
    /// # Errors
    ///
    /// Returns an error if the query or a materialization fails.
    pub fn items(&self) -> CoreResult<Vec<(String, PersistentObject)>> {
        self.raw_find(&Filter::new(), &Projection::All)?
            .iter()
            .filter_map(|document| self.key_of(document).map(|key| (key, document)))
            .map(|(key, document)| self.load_one(document).map(|object| (key, object)))
            .collect()
    }

    /// Every bound object, materialized.
    ///
    /// # Errors
    ///
    /// Returns an error if the query or a materialization fails.
    pub fn values(&self) -> CoreResult<Vec<PersistentObject>> {
        Ok(self.items()?.into_iter().map(|(_, object)| object).collect())
    }

    /// Number of bound keys.
    ///
    /// # Errors
    ///
    /// Returns an error if the count fails.
    pub fn len(&self) -> CoreResult<u64> {
        self.get_collection().count(&self.items_filter()?)
    }

    /// Returns true if no key is bound.
    ///
    /// # Errors
    ///
    /// Returns an error if the count fails.
    pub fn is_empty(&self) -> CoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Bound documents matching `filter`, as stored.
    ///
    /// The container's own scoping wins over nothing: fields `filter`
    /// constrains are left as given.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn raw_find(&self, filter: &Filter, projection: &Projection) -> CoreResult<Vec<Document>> {
        self.get_collection().find(&self.scoped(filter)?, projection)
    }

    /// Bound objects matching `filter`, materialized.
    ///
    /// # Errors
    ///
    /// Returns an error if the query or a materialization fails.
    pub fn find(&self, filter: &Filter) -> CoreResult<Vec<PersistentObject>> {
        self.raw_find(filter, &Projection::All)?
            .iter()
            .map(|document| self.load_one(document))
            .collect()
    }

    /// The first bound document matching `filter`, as stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn raw_find_one(
        &self,
        filter: &Filter,
        projection: &Projection,
    ) -> CoreResult<Option<Document>> {
        self.get_collection()
            .find_one(&self.scoped(filter)?, projection)
    }

    /// The first bound object matching `filter`, materialized.
    ///
    /// # Errors
    ///
    /// Returns an error if the query or the materialization fails.
    pub fn find_one(&self, filter: &Filter) -> CoreResult<Option<PersistentObject>> {
        self.raw_find_one(filter, &Projection::All)?
            .map(|document| self.load_one(&document))
            .transpose()
    }

    /// The container's binding, for storing inline in a parent document.
    #[must_use]
    pub fn to_document(&self) -> Document {
        let mut document = Document::new();
        document.insert("kind", self.inner.kind.as_str());
        document.insert("database", self.inner.database.as_str());
        document.insert("collection", self.inner.collection.as_str());
        let optional = |value: Option<&str>| value.map_or(Value::Null, Value::from);
        document.insert("mapping_key", optional(self.mapping_key()));
        document.insert("parent_key", optional(self.parent_key()));
        document.insert("remove_documents", self.inner.remove_documents);
        if let Some(owner) = &self.inner.owner {
            document.insert("owner", owner.to_value());
        }
        if let Some(name) = self.name() {
            document.insert("name", name);
        }
        if let Some(parent) = self.parent() {
            document.insert("parent", parent);
        }
        if let Some(binding) = self.inner.binding.lock().clone() {
            document.insert(BINDING_FIELD, binding);
        }
        document
    }

    /// Rebuilds a container from [`Container::to_document`] output.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidState`] if the document is not a
    /// container binding.
    pub fn from_document(coordinator: &Coordinator, document: &Document) -> CoreResult<Self> {
        let text = |field: &str| -> CoreResult<String> {
            document
                .get(field)
                .and_then(Value::as_text)
                .map(str::to_string)
                .ok_or_else(|| CoreError::invalid_state(format!("container binding lacks {field:?}")))
        };
        let optional = |field: &str| document.get(field).and_then(Value::as_text).map(str::to_string);

        let kind = ContainerKind::parse(&text("kind")?)
            .ok_or_else(|| CoreError::invalid_state("unknown container kind"))?;
        let container = Container {
            inner: Arc::new(ContainerInner {
                coordinator: coordinator.clone(),
                database: text("database")?,
                collection: text("collection")?,
                mapping_key: optional("mapping_key"),
                parent_key: optional("parent_key"),
                owner: document.get("owner").and_then(Owner::from_value),
                remove_documents: document
                    .get("remove_documents")
                    .and_then(Value::as_bool)
                    .unwrap_or(true),
                kind,
                name: Mutex::new(optional("name")),
                parent: Mutex::new(document.get("parent").and_then(Value::as_reference).cloned()),
                binding: Mutex::new(document.get(BINDING_FIELD).and_then(Value::as_reference).cloned()),
            }),
        };
        Ok(container)
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("database", &self.inner.database)
            .field("collection", &self.inner.collection)
            .field("mapping_key", &self.inner.mapping_key)
            .field("parent_key", &self.inner.parent_key)
            .field("kind", &self.inner.kind)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::DocumentMapper;
    use crate::transaction::TransactionParticipant;
    use crate::types::TransactionId;
    use docjar_codec::doc;
    use docjar_store::{DocumentStore, InMemoryStore, Namespace};

    fn coordinator() -> (Arc<InMemoryStore>, Coordinator) {
        let store = Arc::new(InMemoryStore::new());
        (store.clone(), Coordinator::new(store))
    }

    fn item(title: &str) -> PersistentObject {
        PersistentObject::new(ClassMapping::new("Item", "items"), doc! { "title" => title })
    }

    #[test]
    fn foreign_owner_value_is_hex() {
        let owner = Owner::Foreign(vec![0x00, 0x1f, 0xab]);
        assert_eq!(owner.to_value(), Value::from("oid-001fab"));
        assert_eq!(Owner::from_value(&owner.to_value()), Some(owner));
        assert_eq!(Owner::from_value(&Value::from("oid-1")), None);
        assert_eq!(Owner::from_value(&Value::from("zz")), None);
    }

    #[test]
    fn stored_owner_needs_reference() {
        assert!(matches!(Owner::of(&item("x")), Err(CoreError::NotStored { .. })));
    }

    #[test]
    fn top_level_containers_are_their_own_owners() {
        let (store, c) = coordinator();
        let left = Container::builder(&c, "items").build();
        let right = Container::builder(&c, "items").build();
        assert!(left.keys().unwrap().is_empty());

        left.set(Some("a"), &item("l")).unwrap();
        right.set(Some("b"), &item("r")).unwrap();
        assert_eq!(left.keys().unwrap(), vec!["a".to_string()]);
        assert_eq!(right.keys().unwrap(), vec!["b".to_string()]);
        assert!(!right.contains("a").unwrap());

        let reference = left.reference().unwrap();
        assert_eq!(left.reference().unwrap(), reference);
        assert_ne!(right.reference().unwrap(), reference);
        assert_eq!(reference.collection(), "persistence_containers");
        c.flush().unwrap();

        let items = store.documents(&Namespace::new("docjar", "items")).unwrap();
        let a = items.iter().find(|d| d.get("key") == Some(&Value::from("a"))).unwrap();
        assert_eq!(a.get("parent"), Some(&Value::Ref(reference)));
    }

    #[test]
    fn top_level_container_reopens_from_its_binding() {
        let (_, c) = coordinator();
        let container = Container::builder(&c, "items").build();
        container.set(Some("a"), &item("kept")).unwrap();
        let reference = container.reference().unwrap();
        c.tpc_finish(TransactionId::new(1)).unwrap();

        let reopened = Container::open(&c, &reference).unwrap();
        assert_eq!(reopened.reference().unwrap(), reference);
        assert_eq!(reopened.keys().unwrap(), vec!["a".to_string()]);
        assert_eq!(
            reopened.get("a").unwrap().get("title").unwrap(),
            Some(Value::from("kept"))
        );
    }

    #[test]
    fn get_keeps_a_name_the_object_resolves_itself() {
        let store = Arc::new(InMemoryStore::new());
        store
            .insert(
                &Namespace::new("docjar", "items"),
                doc! { "title" => "T", "key" => "k" },
            )
            .unwrap();
        let mapper = Arc::new(DocumentMapper::new("_serial"));
        mapper.register(ClassMapping::new("Item", "items").with_name_attribute("title"));
        let c = Coordinator::builder(store).mapper(mapper).build();

        let container = Container::builder(&c, "items").all_items().build();
        let found = container.get("k").unwrap();
        assert_eq!(found.name().unwrap(), Some("T".to_string()));
        assert!(found.parent().unwrap().unwrap().is_container(&container));
    }

    #[test]
    fn rebinding_a_loaded_object_changes_nothing() {
        let (_, c) = coordinator();
        let container = Container::builder(&c, "items").all_items().build();
        let reference = c.insert(&item("one")).unwrap();
        container.set(Some("k"), &c.load(&reference).unwrap()).unwrap();
        c.tpc_finish(TransactionId::new(1)).unwrap();

        let loaded = c.load(&reference).unwrap();
        let serial = loaded.serial();
        assert_eq!(container.set(Some("k"), &loaded).unwrap(), "k");
        assert!(!loaded.is_changed());
        assert!(c.registered_objects().is_empty());
        c.flush().unwrap();
        assert_eq!(loaded.serial(), serial);
    }

    #[test]
    fn set_get_delete() {
        let (store, c) = coordinator();
        let container = Container::builder(&c, "items").all_items().build();

        let value = item("first");
        assert_eq!(container.set(Some("a"), &value).unwrap(), "a");
        assert!(container.get("a").unwrap().same(&value));
        assert!(container.contains("a").unwrap());
        assert_eq!(container.keys().unwrap(), vec!["a".to_string()]);
        assert_eq!(value.name().unwrap(), Some("a".to_string()));
        assert!(value.parent().unwrap().unwrap().is_container(&container));

        container.delete("a").unwrap();
        assert!(container.keys().unwrap().is_empty());
        assert_eq!(value.name().unwrap(), None);
        c.flush().unwrap();
        assert_eq!(store.document_count(&Namespace::new("docjar", "items")), 0);
    }

    #[test]
    fn rebinding_rules() {
        let (_, c) = coordinator();
        let container = Container::builder(&c, "items").all_items().build();
        let value = item("one");
        container.set(Some("k"), &value).unwrap();
        assert_eq!(container.set(Some("k"), &value).unwrap(), "k");
        assert!(matches!(
            container.set(Some("k"), &item("two")),
            Err(CoreError::DuplicateKey { .. })
        ));
        assert!(matches!(
            container.set(Some(""), &item("three")),
            Err(CoreError::InvalidKey { .. })
        ));
    }

    #[test]
    fn add_derives_key_from_mapping_field() {
        let (_, c) = coordinator();
        let container = Container::builder(&c, "items").all_items().build();
        let value = PersistentObject::new(ClassMapping::new("Item", "items"), doc! { "key" => "derived" });
        assert_eq!(container.add(&value).unwrap(), "derived");
        assert!(matches!(container.add(&item("no key")), Err(CoreError::InvalidKey { .. })));
    }

    #[test]
    fn id_keys_use_document_ids() {
        let (_, c) = coordinator();
        let container = Container::builder(&c, "items").all_items().id_keys().build();
        let value = item("x");
        let key = container.add(&value).unwrap();
        assert_eq!(Some(key.clone()), value.reference().map(|r| r.id().to_string()));
        assert!(container.get(&key).unwrap().same(&value));
        assert!(!container.contains("not-an-id").unwrap());
        assert!(matches!(
            container.set(Some("other"), &value),
            Err(CoreError::InvalidKey { .. })
        ));
    }

    #[test]
    fn scoped_containers_do_not_see_each_other() {
        let (_, c) = coordinator();
        let left = Container::builder(&c, "items").owner(Owner::Foreign(vec![1])).build();
        let right = Container::builder(&c, "items").owner(Owner::Foreign(vec![2])).build();
        left.set(Some("a"), &item("l")).unwrap();
        right.set(Some("b"), &item("r")).unwrap();

        assert_eq!(left.keys().unwrap(), vec!["a".to_string()]);
        assert_eq!(right.keys().unwrap(), vec!["b".to_string()]);
        assert!(!left.contains("b").unwrap());
        assert_eq!(left.len().unwrap(), 1);

        // caller filters are never overridden by the scope
        let other = Filter::new().eq("parent", Owner::Foreign(vec![2]).to_value());
        assert_eq!(left.find(&other).unwrap().len(), 1);
    }

    #[test]
    fn delete_can_keep_documents() {
        let (store, c) = coordinator();
        let container = Container::builder(&c, "items")
            .all_items()
            .remove_documents(false)
            .build();
        container.set(Some("a"), &item("kept")).unwrap();
        container.delete("a").unwrap();
        c.flush().unwrap();

        let docs = store.documents(&Namespace::new("docjar", "items")).unwrap();
        assert_eq!(docs.len(), 1);
        assert!(!docs[0].contains_key("key"));
        assert!(container.is_empty().unwrap());
    }

    #[test]
    fn binding_survives_inline_storage() {
        let (_, c) = coordinator();
        let container = Container::builder(&c, "items")
            .owner(Owner::Foreign(vec![7]))
            .sub_document()
            .build();
        container.set_name(Some("children".to_string()));

        let rebuilt = Container::from_document(&c, &container.to_document()).unwrap();
        assert!(rebuilt.is_sub_document());
        assert_eq!(rebuilt.owner(), Some(&Owner::Foreign(vec![7])));
        assert_eq!(rebuilt.mapping_key(), Some(DEFAULT_MAPPING_KEY));
        assert_eq!(rebuilt.name(), Some("children".to_string()));
        assert!(Container::from_document(&c, &doc! {}).is_err());
    }
}
