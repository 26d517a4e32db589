//! Object state serialization contracts.
//!
//! The coordinator never looks inside an object's state itself. It asks a
//! [`StateWriter`] for the document to store and a [`StateReader`] to turn
//! stored documents back into objects. [`DocumentMapper`] is the default
//! implementation of both.

use crate::collection::Owner;
use crate::error::CoreResult;
use crate::object::{ClassMapping, PersistentObject};
use docjar_codec::{Document, DocumentRef, Value, ID_FIELD};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Produces the document stored for an object.
pub trait StateWriter: Send + Sync {
    /// The stored form of the object's current state.
    ///
    /// Must be a pure function of the object's fields. The result carries
    /// neither `_id` nor the serial field; the coordinator adds those.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be read.
    fn get_state(&self, object: &PersistentObject) -> CoreResult<Document>;

    /// The value a container's parent key holds for `owner`.
    fn owner_value(&self, owner: &Owner) -> Value {
        owner.to_value()
    }
}

/// Turns stored documents back into objects.
pub trait StateReader: Send + Sync {
    /// A ghost for the referenced document, with the class its
    /// collection maps to.
    ///
    /// # Errors
    ///
    /// Returns an error if no object can be made for the reference.
    fn new_ghost(&self, reference: &DocumentRef) -> CoreResult<PersistentObject>;

    /// Replaces the object's state with a stored document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document does not fit the object.
    fn set_state(&self, object: &PersistentObject, document: &Document) -> CoreResult<()>;
}

/// Maps objects to documents field by field.
///
/// Sub-objects are written inline under their field name and read back
/// into the attached sub-object. Collections are mapped back to classes
/// through a registry; unregistered collections map to a class named
/// after the collection.
#[derive(Debug)]
pub struct DocumentMapper {
    serial_field: String,
    classes: RwLock<HashMap<String, ClassMapping>>,
}

impl DocumentMapper {
    /// Creates a mapper that strips `serial_field` from object state.
    pub fn new(serial_field: impl Into<String>) -> Self {
        Self {
            serial_field: serial_field.into(),
            classes: RwLock::new(HashMap::new()),
        }
    }

    /// Registers the class stored in `class.collection()`.
    pub fn register(&self, class: ClassMapping) {
        self.classes
            .write()
            .insert(class.collection().to_string(), class);
    }

    /// The class registered for a collection.
    #[must_use]
    pub fn class_for(&self, collection: &str) -> ClassMapping {
        self.classes
            .read()
            .get(collection)
            .cloned()
            .unwrap_or_else(|| ClassMapping::new(collection, collection))
    }

    fn strip(&self, document: &mut Document) {
        document.remove(ID_FIELD);
        document.remove(&self.serial_field);
    }
}

impl StateWriter for DocumentMapper {
    fn get_state(&self, object: &PersistentObject) -> CoreResult<Document> {
        let mut state = object.state()?;
        for (field, sub) in object.sub_objects() {
            state.insert(field, self.get_state(&sub)?);
        }
        self.strip(&mut state);
        Ok(state)
    }
}

impl StateReader for DocumentMapper {
    fn new_ghost(&self, reference: &DocumentRef) -> CoreResult<PersistentObject> {
        Ok(PersistentObject::ghost(
            self.class_for(reference.collection()),
            reference.clone(),
        ))
    }

    fn set_state(&self, object: &PersistentObject, document: &Document) -> CoreResult<()> {
        let mut state = document.clone();
        self.strip(&mut state);
        for (field, sub) in object.sub_objects() {
            if let Some(Value::Document(inline)) = state.remove(&field) {
                self.set_state(&sub, &inline)?;
            }
        }
        object.apply_state(state);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docjar_codec::{doc, DocumentId};

    fn mapper() -> DocumentMapper {
        DocumentMapper::new("_serial")
    }

    #[test]
    fn get_state_strips_bookkeeping_fields() {
        let obj = PersistentObject::new(
            ClassMapping::new("Person", "people"),
            doc! { ID_FIELD => DocumentId::new(), "_serial" => 3i64, "name" => "one" },
        );
        assert_eq!(mapper().get_state(&obj).unwrap(), doc! { "name" => "one" });
    }

    #[test]
    fn sub_objects_are_inlined_and_read_back() {
        let person = PersistentObject::new(ClassMapping::new("Person", "people"), doc! { "name" => "one" });
        let address = PersistentObject::new(ClassMapping::new("Address", "addresses"), doc! { "city" => "Paris" });
        person.attach("address", &address).unwrap();

        let m = mapper();
        let state = m.get_state(&person).unwrap();
        assert_eq!(
            state,
            doc! { "name" => "one", "address" => doc! { "city" => "Paris" } }
        );

        let stored = doc! { "name" => "two", "address" => doc! { "city" => "Rome" }, "_serial" => 2i64 };
        m.set_state(&person, &stored).unwrap();
        assert_eq!(person.get("name").unwrap(), Some(Value::from("two")));
        assert_eq!(person.get("address").unwrap(), None);
        assert_eq!(address.get("city").unwrap(), Some(Value::from("Rome")));
    }

    #[test]
    fn registry_maps_collections_to_classes() {
        let m = mapper();
        m.register(ClassMapping::new("Folder", "folders"));
        assert_eq!(m.class_for("folders").type_name(), "Folder");
        assert_eq!(m.class_for("misc").type_name(), "misc");

        let reference = DocumentRef::new("db", "folders", DocumentId::new());
        let ghost = m.new_ghost(&reference).unwrap();
        assert!(ghost.is_ghost());
        assert_eq!(ghost.type_name(), "Folder");
        assert_eq!(ghost.reference(), Some(reference));
    }

    #[test]
    fn set_state_loads_a_ghost() {
        let m = mapper();
        let reference = DocumentRef::new("db", "people", DocumentId::new());
        let ghost = m.new_ghost(&reference).unwrap();
        m.set_state(&ghost, &doc! { ID_FIELD => reference.id(), "name" => "n" }).unwrap();
        assert!(!ghost.is_ghost());
        assert_eq!(ghost.state().unwrap(), doc! { "name" => "n" });
    }
}
