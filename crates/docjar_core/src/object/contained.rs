//! Lazily resolved `name` and `parent` of contained objects.

use crate::collection::Container;
use crate::object::PersistentObject;
use docjar_codec::{DocumentRef, Value};
use std::fmt;
use std::sync::Arc;

/// Computes an attribute from the object.
pub type Getter<T> = Arc<dyn Fn(&PersistentObject) -> Option<T> + Send + Sync>;

/// Called with the new value whenever the attribute is assigned.
pub type Setter<T> = Arc<dyn Fn(&PersistentObject, Option<&T>) + Send + Sync>;

/// Values a lazy attribute can be read from a document field as.
pub trait AttributeValue: Clone + Send + Sync + 'static {
    /// Converts a field value, or `None` when it has the wrong shape.
    fn from_attribute(value: &Value) -> Option<Self>;
}

impl AttributeValue for String {
    fn from_attribute(value: &Value) -> Option<Self> {
        value.as_text().map(str::to_string)
    }
}

/// Where a contained object lives.
#[derive(Clone)]
pub enum Parent {
    /// A live container.
    Container(Container),
    /// A stored document, as read from a reference field.
    Reference(DocumentRef),
}

impl Parent {
    /// Returns true if the parent is exactly this container.
    #[must_use]
    pub fn is_container(&self, container: &Container) -> bool {
        matches!(self, Parent::Container(c) if c.same(container))
    }

    /// The container, when the parent is one.
    #[must_use]
    pub fn as_container(&self) -> Option<&Container> {
        match self {
            Parent::Container(c) => Some(c),
            Parent::Reference(_) => None,
        }
    }
}

impl AttributeValue for Parent {
    fn from_attribute(value: &Value) -> Option<Self> {
        value.as_reference().cloned().map(Parent::Reference)
    }
}

impl fmt::Debug for Parent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Parent::Container(c) => f.debug_tuple("Container").field(c).finish(),
            Parent::Reference(r) => f.debug_tuple("Reference").field(r).finish(),
        }
    }
}

/// How an unset attribute is computed.
pub enum Resolution<T> {
    /// Never computed; only explicit assignment sets it.
    None,
    /// Read from the named field of the object's state.
    Attribute(String),
    /// Computed by a function of the object.
    Getter(Getter<T>),
}

impl<T> Clone for Resolution<T> {
    fn clone(&self) -> Self {
        match self {
            Resolution::None => Resolution::None,
            Resolution::Attribute(field) => Resolution::Attribute(field.clone()),
            Resolution::Getter(getter) => Resolution::Getter(Arc::clone(getter)),
        }
    }
}

impl<T> fmt::Debug for Resolution<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::None => f.write_str("None"),
            Resolution::Attribute(field) => f.debug_tuple("Attribute").field(field).finish(),
            Resolution::Getter(_) => f.write_str("Getter(..)"),
        }
    }
}

/// A memoized attribute with a fixed resolution strategy.
///
/// Once resolved, the value is kept until it is assigned again, even if
/// the field or getter it came from would now produce something else.
pub struct LazyAttribute<T> {
    cached: Option<T>,
    resolution: Resolution<T>,
    setter: Option<Setter<T>>,
}

impl<T: AttributeValue> LazyAttribute<T> {
    /// An attribute that is only ever set explicitly.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cached: None,
            resolution: Resolution::None,
            setter: None,
        }
    }

    /// An attribute read from a field of the object's state.
    pub fn attribute(field: impl Into<String>) -> Self {
        Self {
            resolution: Resolution::Attribute(field.into()),
            ..Self::new()
        }
    }

    /// An attribute computed by `getter`.
    pub fn getter(getter: impl Fn(&PersistentObject) -> Option<T> + Send + Sync + 'static) -> Self {
        Self {
            resolution: Resolution::Getter(Arc::new(getter)),
            ..Self::new()
        }
    }

    /// Adds a setter, called on every assignment.
    #[must_use]
    pub fn with_setter(
        mut self,
        setter: impl Fn(&PersistentObject, Option<&T>) + Send + Sync + 'static,
    ) -> Self {
        self.setter = Some(Arc::new(setter));
        self
    }

    /// The memoized value, if resolved or assigned.
    #[must_use]
    pub fn cached(&self) -> Option<&T> {
        self.cached.as_ref()
    }

    /// The resolution strategy.
    #[must_use]
    pub fn resolution(&self) -> &Resolution<T> {
        &self.resolution
    }

    pub(crate) fn setter(&self) -> Option<Setter<T>> {
        self.setter.clone()
    }

    pub(crate) fn remember(&mut self, value: Option<T>) {
        self.cached = value;
    }
}

impl<T: AttributeValue> Default for LazyAttribute<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Clone for LazyAttribute<T> {
    fn clone(&self) -> Self {
        Self {
            cached: self.cached.clone(),
            resolution: self.resolution.clone(),
            setter: self.setter.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for LazyAttribute<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyAttribute")
            .field("cached", &self.cached)
            .field("resolution", &self.resolution)
            .field("setter", &self.setter.is_some())
            .finish()
    }
}
