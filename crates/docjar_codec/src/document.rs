//! String-keyed document type.

use crate::id::DocumentId;
use crate::value::Value;
use std::cmp::Ordering;

/// Name of the field holding a document's identity.
pub const ID_FIELD: &str = "_id";

/// A document: a set of named fields.
///
/// Fields are kept in canonical key order (length-first, then bytewise),
/// the order the encoder writes them in. Two documents holding the same
/// fields therefore compare equal no matter how they were built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    fields: Vec<(String, Value)>,
}

/// Canonical ordering of text keys: length-first, then bytewise.
pub(crate) fn cmp_keys(a: &str, b: &str) -> Ordering {
    match a.len().cmp(&b.len()) {
        Ordering::Equal => a.as_bytes().cmp(b.as_bytes()),
        ord => ord,
    }
}

impl Document {
    /// Creates an empty document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, key: &str) -> Result<usize, usize> {
        self.fields.binary_search_by(|(k, _)| cmp_keys(k, key))
    }

    /// Returns the value of a field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.position(key).ok().map(|i| &self.fields[i].1)
    }

    /// Returns a mutable reference to the value of a field.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        match self.position(key) {
            Ok(i) => Some(&mut self.fields[i].1),
            Err(_) => None,
        }
    }

    /// Sets a field, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        match self.position(&key) {
            Ok(i) => Some(std::mem::replace(&mut self.fields[i].1, value)),
            Err(i) => {
                self.fields.insert(i, (key, value));
                None
            }
        }
    }

    /// Removes a field, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.position(key).ok().map(|i| self.fields.remove(i).1)
    }

    /// Returns true if the field is present (even when null).
    pub fn contains_key(&self, key: &str) -> bool {
        self.position(key).is_ok()
    }

    /// Field names in canonical order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    /// Fields in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the document has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The `_id` field, when it holds a document id.
    pub fn id(&self) -> Option<DocumentId> {
        self.get(ID_FIELD).and_then(Value::as_id)
    }

    /// Copies every field of `other` that this document does not have yet.
    pub fn merge_missing(&mut self, other: &Document) {
        for (key, value) in other.iter() {
            if !self.contains_key(key) {
                self.insert(key, value.clone());
            }
        }
    }

    /// Keeps only the named fields (and `_id`).
    #[must_use]
    pub fn project<S: AsRef<str>>(&self, fields: &[S]) -> Document {
        let fields = self
            .fields
            .iter()
            .filter(|(k, _)| k == ID_FIELD || fields.iter().any(|f| f.as_ref() == k))
            .cloned()
            .collect();
        Document { fields }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Document {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut doc = Document::new();
        for (k, v) in iter {
            doc.insert(k, v);
        }
        doc
    }
}

impl IntoIterator for Document {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

/// Builds a [`Document`] from `key => value` pairs.
///
/// ```
/// use docjar_codec::{doc, Value};
///
/// let d = doc! { "name" => "one", "count" => 2i64 };
/// assert_eq!(d.get("count"), Some(&Value::Integer(2)));
/// ```
#[macro_export]
macro_rules! doc {
    () => { $crate::Document::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut d = $crate::Document::new();
        $( d.insert($key, $value); )+
        d
    }};
}
