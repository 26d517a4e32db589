//! Document identifiers and references.

use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Store-generated identity of a single document (its `_id`).
///
/// Document IDs are 128-bit UUIDs that are:
/// - Unique within a collection
/// - Immutable once assigned
/// - Never reused
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocumentId([u8; 16]);

impl DocumentId {
    /// Creates a document ID from raw bytes.
    #[inline]
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Creates a new random document ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().into_bytes())
    }

    /// Returns the raw bytes.
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Converts to a UUID.
    #[must_use]
    pub fn to_uuid(&self) -> Uuid {
        Uuid::from_bytes(self.0)
    }

    /// Creates a document ID from a slice.
    ///
    /// Returns `None` if the slice is not exactly 16 bytes.
    #[must_use]
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        <[u8; 16]>::try_from(slice).ok().map(Self)
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocumentId({})", self.to_uuid())
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_uuid())
    }
}

impl FromStr for DocumentId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?.into_bytes()))
    }
}

impl From<Uuid> for DocumentId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid.into_bytes())
    }
}

impl From<[u8; 16]> for DocumentId {
    fn from(bytes: [u8; 16]) -> Self {
        Self::from_bytes(bytes)
    }
}

/// Locator for a stored document: database, collection and document id.
///
/// Two references are equal iff all three parts match. A reference never
/// changes once it has been handed out.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocumentRef {
    database: String,
    collection: String,
    id: DocumentId,
}

impl DocumentRef {
    /// Creates a reference.
    pub fn new(database: impl Into<String>, collection: impl Into<String>, id: DocumentId) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
            id,
        }
    }

    /// The database (store) name.
    #[must_use]
    pub fn database(&self) -> &str {
        &self.database
    }

    /// The collection name.
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// The document id.
    #[must_use]
    pub fn id(&self) -> DocumentId {
        self.id
    }
}

impl fmt::Debug for DocumentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DocumentRef({}, {}, {})",
            self.collection, self.id, self.database
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn new_is_unique() {
        assert_ne!(DocumentId::new(), DocumentId::new());
    }

    #[test]
    fn from_slice() {
        assert!(DocumentId::from_slice(&[0u8; 16]).is_some());
        assert!(DocumentId::from_slice(&[0u8; 15]).is_none());
        assert!(DocumentId::from_slice(&[0u8; 17]).is_none());
    }

    #[test]
    fn parse_display_form() {
        let id = DocumentId::new();
        let parsed: DocumentId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<DocumentId>().is_err());
    }

    #[test]
    fn reference_equality_uses_all_parts() {
        let id = DocumentId::new();
        let a = DocumentRef::new("db", "users", id);
        assert_eq!(a, DocumentRef::new("db", "users", id));
        assert_ne!(a, DocumentRef::new("other", "users", id));
        assert_ne!(a, DocumentRef::new("db", "people", id));
        assert_ne!(a, DocumentRef::new("db", "users", DocumentId::new()));

        let set: HashSet<_> = [a.clone(), a].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn reference_display() {
        let id = DocumentId::from_bytes([0; 16]);
        let r = DocumentRef::new("db", "users", id);
        assert_eq!(
            r.to_string(),
            "DocumentRef(users, 00000000-0000-0000-0000-000000000000, db)"
        );
    }
}
