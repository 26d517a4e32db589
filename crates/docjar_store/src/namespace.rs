//! Collection namespaces.

use std::fmt;

/// A collection inside a database.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Namespace {
    database: String,
    collection: String,
}

impl Namespace {
    /// Creates a namespace.
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
        }
    }

    /// The database name.
    #[must_use]
    pub fn database(&self) -> &str {
        &self.database
    }

    /// The collection name.
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.collection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_joins_with_dot() {
        assert_eq!(Namespace::new("app", "users").to_string(), "app.users");
    }

    #[test]
    fn equality_uses_both_parts() {
        assert_eq!(Namespace::new("a", "b"), Namespace::new("a", "b"));
        assert_ne!(Namespace::new("a", "b"), Namespace::new("b", "a"));
    }
}
