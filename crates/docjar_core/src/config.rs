//! Coordinator configuration.

use serde::{Deserialize, Serialize};

/// Configuration for a [`crate::Coordinator`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Whether flush and commit compare serials before writing.
    pub detect_conflicts: bool,

    /// Database used by objects and containers that do not name one.
    pub default_database: String,

    /// Database holding the root mapping (the default database when unset).
    pub root_database: Option<String>,

    /// Collection holding the root mapping.
    pub root_collection: String,

    /// Collection holding the bindings of top-level containers.
    pub container_collection: String,

    /// Document field carrying the serial.
    pub serial_field: String,

    /// Ordinal reported in the coordinator's sort key.
    pub sort_ordinal: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            detect_conflicts: false,
            default_database: "docjar".to_string(),
            root_database: None,
            root_collection: "persistence_root".to_string(),
            container_collection: "persistence_containers".to_string(),
            serial_field: "_serial".to_string(),
            sort_ordinal: 0,
        }
    }
}

impl CoordinatorConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether conflicts are detected.
    #[must_use]
    pub const fn detect_conflicts(mut self, value: bool) -> Self {
        self.detect_conflicts = value;
        self
    }

    /// Sets the default database.
    #[must_use]
    pub fn default_database(mut self, name: impl Into<String>) -> Self {
        self.default_database = name.into();
        self
    }

    /// Sets the root mapping database.
    #[must_use]
    pub fn root_database(mut self, name: impl Into<String>) -> Self {
        self.root_database = Some(name.into());
        self
    }

    /// Sets the root mapping collection.
    #[must_use]
    pub fn root_collection(mut self, name: impl Into<String>) -> Self {
        self.root_collection = name.into();
        self
    }

    /// Sets the container binding collection.
    #[must_use]
    pub fn container_collection(mut self, name: impl Into<String>) -> Self {
        self.container_collection = name.into();
        self
    }

    /// Sets the serial field name.
    #[must_use]
    pub fn serial_field(mut self, name: impl Into<String>) -> Self {
        self.serial_field = name.into();
        self
    }

    /// Sets the sort key ordinal.
    #[must_use]
    pub const fn sort_ordinal(mut self, ordinal: u64) -> Self {
        self.sort_ordinal = ordinal;
        self
    }

    /// The database the root mapping lives in.
    #[must_use]
    pub fn effective_root_database(&self) -> &str {
        self.root_database
            .as_deref()
            .unwrap_or(&self.default_database)
    }
}
