//! Store configuration.

use crate::index::IndexDefinition;

/// Configuration for opening a store.
#[derive(Debug, Clone)]
pub struct Config {
    /// Create the store directory when it does not exist.
    pub create_if_missing: bool,

    /// `fsync` the log on every commit instead of only flushing to the OS.
    pub sync_on_commit: bool,

    /// Secondary indexes, rebuilt from the log on every open.
    pub indexes: Vec<IndexDefinition>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            sync_on_commit: true,
            indexes: Vec::new(),
        }
    }
}

impl Config {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the store if missing.
    #[must_use]
    pub fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether every commit is synced to durable media.
    #[must_use]
    pub fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }

    /// Declares a secondary index over a top-level payload field.
    #[must_use]
    pub fn with_index(
        mut self,
        collection: impl Into<String>,
        name: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        self.indexes
            .push(IndexDefinition::new(collection, name, field));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder() {
        let config = Config::new()
            .create_if_missing(false)
            .sync_on_commit(false)
            .with_index("clients", "by_email", "email");

        assert!(!config.create_if_missing);
        assert!(!config.sync_on_commit);
        assert_eq!(config.indexes.len(), 1);
        assert_eq!(config.indexes[0].field, "email");
    }
}
