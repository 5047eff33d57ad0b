//! Directory configuration.

/// Configuration for opening a directory.
#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    /// Whether to create the directory if the store holds no snapshot.
    pub create_if_missing: bool,

    /// Whether every commit persists a snapshot to the backing store.
    pub save_on_commit: bool,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            save_on_commit: true,
        }
    }
}

impl DirectoryConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the directory if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether commits persist a snapshot.
    #[must_use]
    pub const fn save_on_commit(mut self, value: bool) -> Self {
        self.save_on_commit = value;
        self
    }
}
