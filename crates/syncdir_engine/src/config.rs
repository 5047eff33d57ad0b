//! Configuration for the sync engine.

/// What to do when a child's response precedes its parent's.
///
/// Applying a child before its parent would re-parent it onto an id the
/// batch has not rewritten yet, so the batch is checked up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentOrdering {
    /// Stably reorder the batch so parents come first.
    Reorder,
    /// Fail the processing step with [`crate::SyncError::OutOfOrderBatch`].
    Reject,
}

/// Configuration for the engine commands.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Parent-before-child policy.
    pub ordering: ParentOrdering,
    /// Marker inserted into temporary names during a name aside.
    pub name_aside_suffix: String,
    /// How many ` (n)` suffixes to try when a final name is still taken.
    pub max_uniquify_attempts: u32,
}

impl EngineConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the parent ordering policy.
    pub fn with_ordering(mut self, ordering: ParentOrdering) -> Self {
        self.ordering = ordering;
        self
    }

    /// Sets the name aside marker.
    pub fn with_name_aside_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.name_aside_suffix = suffix.into();
        self
    }

    /// Sets the uniquify attempt limit.
    pub fn with_max_uniquify_attempts(mut self, attempts: u32) -> Self {
        self.max_uniquify_attempts = attempts;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ordering: ParentOrdering::Reorder,
            name_aside_suffix: "~aside".to_owned(),
            max_uniquify_attempts: 100,
        }
    }
}
