//! Knowledge base configuration.

use crate::agenda::ConflictStrategy;

/// Settings fixed when a knowledge base is created.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KnowledgeBaseConfig {
    /// Conflict-resolution strategy of the agenda.
    pub strategy: ConflictStrategy,

    /// Maximum firings per `run` before it fails (None = unlimited).
    pub max_firings: Option<usize>,
}

impl KnowledgeBaseConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the conflict-resolution strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: ConflictStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Sets the firing limit of a single `run`.
    #[must_use]
    pub fn with_max_firings(mut self, limit: usize) -> Self {
        self.max_firings = Some(limit);
        self
    }
}
