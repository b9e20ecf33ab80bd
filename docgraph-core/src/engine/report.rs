//! Invalidation reports.

use serde::Serialize;

/// What one invalidation pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InvalidationReport {
    /// Number of change events in the batch.
    pub changes: usize,

    /// Indices named directly by the batch, ascending.
    pub seeds: Vec<usize>,

    /// Indices that were reset, in rank order. Includes the seeds.
    pub invalidated: Vec<usize>,

    /// Names in the batch that match no registered document.
    pub ignored: Vec<String>,
}

impl InvalidationReport {
    /// Whether the pass reset nothing.
    pub fn is_empty(&self) -> bool {
        self.invalidated.is_empty()
    }
}
