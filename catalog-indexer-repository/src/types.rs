//! Request and response types for search index operations.

use uuid::Uuid;

/// Summary of a bulk upsert containing aggregate statistics.
///
/// A bulk request can partially succeed: the engine accepts the request but
/// rejects individual documents (mapping conflicts, oversized fields). The
/// rejected ids are reported here instead of as an error so that callers can
/// decide what to do with them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkUpsertSummary {
    /// Total number of documents in the batch.
    pub total: usize,
    /// Number of documents written.
    pub succeeded: usize,
    /// Ids of the documents the engine rejected.
    pub failed: Vec<Uuid>,
}

impl BulkUpsertSummary {
    /// A summary where every document was written.
    pub fn all_succeeded(total: usize) -> Self {
        Self {
            total,
            succeeded: total,
            failed: Vec::new(),
        }
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    /// Fold the summary of another request of the same upsert into this one.
    pub fn absorb(&mut self, other: BulkUpsertSummary) {
        self.total += other.total;
        self.succeeded += other.succeeded;
        self.failed.extend(other.failed);
    }
}
