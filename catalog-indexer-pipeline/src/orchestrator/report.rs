//! Counters collected during a pass.

use super::state::PipelineState;
use crate::bridge::DeliveryReport;
use catalog_indexer_shared::{SourceKind, Watermark};

/// Progress of one source during a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceReport {
    pub kind: SourceKind,
    /// Extracted batches that were fully enqueued and advanced past.
    pub batches: usize,
    /// Changed rows extracted.
    pub records: usize,
    /// Documents enqueued.
    pub documents: usize,
    /// Watermark at the end of the pass.
    pub watermark: Watermark,
}

impl SourceReport {
    pub fn new(kind: SourceKind) -> Self {
        Self {
            kind,
            batches: 0,
            records: 0,
            documents: 0,
            watermark: Watermark::default(),
        }
    }
}

/// A source whose pass was aborted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFailure {
    pub kind: SourceKind,
    /// The state the pass was in when it failed.
    pub state: PipelineState,
    pub error: String,
    /// Progress made before the failure; batches counted here were advanced.
    pub progress: SourceReport,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    pub sources: Vec<SourceReport>,
    pub failures: Vec<SourceFailure>,
    pub delivery: DeliveryReport,
    /// Set when delivery stopped early; the undelivered batch stays queued.
    pub delivery_error: Option<String>,
}

impl PassReport {
    pub fn records(&self) -> usize {
        self.sources.iter().map(|s| s.records).sum::<usize>()
            + self.failures.iter().map(|f| f.progress.records).sum::<usize>()
    }

    pub fn documents_enqueued(&self) -> usize {
        self.sources.iter().map(|s| s.documents).sum::<usize>()
            + self.failures.iter().map(|f| f.progress.documents).sum::<usize>()
    }

    /// No source failed and delivery drained the queue.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.delivery_error.is_none()
    }

    pub fn source(&self, kind: SourceKind) -> Option<&SourceReport> {
        self.sources.iter().find(|s| s.kind == kind)
    }
}
