use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::SearchError;
use crate::interfaces::IndexSink;
use crate::memory::FailureInjector;
use crate::types::BulkUpsertSummary;
use catalog_indexer_shared::Document;

/// Index held in a map keyed by document id, so repeated writes overwrite.
#[derive(Debug, Default)]
pub struct MemorySink {
    documents: Mutex<HashMap<Uuid, Document>>,
    rejected: Mutex<HashSet<Uuid>>,
    failures: FailureInjector,
    rejected_calls: FailureInjector,
    rejected_setups: FailureInjector,
    calls: AtomicUsize,
    writes: AtomicUsize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` bulk calls fail with a connection error.
    pub fn fail_next(&self, count: usize) {
        self.failures.arm(count);
    }

    /// Make the next `count` bulk calls fail as a whole with a
    /// non-transient error.
    pub fn reject_next_calls(&self, count: usize) {
        self.rejected_calls.arm(count);
    }

    /// Make the next `count` index setups fail with a non-transient error.
    pub fn reject_next_setups(&self, count: usize) {
        self.rejected_setups.arm(count);
    }

    /// Reject documents with this id as individual item failures.
    pub fn reject(&self, id: Uuid) {
        if let Ok(mut rejected) = self.rejected.lock() {
            rejected.insert(id);
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<Document> {
        self.documents.lock().ok().and_then(|d| d.get(id).cloned())
    }

    /// Indexed documents sorted by id.
    pub fn documents(&self) -> Vec<Document> {
        let mut docs: Vec<Document> = self
            .documents
            .lock()
            .map(|d| d.values().cloned().collect())
            .unwrap_or_default();
        docs.sort_by_key(|d| d.id);
        docs
    }

    /// Number of bulk calls, including failed ones.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of individual document writes accepted.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IndexSink for MemorySink {
    async fn bulk_upsert(&self, documents: &[Document]) -> Result<BulkUpsertSummary, SearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failures.should_fail() {
            return Err(SearchError::connection("index unavailable"));
        }
        if self.rejected_calls.should_fail() {
            return Err(SearchError::bulk_index("status 400: request rejected"));
        }

        let rejected = self
            .rejected
            .lock()
            .map_err(|e| SearchError::bulk_index(e.to_string()))?
            .clone();
        let mut stored = self
            .documents
            .lock()
            .map_err(|e| SearchError::bulk_index(e.to_string()))?;

        let mut summary = BulkUpsertSummary {
            total: documents.len(),
            ..BulkUpsertSummary::default()
        };
        for doc in documents {
            if rejected.contains(&doc.id) {
                summary.failed.push(doc.id);
            } else {
                stored.insert(doc.id, doc.clone());
                summary.succeeded += 1;
                self.writes.fetch_add(1, Ordering::SeqCst);
            }
        }

        Ok(summary)
    }

    async fn ensure_index_exists(&self) -> Result<(), SearchError> {
        if self.rejected_setups.should_fail() {
            return Err(SearchError::index_creation("status 400: mapping conflict"));
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, SearchError> {
        Ok(true)
    }
}
