//! Fetches the denormalizing join for a set of film works.

use std::sync::Arc;

use tracing::{debug, instrument};
use uuid::Uuid;

use crate::backoff::RetryPolicy;
use crate::errors::PipelineError;
use catalog_indexer_repository::FlatRowSource;
use catalog_indexer_shared::FlatJoinRow;

/// Reads every film work × role × genre row for the requested film works.
#[derive(Clone)]
pub struct DocumentMerger {
    source: Arc<dyn FlatRowSource>,
    retry: RetryPolicy,
    chunk_size: usize,
}

impl DocumentMerger {
    /// `chunk_size` is the number of rows taken from the database cursor
    /// per read. Every chunk is appended to the returned rows, so the whole
    /// join for the requested film works is held in memory.
    pub fn new(source: Arc<dyn FlatRowSource>, retry: RetryPolicy, chunk_size: usize) -> Self {
        Self {
            source,
            retry,
            chunk_size: chunk_size.max(1),
        }
    }

    #[instrument(skip(self, aggregate_ids), fields(count = aggregate_ids.len()))]
    pub async fn fetch(&self, aggregate_ids: &[Uuid]) -> Result<Vec<FlatJoinRow>, PipelineError> {
        if aggregate_ids.is_empty() {
            return Ok(Vec::new());
        }

        let chunk_size = self.chunk_size;
        let rows = self
            .retry
            .retry("flat_rows", PipelineError::is_transient, || async move {
                self.source
                    .flat_rows(aggregate_ids, chunk_size)
                    .await
                    .map_err(PipelineError::from)
            })
            .await?;

        debug!(rows = rows.len(), "Fetched joined rows");
        Ok(rows)
    }
}
