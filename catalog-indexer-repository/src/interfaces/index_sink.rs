//! Search index sink trait definition.

use async_trait::async_trait;

use crate::errors::SearchError;
use crate::types::BulkUpsertSummary;
use catalog_indexer_shared::Document;

/// Abstract interface for writing documents to a search engine.
///
/// # Thread Safety
///
/// All implementations must be `Send + Sync` to allow use across async tasks.
#[async_trait]
pub trait IndexSink: Send + Sync {
    /// Insert or overwrite documents keyed by their id.
    ///
    /// Writing the same document twice leaves the index in the same state as
    /// writing it once.
    ///
    /// # Returns
    ///
    /// * `Ok(BulkUpsertSummary)` - The request was accepted; individual
    ///   documents may still have been rejected
    /// * `Err(SearchError)` - The request as a whole failed
    async fn bulk_upsert(&self, documents: &[Document]) -> Result<BulkUpsertSummary, SearchError>;

    /// Ensure the search index exists with proper mappings.
    ///
    /// This should be called during application startup.
    async fn ensure_index_exists(&self) -> Result<(), SearchError>;

    /// Check if the search engine is healthy and reachable.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - If the search engine is healthy
    /// * `Ok(false)` - If the search engine is unhealthy
    /// * `Err(SearchError)` - If the health check fails to execute
    async fn health_check(&self) -> Result<bool, SearchError>;
}
