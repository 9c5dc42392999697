//! Error types for the catalog indexer pipeline.

use catalog_indexer_repository::{RepositoryError, SearchError};
use catalog_indexer_shared::KindError;
use thiserror::Error;

/// Errors that can occur in the catalog indexer pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Malformed input or an unsupported request. Never retried.
    #[error("Data error: {0}")]
    DataError(String),

    /// Error from a catalog, watermark or queue backend.
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Error from the search index.
    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    /// Error serializing or deserializing documents or watermarks.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Work stopped at a batch boundary because shutdown was requested.
    #[error("Pipeline cancelled")]
    Cancelled,
}

impl PipelineError {
    /// Create a data error.
    pub fn data(msg: impl Into<String>) -> Self {
        Self::DataError(msg.into())
    }

    /// Whether retrying the failed operation may succeed.
    ///
    /// This is the classification handed to [`RetryPolicy::retry`](crate::RetryPolicy::retry)
    /// for every external call the pipeline makes.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Repository(e) => e.is_transient(),
            Self::Search(e) => e.is_transient(),
            _ => false,
        }
    }
}

impl From<KindError> for PipelineError {
    fn from(err: KindError) -> Self {
        Self::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}
