//! Search error types.
//!
//! This module defines the error types that can occur while writing to the
//! search index.

use thiserror::Error;

/// Errors that can occur during search engine operations.
#[derive(Error, Debug, Clone)]
pub enum SearchError {
    /// Failed to establish connection to the search engine.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The search engine answered with a throttling or server-side status.
    #[error("Search engine unavailable: {0}")]
    Unavailable(String),

    /// Bulk indexing request was rejected as a whole.
    #[error("Bulk index error: {0}")]
    BulkIndexError(String),

    /// Failed to create the search index.
    #[error("Index creation error: {0}")]
    IndexCreationError(String),

    /// Failed to parse response from search engine.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Failed to serialize data for the search engine.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl SearchError {
    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create an unavailable error.
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Create a bulk index error.
    pub fn bulk_index(msg: impl Into<String>) -> Self {
        Self::BulkIndexError(msg.into())
    }

    /// Create an index creation error.
    pub fn index_creation(msg: impl Into<String>) -> Self {
        Self::IndexCreationError(msg.into())
    }

    /// Determine if an error is retryable (transient failures).
    pub fn is_transient(&self) -> bool {
        match self {
            SearchError::ConnectionError(_) | SearchError::Unavailable(_) => true,
            // Bulk errors carry the response status text; throttling and
            // timeouts are worth another attempt.
            SearchError::BulkIndexError(msg) => {
                let msg_lower = msg.to_lowercase();
                msg_lower.contains("rate limit")
                    || msg_lower.contains("timeout")
                    || msg_lower.contains("503")
                    || msg_lower.contains("429")
            }
            SearchError::IndexCreationError(_)
            | SearchError::ParseError(_)
            | SearchError::SerializationError(_) => false,
        }
    }
}
