//! Durable FIFO list of serialized documents.

use async_trait::async_trait;

use crate::errors::RepositoryError;

/// An ordered list of entries, appended at the back and consumed from the
/// front.
///
/// Reading and removing are separate calls so that a consumer can remove
/// entries only after it has finished with them.
#[async_trait]
pub trait DocumentQueue: Send + Sync {
    /// Append entries to the back of the queue, preserving their order.
    async fn push_many(&self, entries: &[String]) -> Result<(), RepositoryError>;

    /// Read up to `max` entries from the front without removing them.
    async fn peek(&self, max: usize) -> Result<Vec<String>, RepositoryError>;

    /// Remove the first `count` entries.
    async fn trim_front(&self, count: usize) -> Result<(), RepositoryError>;

    /// Number of entries currently queued.
    async fn len(&self) -> Result<usize, RepositoryError>;
}
