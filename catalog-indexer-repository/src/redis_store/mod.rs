//! Redis implementations of the watermark storage and document queue.

mod document_queue;
mod watermark_storage;

pub use document_queue::RedisDocumentQueue;
pub use watermark_storage::RedisWatermarkStorage;

use redis::aio::ConnectionManager;
use tracing::info;

use crate::errors::RepositoryError;

/// Open a reconnecting Redis connection.
///
/// The returned manager is cheap to clone and re-establishes the connection
/// transparently after a drop.
pub async fn connect(url: &str) -> Result<ConnectionManager, RepositoryError> {
    let client = redis::Client::open(url)
        .map_err(|e| RepositoryError::connection(format!("Invalid Redis URL: {}", e)))?;
    let manager = ConnectionManager::new(client).await?;

    info!("Connected to Redis");
    Ok(manager)
}
