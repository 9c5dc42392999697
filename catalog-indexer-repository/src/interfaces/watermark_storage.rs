//! Durable key → blob storage for watermarks.

use async_trait::async_trait;

use crate::errors::RepositoryError;

/// Stores one JSON document per key.
///
/// The storage is deliberately unaware of the watermark layout; decoding
/// and merging happen in the pipeline's watermark store.
#[async_trait]
pub trait WatermarkStorage: Send + Sync {
    /// Load the raw blob stored under `key`, if any.
    async fn retrieve(&self, key: &str) -> Result<Option<String>, RepositoryError>;

    /// Replace the blob stored under `key`.
    async fn save(&self, key: &str, blob: &str) -> Result<(), RepositoryError>;
}
