//! Catalog database traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::RepositoryError;
use catalog_indexer_shared::{FlatJoinRow, RelationKind, SourceRecord, Watermark};

/// Reads changed rows of a watched table in `(updated_at, id)` order.
#[async_trait]
pub trait ChangeSource: Send + Sync {
    /// Rows strictly after `after` under the `(updated_at, id)` order.
    ///
    /// # Arguments
    ///
    /// * `table` - Schema-qualified table name, already validated
    /// * `after` - Exclusive lower bound
    /// * `limit` - Maximum number of rows to return
    async fn changed_since(
        &self,
        table: &str,
        after: &Watermark,
        limit: usize,
    ) -> Result<Vec<SourceRecord>, RepositoryError>;

    /// Rows whose `updated_at` equals `updated_at` and whose id is greater
    /// than `after_id`, ordered by id.
    async fn changed_at(
        &self,
        table: &str,
        updated_at: DateTime<Utc>,
        after_id: Uuid,
        limit: usize,
    ) -> Result<Vec<SourceRecord>, RepositoryError>;
}

/// Reverse join from related entities to the film works that embed them.
#[async_trait]
pub trait RelationSource: Send + Sync {
    /// Distinct film work ids linked to any of `related_ids`.
    async fn aggregates_for(
        &self,
        kind: RelationKind,
        related_ids: &[Uuid],
    ) -> Result<Vec<Uuid>, RepositoryError>;
}

/// Full denormalizing join for a set of film works.
#[async_trait]
pub trait FlatRowSource: Send + Sync {
    /// Every film work × person role × genre row for `aggregate_ids`.
    ///
    /// Implementations may read the result in chunks of `chunk_size` rows;
    /// the returned rows are always complete.
    async fn flat_rows(
        &self,
        aggregate_ids: &[Uuid],
        chunk_size: usize,
    ) -> Result<Vec<FlatJoinRow>, RepositoryError>;
}

/// A catalog backend offering all three read paths.
pub trait CatalogSource: ChangeSource + RelationSource + FlatRowSource {}

impl<T: ChangeSource + RelationSource + FlatRowSource> CatalogSource for T {}
