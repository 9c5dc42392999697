//! PostgreSQL catalog client.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::RepositoryError;
use crate::interfaces::{ChangeSource, FlatRowSource, RelationSource};
use crate::postgres::queries::{
    aggregates_query, changed_at_query, changed_since_query, validate_table_name,
    FLAT_ROWS_QUERY,
};
use catalog_indexer_shared::{FlatJoinRow, PersonRole, RelationKind, SourceRecord, Watermark};

/// Catalog reads against the `content` schema of the movies database.
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    /// Connect a pool to `database_url`.
    ///
    /// # Arguments
    ///
    /// * `database_url` - PostgreSQL connection string
    /// * `max_connections` - Upper bound on pooled connections
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, RepositoryError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await
            .map_err(|e| RepositoryError::connection(format!("Failed to connect to PostgreSQL: {}", e)))?;

        info!(max_connections = max_connections, "Connected to PostgreSQL");

        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    fn limit(limit: usize) -> i64 {
        i64::try_from(limit).unwrap_or(i64::MAX)
    }

    fn decode_record(row: &PgRow) -> Result<SourceRecord, RepositoryError> {
        let id: Uuid = row.try_get("id")?;
        let updated_at: DateTime<Utc> = row.try_get("updated_at")?;
        Ok(SourceRecord::new(id, updated_at))
    }

    fn decode_flat_row(row: &PgRow) -> Result<FlatJoinRow, RepositoryError> {
        let role = row
            .try_get::<Option<String>, _>("role")?
            .map(|text| {
                text.parse::<PersonRole>()
                    .map_err(|e| RepositoryError::data(e.to_string()))
            })
            .transpose()?;

        Ok(FlatJoinRow {
            aggregate_id: row.try_get("fw_id")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            rating: row.try_get("rating")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            role,
            person_id: row.try_get("person_id")?,
            person_name: row.try_get("full_name")?,
            genre_id: row.try_get("genre_id")?,
            genre_name: row.try_get("genre_name")?,
        })
    }
}

#[async_trait]
impl ChangeSource for PgCatalog {
    async fn changed_since(
        &self,
        table: &str,
        after: &Watermark,
        limit: usize,
    ) -> Result<Vec<SourceRecord>, RepositoryError> {
        validate_table_name(table)?;

        let rows = sqlx::query(&changed_since_query(table))
            .bind(after.last_updated_at)
            .bind(after.last_id)
            .bind(Self::limit(limit))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::decode_record).collect()
    }

    async fn changed_at(
        &self,
        table: &str,
        updated_at: DateTime<Utc>,
        after_id: Uuid,
        limit: usize,
    ) -> Result<Vec<SourceRecord>, RepositoryError> {
        validate_table_name(table)?;

        let rows = sqlx::query(&changed_at_query(table))
            .bind(updated_at)
            .bind(after_id)
            .bind(Self::limit(limit))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::decode_record).collect()
    }
}

#[async_trait]
impl RelationSource for PgCatalog {
    async fn aggregates_for(
        &self,
        kind: RelationKind,
        related_ids: &[Uuid],
    ) -> Result<Vec<Uuid>, RepositoryError> {
        if related_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(&aggregates_query(kind))
            .bind(related_ids)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| row.try_get::<Uuid, _>("film_work_id").map_err(RepositoryError::from))
            .collect()
    }
}

#[async_trait]
impl FlatRowSource for PgCatalog {
    async fn flat_rows(
        &self,
        aggregate_ids: &[Uuid],
        chunk_size: usize,
    ) -> Result<Vec<FlatJoinRow>, RepositoryError> {
        if aggregate_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut chunks = sqlx::query(FLAT_ROWS_QUERY)
            .bind(aggregate_ids)
            .fetch(&self.pool)
            .try_chunks(chunk_size.max(1));

        let mut rows = Vec::new();
        while let Some(chunk) = chunks
            .try_next()
            .await
            .map_err(|e| RepositoryError::from(e.1))?
        {
            debug!(chunk_len = chunk.len(), "Fetched flat row chunk");
            for row in &chunk {
                rows.push(Self::decode_flat_row(row)?);
            }
        }

        Ok(rows)
    }
}
