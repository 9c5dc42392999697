//! Incremental change extraction by keyset pagination.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::backoff::RetryPolicy;
use crate::errors::PipelineError;
use catalog_indexer_repository::{validate_table_name, ChangeSource};
use catalog_indexer_shared::{SourceConfig, SourceRecord, Watermark};

/// Reads the rows of a watched table that changed after a watermark.
///
/// Batches are ordered by `(updated_at, id)`, so the last record of a batch
/// is always the next watermark. When every row of a batch shares the
/// watermark's timestamp the extractor re-reads that timestamp ordered by id
/// alone, which keeps paging through large groups of identical timestamps
/// without ever stepping back to an earlier one.
#[derive(Clone)]
pub struct ChangeExtractor {
    source: Arc<dyn ChangeSource>,
    retry: RetryPolicy,
}

impl ChangeExtractor {
    pub fn new(source: Arc<dyn ChangeSource>, retry: RetryPolicy) -> Self {
        Self { source, retry }
    }

    /// The next batch of at most `batch_size` changed rows after `watermark`.
    ///
    /// An empty batch means the source is caught up.
    #[instrument(skip(self, source, watermark), fields(source = %source.kind, watermark = %watermark))]
    pub async fn extract(
        &self,
        source: &SourceConfig,
        watermark: &Watermark,
        batch_size: usize,
    ) -> Result<Vec<SourceRecord>, PipelineError> {
        if batch_size == 0 {
            return Err(PipelineError::data("batch size must be greater than zero"));
        }
        validate_table_name(&source.table)?;

        let table = source.table.as_str();
        let after = *watermark;

        let batch = self
            .retry
            .retry("changed_since", PipelineError::is_transient, || async move {
                self.source
                    .changed_since(table, &after, batch_size)
                    .await
                    .map_err(PipelineError::from)
            })
            .await?;

        let tied = !batch.is_empty()
            && batch
                .iter()
                .all(|record| record.updated_at == after.last_updated_at);
        if !tied {
            debug!(count = batch.len(), "Extracted changed rows");
            return Ok(batch);
        }

        debug!(
            count = batch.len(),
            "Batch shares the watermark timestamp, paging by id"
        );
        let batch = self
            .retry
            .retry("changed_at", PipelineError::is_transient, || async move {
                self.source
                    .changed_at(table, after.last_updated_at, after.last_id, batch_size)
                    .await
                    .map_err(PipelineError::from)
            })
            .await?;

        debug!(count = batch.len(), "Extracted tied rows");
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use catalog_indexer_repository::memory::MemoryCatalog;
    use catalog_indexer_repository::RepositoryError;
    use catalog_indexer_shared::SourceKind;
    use chrono::{DateTime, TimeZone, Utc};
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use uuid::Uuid;

    fn retry() -> RetryPolicy {
        RetryPolicy::new(Duration::from_millis(10), Duration::from_millis(100))
    }

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn film_source() -> SourceConfig {
        SourceConfig::new(SourceKind::FilmWork, "content.film_work", "fw", false)
    }

    /// Pages through the whole table the way the driver does.
    async fn drain_all(
        extractor: &ChangeExtractor,
        source: &SourceConfig,
        batch_size: usize,
    ) -> Vec<Uuid> {
        let mut watermark = Watermark::default();
        let mut seen = Vec::new();
        loop {
            let batch = extractor
                .extract(source, &watermark, batch_size)
                .await
                .unwrap();
            let Some(last) = batch.last() else { break };
            assert!(last.watermark() > watermark);
            watermark = last.watermark();
            seen.extend(batch.iter().map(|r| r.id));
        }
        seen
    }

    #[tokio::test]
    async fn test_no_loss_under_ties() {
        let catalog = Arc::new(MemoryCatalog::new());
        let mut expected = HashSet::new();

        // 7 rows share one timestamp, surrounded by distinct ones
        for i in 0..12u128 {
            let id = Uuid::from_u128(1000 - i);
            let updated_at = if (3..10).contains(&i) { ts(50) } else { ts(i as i64) };
            catalog.add_film_work(id, format!("film {}", i), updated_at);
            expected.insert(id);
        }

        let extractor = ChangeExtractor::new(catalog.clone(), retry());
        for batch_size in [1, 2, 3, 5, 100] {
            let seen = drain_all(&extractor, &film_source(), batch_size).await;
            let unique: HashSet<Uuid> = seen.iter().copied().collect();
            assert_eq!(seen.len(), expected.len(), "batch size {}", batch_size);
            assert_eq!(unique, expected, "batch size {}", batch_size);
        }
    }

    #[tokio::test]
    async fn test_idempotent_reextraction() {
        let catalog = Arc::new(MemoryCatalog::new());
        for i in 0..6u128 {
            catalog.add_film_work(Uuid::from_u128(i + 1), "film", ts((i % 2) as i64));
        }
        let extractor = ChangeExtractor::new(catalog.clone(), retry());
        let watermark = Watermark::new(ts(0), Uuid::from_u128(1));

        let first = extractor.extract(&film_source(), &watermark, 3).await.unwrap();
        let second = extractor.extract(&film_source(), &watermark, 3).await.unwrap();

        assert_eq!(first.len(), 3);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_caught_up_returns_empty() {
        let catalog = Arc::new(MemoryCatalog::new());
        catalog.add_film_work(Uuid::from_u128(1), "film", ts(1));
        let extractor = ChangeExtractor::new(catalog.clone(), retry());

        let batch = extractor
            .extract(&film_source(), &Watermark::new(ts(1), Uuid::from_u128(1)), 10)
            .await
            .unwrap();
        assert!(batch.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_input_is_rejected_before_querying() {
        let catalog = Arc::new(MemoryCatalog::new());
        let extractor = ChangeExtractor::new(catalog.clone(), retry());

        let bad_table = SourceConfig::new(
            SourceKind::FilmWork,
            "content.film_work; DROP TABLE x",
            "fw",
            false,
        );
        let err = extractor
            .extract(&bad_table, &Watermark::default(), 10)
            .await
            .unwrap_err();
        assert!(!err.is_transient());

        let err = extractor
            .extract(&film_source(), &Watermark::default(), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::DataError(_)));

        assert_eq!(catalog.query_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connection_failures_are_retried() {
        let catalog = Arc::new(MemoryCatalog::new());
        catalog.add_film_work(Uuid::from_u128(1), "film", ts(1));
        catalog.fail_next(4);

        let extractor = ChangeExtractor::new(catalog.clone(), retry());
        let batch = extractor
            .extract(&film_source(), &Watermark::default(), 10)
            .await
            .unwrap();

        assert_eq!(batch.len(), 1);
        assert_eq!(catalog.query_count(), 5);
    }

    /// Ignores the id half of the watermark, as a lax backend might.
    struct TimestampOnlySource {
        inner: MemoryCatalog,
        tie_reads: AtomicUsize,
    }

    #[async_trait]
    impl ChangeSource for TimestampOnlySource {
        async fn changed_since(
            &self,
            table: &str,
            after: &Watermark,
            limit: usize,
        ) -> Result<Vec<SourceRecord>, RepositoryError> {
            let from = Watermark::new(after.last_updated_at, Uuid::nil());
            let mut rows = self.inner.changed_since(table, &from, limit + 1).await?;
            rows.retain(|r| r.updated_at >= after.last_updated_at);
            rows.truncate(limit);
            Ok(rows)
        }

        async fn changed_at(
            &self,
            table: &str,
            updated_at: DateTime<Utc>,
            after_id: Uuid,
            limit: usize,
        ) -> Result<Vec<SourceRecord>, RepositoryError> {
            self.tie_reads.fetch_add(1, Ordering::SeqCst);
            self.inner.changed_at(table, updated_at, after_id, limit).await
        }
    }

    #[tokio::test]
    async fn test_tied_batch_switches_to_id_paging() {
        let inner = MemoryCatalog::new();
        for i in 1..=4u128 {
            inner.add_film_work(Uuid::from_u128(i), "film", ts(7));
        }
        let source = Arc::new(TimestampOnlySource {
            inner,
            tie_reads: AtomicUsize::new(0),
        });
        let extractor = ChangeExtractor::new(source.clone(), retry());

        let watermark = Watermark::new(ts(7), Uuid::from_u128(2));
        let batch = extractor.extract(&film_source(), &watermark, 2).await.unwrap();

        let ids: Vec<Uuid> = batch.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![Uuid::from_u128(3), Uuid::from_u128(4)]);
        assert_eq!(source.tie_reads.load(Ordering::SeqCst), 1);
    }
}
