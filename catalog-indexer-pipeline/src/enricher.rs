//! Maps changed related entities to the film works that embed them.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, instrument};
use uuid::Uuid;

use crate::backoff::RetryPolicy;
use crate::errors::PipelineError;
use catalog_indexer_repository::RelationSource;
use catalog_indexer_shared::{RelationKind, SourceKind};

/// Reverse join from persons or genres to film work ids.
#[derive(Clone)]
pub struct RelationEnricher {
    source: Arc<dyn RelationSource>,
    retry: RetryPolicy,
    chunk_size: usize,
}

impl RelationEnricher {
    pub fn new(source: Arc<dyn RelationSource>, retry: RetryPolicy, chunk_size: usize) -> Self {
        Self {
            source,
            retry,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Film work ids linked to any of `related_ids`.
    ///
    /// `kind` is checked before anything is read, so an unsupported kind
    /// fails even for an empty input.
    #[instrument(skip(self, related_ids), fields(count = related_ids.len()))]
    pub async fn enrich(
        &self,
        related_ids: &BTreeSet<Uuid>,
        kind: SourceKind,
    ) -> Result<BTreeSet<Uuid>, PipelineError> {
        let relation = RelationKind::try_from(kind)?;
        let mut aggregates = BTreeSet::new();
        if related_ids.is_empty() {
            return Ok(aggregates);
        }

        let ids: Vec<Uuid> = related_ids.iter().copied().collect();
        for chunk in ids.chunks(self.chunk_size) {
            let found = self
                .retry
                .retry("aggregates_for", PipelineError::is_transient, || async move {
                    self.source
                        .aggregates_for(relation, chunk)
                        .await
                        .map_err(PipelineError::from)
                })
                .await?;
            aggregates.extend(found);
        }

        debug!(aggregates = aggregates.len(), "Resolved film works");
        Ok(aggregates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_indexer_repository::memory::MemoryCatalog;
    use catalog_indexer_shared::PersonRole;
    use chrono::{TimeZone, Utc};
    use std::time::Duration;

    fn retry() -> RetryPolicy {
        RetryPolicy::new(Duration::from_millis(10), Duration::from_millis(100))
    }

    fn id(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    /// Films 1..=4, persons 101..=103, genres 201..=202.
    fn fixture() -> (MemoryCatalog, Vec<(Uuid, Uuid)>) {
        let catalog = MemoryCatalog::new();
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        for f in 1..=4 {
            catalog.add_film_work(id(f), format!("film {}", f), ts);
        }
        for p in 101..=103 {
            catalog.add_person(id(p), format!("person {}", p), ts);
        }
        for g in 201..=202 {
            catalog.add_genre(id(g), format!("genre {}", g), ts);
        }

        let person_edges = vec![
            (id(1), id(101), PersonRole::Actor),
            (id(1), id(101), PersonRole::Director),
            (id(2), id(101), PersonRole::Actor),
            (id(2), id(102), PersonRole::Writer),
            (id(3), id(102), PersonRole::Actor),
        ];
        for (film, person, role) in &person_edges {
            catalog.link_person(*film, *person, *role);
        }
        catalog.link_genre(id(4), id(201));

        let edges = person_edges.iter().map(|(f, p, _)| (*f, *p)).collect();
        (catalog, edges)
    }

    #[tokio::test]
    async fn test_enrichment_matches_reference_join() {
        let (catalog, edges) = fixture();
        let enricher = RelationEnricher::new(Arc::new(catalog), retry(), 1);

        let input: BTreeSet<Uuid> = [id(101), id(102), id(103)].into_iter().collect();
        let expected: BTreeSet<Uuid> = edges
            .iter()
            .filter(|(_, p)| input.contains(p))
            .map(|(f, _)| *f)
            .collect();

        let result = enricher.enrich(&input, SourceKind::Person).await.unwrap();
        assert_eq!(result, expected);
        assert_eq!(result, [id(1), id(2), id(3)].into_iter().collect());
    }

    #[tokio::test]
    async fn test_genre_enrichment() {
        let (catalog, _) = fixture();
        let enricher = RelationEnricher::new(Arc::new(catalog), retry(), 500);

        let input: BTreeSet<Uuid> = [id(201), id(202)].into_iter().collect();
        let result = enricher.enrich(&input, SourceKind::Genre).await.unwrap();
        assert_eq!(result, [id(4)].into_iter().collect());
    }

    #[tokio::test]
    async fn test_empty_input_issues_no_query() {
        let (catalog, _) = fixture();
        let catalog = Arc::new(catalog);
        let enricher = RelationEnricher::new(catalog.clone(), retry(), 10);

        let result = enricher
            .enrich(&BTreeSet::new(), SourceKind::Person)
            .await
            .unwrap();
        assert!(result.is_empty());
        assert_eq!(catalog.query_count(), 0);
    }

    #[tokio::test]
    async fn test_film_work_is_not_a_relation() {
        let (catalog, _) = fixture();
        let catalog = Arc::new(catalog);
        let enricher = RelationEnricher::new(catalog.clone(), retry(), 10);

        let input: BTreeSet<Uuid> = [id(1)].into_iter().collect();
        let err = enricher
            .enrich(&input, SourceKind::FilmWork)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::DataError(_)));
        assert_eq!(catalog.query_count(), 0);
    }
}
