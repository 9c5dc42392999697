//! Orchestrator module for the catalog indexer pipeline.
//!
//! Runs every source through extract → enrich → merge → transform → enqueue
//! → advance, then delivers the queue to the search index.

mod report;
mod state;

pub use report::{PassReport, SourceFailure, SourceReport};
pub use state::PipelineState;

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::backoff::RetryPolicy;
use crate::bridge::QueueBridge;
use crate::enricher::RelationEnricher;
use crate::errors::PipelineError;
use crate::extractor::ChangeExtractor;
use crate::merger::DocumentMerger;
use crate::transformer::DocumentTransformer;
use crate::watermark::{WatermarkState, WatermarkStore};
use catalog_indexer_repository::{CatalogSource, DocumentQueue, IndexSink, WatermarkStorage};
use catalog_indexer_shared::SourceConfig;

/// Configuration for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Rows per extracted batch, and documents per bulk request.
    pub batch_size: usize,
    /// Ids per enrichment query and rows per database read when merging.
    pub chunk_size: usize,
    /// Sleep between passes.
    pub poll_interval: Duration,
    /// Backoff for every external call.
    pub retry: RetryPolicy,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            chunk_size: 500,
            poll_interval: Duration::from_secs(1),
            retry: RetryPolicy::default(),
        }
    }
}

/// Requests a graceful stop of [`Orchestrator::run`] from anywhere.
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    /// The orchestrator stops before its next pass.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

struct BatchOutcome {
    records: usize,
    documents: usize,
}

/// Orchestrator that drives every configured source to the search index.
///
/// Sources are processed one after another, each until it is caught up.
/// A failing source is logged and skipped for the rest of the pass with its
/// watermark left where it was, so the next pass retries the same rows.
pub struct Orchestrator {
    sources: Vec<SourceConfig>,
    watermarks: WatermarkStore,
    extractor: ChangeExtractor,
    enricher: RelationEnricher,
    merger: DocumentMerger,
    transformer: DocumentTransformer,
    bridge: QueueBridge,
    sink: Arc<dyn IndexSink>,
    config: OrchestratorConfig,
    shutdown_tx: Arc<watch::Sender<bool>>,
}

impl Orchestrator {
    /// Create a new orchestrator with default configuration.
    pub fn new<C>(
        catalog: Arc<C>,
        watermarks: Arc<dyn WatermarkStorage>,
        queue: Arc<dyn DocumentQueue>,
        sink: Arc<dyn IndexSink>,
        sources: Vec<SourceConfig>,
    ) -> Self
    where
        C: CatalogSource + 'static,
    {
        Self::with_config(
            catalog,
            watermarks,
            queue,
            sink,
            sources,
            OrchestratorConfig::default(),
        )
    }

    /// Create a new orchestrator with custom configuration.
    pub fn with_config<C>(
        catalog: Arc<C>,
        watermarks: Arc<dyn WatermarkStorage>,
        queue: Arc<dyn DocumentQueue>,
        sink: Arc<dyn IndexSink>,
        sources: Vec<SourceConfig>,
        config: OrchestratorConfig,
    ) -> Self
    where
        C: CatalogSource + 'static,
    {
        let retry = config.retry.clone();
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            sources,
            watermarks: WatermarkStore::new(watermarks, retry.clone()),
            extractor: ChangeExtractor::new(catalog.clone(), retry.clone()),
            enricher: RelationEnricher::new(catalog.clone(), retry.clone(), config.chunk_size),
            merger: DocumentMerger::new(catalog, retry.clone(), config.chunk_size),
            transformer: DocumentTransformer::new(),
            bridge: QueueBridge::new(queue, retry),
            sink,
            config,
            shutdown_tx: Arc::new(shutdown_tx),
        }
    }

    /// Park documents the index rejects in `queue`.
    pub fn with_dead_letter(mut self, queue: Arc<dyn DocumentQueue>) -> Self {
        self.bridge = self.bridge.with_dead_letter(queue);
        self
    }

    pub fn sources(&self) -> &[SourceConfig] {
        &self.sources
    }

    /// Run passes until shutdown.
    ///
    /// Alternates passes with `poll_interval` sleeps. Stops on ctrl-c or
    /// [`ShutdownHandle::trigger`], including in the middle of a pass that is
    /// waiting out an outage; work not yet advanced past is redone on the
    /// next start. Failures never end the loop. Index setup that fails is
    /// logged and attempted again before the next pass.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<(), PipelineError> {
        info!(sources = self.sources.len(), "Starting catalog indexer orchestrator");

        let signal_tx = self.shutdown_tx.clone();
        let signal_listener = tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received shutdown signal");
                    signal_tx.send_replace(true);
                }
                Err(e) => warn!(error = %e, "Unable to listen for the shutdown signal"),
            }
        });

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut index_ready = false;
        loop {
            if *shutdown_rx.borrow_and_update() {
                info!("Shutdown requested");
                break;
            }

            let report = tokio::select! {
                report = self.prepare_and_run_pass(&mut index_ready) => report,
                _ = shutdown_rx.changed() => {
                    info!("Shutdown requested, abandoning the current pass");
                    break;
                }
            };
            if let Some(report) = report {
                if report.records() > 0 || report.delivery.batches > 0 || !report.is_clean() {
                    info!(
                        records = report.records(),
                        enqueued = report.documents_enqueued(),
                        delivered = report.delivery.delivered,
                        failed_sources = report.failures.len(),
                        "Pass complete"
                    );
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval) => {}
                _ = shutdown_rx.changed() => {
                    info!("Shutdown requested");
                    break;
                }
            }
        }

        signal_listener.abort();
        info!("Orchestrator shutdown complete");
        Ok(())
    }

    /// `None` when the index could not be set up and the pass was skipped.
    async fn prepare_and_run_pass(&self, index_ready: &mut bool) -> Option<PassReport> {
        if !*index_ready {
            let sink = self.sink.as_ref();
            let prepared = self
                .config
                .retry
                .retry("ensure_index", PipelineError::is_transient, || async move {
                    sink.ensure_index_exists().await.map_err(PipelineError::from)
                })
                .await;
            if let Err(e) = prepared {
                error!(error = %e, "Search index setup failed, pass skipped");
                return None;
            }
            *index_ready = true;
        }
        Some(self.run_pass().await)
    }

    /// Process every source until caught up, then deliver the queue.
    ///
    /// After a shutdown request no further source or batch is started and
    /// delivery is left for the next run.
    #[instrument(skip(self))]
    pub async fn run_pass(&self) -> PassReport {
        let mut report = PassReport::default();

        for source in &self.sources {
            if self.shutdown_requested() {
                return report;
            }
            match self.process_source(source).await {
                Ok(source_report) => report.sources.push(source_report),
                Err(failure) => {
                    error!(
                        source = %failure.kind,
                        state = %failure.state,
                        error = %failure.error,
                        "Source pass aborted, watermark unchanged"
                    );
                    report.failures.push(failure);
                }
            }
        }
        if self.shutdown_requested() {
            return report;
        }

        match self
            .bridge
            .deliver(self.sink.as_ref(), self.config.batch_size)
            .await
        {
            Ok(delivery) => report.delivery = delivery,
            Err(e) => {
                error!(error = %e, "Delivery stopped, batch left queued");
                report.delivery_error = Some(e.to_string());
            }
        }

        report
    }

    /// Trigger a graceful shutdown.
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown_tx.clone(),
        }
    }

    fn shutdown_requested(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    #[instrument(skip(self, source), fields(source = %source.kind))]
    async fn process_source(&self, source: &SourceConfig) -> Result<SourceReport, SourceFailure> {
        let mut report = SourceReport::new(source.kind);
        let mut state = PipelineState::Idle;

        match self.sync_source(source, &mut report, &mut state).await {
            Ok(()) => {
                if report.records > 0 {
                    info!(
                        batches = report.batches,
                        records = report.records,
                        documents = report.documents,
                        watermark = %report.watermark,
                        "Source caught up"
                    );
                }
                Ok(report)
            }
            Err(PipelineError::Cancelled) => {
                info!(
                    batches = report.batches,
                    watermark = %report.watermark,
                    "Source stopped for shutdown"
                );
                Ok(report)
            }
            Err(e) => {
                if e.is_transient() {
                    warn!(error = %e, "Source unavailable");
                }
                Err(SourceFailure {
                    kind: source.kind,
                    state,
                    error: e.to_string(),
                    progress: report,
                })
            }
        }
    }

    async fn sync_source(
        &self,
        source: &SourceConfig,
        report: &mut SourceReport,
        state: &mut PipelineState,
    ) -> Result<(), PipelineError> {
        let mut watermark = WatermarkState::load(&self.watermarks, &source.watermark_key).await?;
        report.watermark = watermark.current();

        while let Some(outcome) = self.run_batch(source, &mut watermark, state).await? {
            report.batches += 1;
            report.records += outcome.records;
            report.documents += outcome.documents;
            report.watermark = watermark.current();
            if self.shutdown_requested() {
                return Err(PipelineError::Cancelled);
            }
        }
        Ok(())
    }

    /// One batch through every state. `None` when the source is caught up.
    async fn run_batch(
        &self,
        source: &SourceConfig,
        watermark: &mut WatermarkState,
        state: &mut PipelineState,
    ) -> Result<Option<BatchOutcome>, PipelineError> {
        *state = PipelineState::Extracting;
        let records = self
            .extractor
            .extract(source, &watermark.current(), self.config.batch_size)
            .await?;
        let Some(last) = records.last().copied() else {
            *state = PipelineState::Idle;
            return Ok(None);
        };

        let aggregate_ids: Vec<Uuid> = if source.requires_enrichment {
            *state = PipelineState::Enriching;
            let related: BTreeSet<Uuid> = records.iter().map(|r| r.id).collect();
            self.enricher
                .enrich(&related, source.kind)
                .await?
                .into_iter()
                .collect()
        } else {
            let mut seen = HashSet::new();
            records
                .iter()
                .map(|r| r.id)
                .filter(|id| seen.insert(*id))
                .collect()
        };

        let mut documents = 0;
        if aggregate_ids.is_empty() {
            debug!(records = records.len(), "Batch maps to no film works");
        } else {
            *state = PipelineState::Merging;
            let rows = self.merger.fetch(&aggregate_ids).await?;

            *state = PipelineState::Transforming;
            let docs = self.transformer.transform(rows);

            *state = PipelineState::Enqueuing;
            self.bridge.push_all(&docs).await?;
            documents = docs.len();
        }

        *state = PipelineState::Advancing;
        watermark.advance(&self.watermarks, last.watermark()).await?;
        *state = PipelineState::Idle;

        debug!(
            records = records.len(),
            documents,
            watermark = %last.watermark(),
            "Batch enqueued"
        );
        Ok(Some(BatchOutcome {
            records: records.len(),
            documents,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::DeliveryReport;
    use catalog_indexer_repository::memory::{
        MemoryCatalog, MemoryDocumentQueue, MemorySink, MemoryWatermarkStorage,
    };
    use catalog_indexer_shared::{Document, PersonRole, SourceKind, Watermark};
    use chrono::{DateTime, TimeZone, Utc};

    fn id(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    struct Harness {
        catalog: Arc<MemoryCatalog>,
        storage: Arc<MemoryWatermarkStorage>,
        queue: Arc<MemoryDocumentQueue>,
        sink: Arc<MemorySink>,
    }

    impl Harness {
        /// Three films: 1 with two actors, a writer and a genre; 2 bare;
        /// 3 directed by the writer of 1. Person 103 is linked to nothing.
        fn seeded() -> Self {
            let catalog = Arc::new(MemoryCatalog::new());
            catalog.add_film_work(id(1), "Solaris", ts(1));
            catalog.add_film_work(id(2), "Stalker", ts(2));
            catalog.add_film_work(id(3), "Mirror", ts(2));
            catalog.set_details(id(1), Some("Ocean planet".to_string()), Some(8.1));

            catalog.add_person(id(101), "Natalya", ts(1));
            catalog.add_person(id(102), "Donatas", ts(1));
            catalog.add_person(id(103), "Nobody", ts(1));
            catalog.add_person(id(104), "Andrei", ts(1));
            catalog.add_genre(id(201), "Drama", ts(1));

            catalog.link_person(id(1), id(101), PersonRole::Actor);
            catalog.link_person(id(1), id(102), PersonRole::Actor);
            catalog.link_person(id(1), id(104), PersonRole::Writer);
            catalog.link_person(id(3), id(104), PersonRole::Director);
            catalog.link_genre(id(1), id(201));

            Self {
                catalog,
                storage: Arc::new(MemoryWatermarkStorage::new()),
                queue: Arc::new(MemoryDocumentQueue::new()),
                sink: Arc::new(MemorySink::new()),
            }
        }

        fn orchestrator(&self) -> Orchestrator {
            self.orchestrator_with(SourceConfig::defaults())
        }

        fn orchestrator_with(&self, sources: Vec<SourceConfig>) -> Orchestrator {
            let config = OrchestratorConfig {
                batch_size: 2,
                chunk_size: 2,
                poll_interval: Duration::from_secs(1),
                retry: RetryPolicy::new(Duration::from_millis(10), Duration::from_millis(100)),
            };
            Orchestrator::with_config(
                self.catalog.clone(),
                self.storage.clone(),
                self.queue.clone(),
                self.sink.clone(),
                sources,
                config,
            )
        }

        async fn watermark(&self, key: &str) -> Watermark {
            WatermarkStore::new(self.storage.clone(), RetryPolicy::default())
                .get(key)
                .await
                .unwrap()
        }
    }

    async fn reference_documents() -> Vec<Document> {
        let harness = Harness::seeded();
        let report = harness.orchestrator().run_pass().await;
        assert!(report.is_clean());
        harness.sink.documents()
    }

    #[tokio::test]
    async fn test_pass_indexes_every_film_work() {
        let harness = Harness::seeded();
        let report = harness.orchestrator().run_pass().await;

        assert!(report.is_clean());
        let film_works = report.source(SourceKind::FilmWork).unwrap();
        assert_eq!(film_works.records, 3);
        assert_eq!(film_works.batches, 2);
        assert_eq!(film_works.watermark, Watermark::new(ts(2), id(3)));

        let docs = harness.sink.documents();
        assert_eq!(docs.len(), 3);
        assert_eq!(docs[0].actors_names, vec!["Natalya", "Donatas"]);
        assert_eq!(docs[0].writers_names, vec!["Andrei"]);
        assert_eq!(docs[0].genres.len(), 1);
        assert_eq!(docs[2].directors_names, vec!["Andrei"]);
        assert_eq!(harness.queue.snapshot().len(), 0);

        assert_eq!(
            harness.watermark("film_work_producer").await,
            Watermark::new(ts(2), id(3))
        );
        assert_eq!(
            harness.watermark("person_producer").await,
            Watermark::new(ts(1), id(104))
        );
    }

    #[tokio::test]
    async fn test_second_pass_is_caught_up() {
        let harness = Harness::seeded();
        let orchestrator = harness.orchestrator();
        orchestrator.run_pass().await;
        let writes = harness.sink.write_count();

        let report = orchestrator.run_pass().await;
        assert_eq!(report.records(), 0);
        assert_eq!(report.delivery, DeliveryReport::default());
        assert_eq!(harness.sink.write_count(), writes);
    }

    #[tokio::test]
    async fn test_person_change_reindexes_linked_film_works() {
        let harness = Harness::seeded();
        let orchestrator = harness.orchestrator();
        orchestrator.run_pass().await;
        let writes = harness.sink.write_count();

        harness.catalog.touch("content.person", id(104), ts(60));
        let report = orchestrator.run_pass().await;

        let persons = report.source(SourceKind::Person).unwrap();
        assert_eq!(persons.records, 1);
        assert_eq!(persons.documents, 2);
        assert_eq!(report.delivery.delivered, 2);
        assert_eq!(harness.sink.write_count(), writes + 2);
    }

    #[tokio::test]
    async fn test_unlinked_change_still_advances() {
        let harness = Harness::seeded();
        let orchestrator = harness.orchestrator();
        orchestrator.run_pass().await;

        harness.catalog.touch("content.person", id(103), ts(70));
        let report = orchestrator.run_pass().await;

        let persons = report.source(SourceKind::Person).unwrap();
        assert_eq!(persons.records, 1);
        assert_eq!(persons.documents, 0);
        assert_eq!(
            harness.watermark("person_producer").await,
            Watermark::new(ts(70), id(103))
        );
    }

    #[tokio::test]
    async fn test_failure_after_push_replays_to_same_state() {
        let expected = reference_documents().await;

        let harness = Harness::seeded();
        let orchestrator = harness.orchestrator();

        // The first save is the film work source advancing past its first batch
        harness.storage.reject_next_saves(1);
        let report = orchestrator.run_pass().await;

        assert_eq!(report.failures.len(), 1);
        let failure = &report.failures[0];
        assert_eq!(failure.kind, SourceKind::FilmWork);
        assert_eq!(failure.state, PipelineState::Advancing);
        assert!(harness.watermark("film_work_producer").await.is_initial());

        let report = orchestrator.run_pass().await;
        assert!(report.is_clean());
        assert_eq!(report.source(SourceKind::FilmWork).unwrap().records, 3);
        assert_eq!(harness.sink.documents(), expected);
    }

    #[tokio::test]
    async fn test_failed_enqueue_leaves_watermark() {
        let harness = Harness::seeded();
        let orchestrator = harness.orchestrator();

        harness.queue.reject_next_pushes(1);
        let report = orchestrator.run_pass().await;

        let failure = &report.failures[0];
        assert_eq!(failure.state, PipelineState::Enqueuing);
        assert!(harness.watermark("film_work_producer").await.is_initial());

        orchestrator.run_pass().await;
        assert_eq!(harness.sink.documents(), reference_documents().await);
    }

    #[tokio::test]
    async fn test_failed_delivery_is_retried_next_pass() {
        let expected = reference_documents().await;
        let harness = Harness::seeded();
        let orchestrator = harness.orchestrator();

        harness.sink.reject_next_calls(1);
        let report = orchestrator.run_pass().await;
        assert!(report.delivery_error.is_some());
        assert!(!harness.queue.snapshot().is_empty());

        let report = orchestrator.run_pass().await;
        assert!(report.is_clean());
        assert!(harness.queue.snapshot().is_empty());
        assert_eq!(harness.sink.documents(), expected);
    }

    #[tokio::test]
    async fn test_failing_source_does_not_block_others() {
        let harness = Harness::seeded();
        let mut sources = vec![SourceConfig::new(
            SourceKind::Genre,
            "content.studio",
            "studio_producer",
            true,
        )];
        sources.extend(SourceConfig::defaults());

        let report = harness.orchestrator_with(sources).run_pass().await;

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].state, PipelineState::Extracting);
        assert_eq!(report.sources.len(), 3);
        assert_eq!(harness.sink.documents().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_outage_is_ridden_out() {
        let harness = Harness::seeded();
        harness.catalog.fail_next(5);
        harness.storage.fail_next(2);

        let report = harness.orchestrator().run_pass().await;
        assert!(report.is_clean());
        assert_eq!(harness.sink.documents().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_shutdown() {
        let harness = Harness::seeded();
        let orchestrator = harness.orchestrator();
        let handle = orchestrator.shutdown_handle();

        let (result, _) = tokio::join!(orchestrator.run(), async {
            tokio::time::sleep(Duration::from_millis(2500)).await;
            harness.catalog.add_film_work(id(4), "Nostalghia", ts(90));
            tokio::time::sleep(Duration::from_secs(1)).await;
            handle.trigger();
        });

        assert!(result.is_ok());
        assert_eq!(harness.sink.documents().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts_a_pass_waiting_out_an_outage() {
        let harness = Harness::seeded();
        harness.catalog.fail_next(usize::MAX);
        let orchestrator = harness.orchestrator();
        let handle = orchestrator.shutdown_handle();

        let (result, _) = tokio::join!(orchestrator.run(), async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            handle.trigger();
        });

        assert!(result.is_ok());
        assert!(harness.sink.documents().is_empty());
        assert!(harness.watermark("film_work_producer").await.is_initial());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_a_pass_at_the_next_batch() {
        let harness = Harness::seeded();
        harness.catalog.fail_next(3);
        let orchestrator = harness.orchestrator();
        let handle = orchestrator.shutdown_handle();

        let (report, _) = tokio::join!(orchestrator.run_pass(), async {
            tokio::time::sleep(Duration::from_millis(1)).await;
            handle.trigger();
        });

        assert!(report.failures.is_empty());
        assert_eq!(report.sources.len(), 1);
        let film_works = report.source(SourceKind::FilmWork).unwrap();
        assert_eq!(film_works.batches, 1);
        assert_eq!(film_works.watermark, Watermark::new(ts(2), id(2)));
        assert_eq!(
            harness.watermark("film_work_producer").await,
            Watermark::new(ts(2), id(2))
        );

        // Delivery is left to the next run
        assert_eq!(report.delivery, DeliveryReport::default());
        assert_eq!(harness.queue.snapshot().len(), 2);
        assert!(harness.sink.documents().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_index_setup_failure_is_retried_before_next_pass() {
        let harness = Harness::seeded();
        harness.sink.reject_next_setups(1);
        let orchestrator = harness.orchestrator();
        let handle = orchestrator.shutdown_handle();

        let (result, _) = tokio::join!(orchestrator.run(), async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            assert!(harness.sink.documents().is_empty());
            tokio::time::sleep(Duration::from_secs(1)).await;
            handle.trigger();
        });

        assert!(result.is_ok());
        assert_eq!(harness.sink.documents().len(), 3);
    }

    #[tokio::test]
    async fn test_shutdown_before_run_skips_passes() {
        let harness = Harness::seeded();
        let orchestrator = harness.orchestrator();
        orchestrator.shutdown();

        orchestrator.run().await.unwrap();
        assert!(harness.sink.documents().is_empty());
    }
}
