//! # Catalog Indexer Pipeline
//!
//! This crate provides the pipeline components that keep the search index in
//! step with the catalog database.
//!
//! ## Architecture
//!
//! Each pass walks every configured source through the same stages:
//!
//! 1. **Extractor**: Reads rows changed since the source's watermark
//! 2. **Enricher**: Maps changed persons and genres to their film works
//! 3. **Merger**: Fetches the joined rows of the affected film works
//! 4. **Transformer**: Folds joined rows into search documents
//! 5. **Bridge**: Queues documents durably and delivers them to the index
//! 6. **Orchestrator**: Runs the stages and advances watermarks
//!
//! Every external call is retried through [`RetryPolicy`] when it fails
//! transiently.

pub mod backoff;
pub mod bridge;
pub mod enricher;
pub mod errors;
pub mod extractor;
pub mod merger;
pub mod orchestrator;
pub mod transformer;
pub mod watermark;

pub use backoff::{BackoffDelay, BackoffSchedule, RetryPolicy};
pub use bridge::{DeliveryReport, QueueBridge};
pub use enricher::RelationEnricher;
pub use errors::PipelineError;
pub use extractor::ChangeExtractor;
pub use merger::DocumentMerger;
pub use orchestrator::{
    Orchestrator, OrchestratorConfig, PassReport, PipelineState, ShutdownHandle, SourceFailure,
    SourceReport,
};
pub use transformer::DocumentTransformer;
pub use watermark::{WatermarkState, WatermarkStore};
