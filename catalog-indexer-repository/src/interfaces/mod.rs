//! Interface definitions for every external system the pipeline talks to.
//!
//! Each seam is an `async_trait` so that the PostgreSQL, Redis and OpenSearch
//! backends can be swapped for the in-memory implementations in tests.

mod catalog_source;
mod document_queue;
mod index_sink;
mod watermark_storage;

pub use catalog_source::{CatalogSource, ChangeSource, FlatRowSource, RelationSource};
pub use document_queue::DocumentQueue;
pub use index_sink::IndexSink;
pub use watermark_storage::WatermarkStorage;
