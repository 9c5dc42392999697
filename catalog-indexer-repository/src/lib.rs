//! # Catalog Indexer Repository
//!
//! This crate provides traits and implementations for every external system
//! the catalog indexer touches: the PostgreSQL catalog, Redis (watermarks
//! and the document queue) and the search engine. It also ships in-memory
//! implementations of each trait.

pub mod errors;
pub mod interfaces;
pub mod memory;
pub mod postgres;
pub mod redis_store;
pub mod search;
pub mod types;

pub use errors::{RepositoryError, SearchError};
pub use interfaces::{
    CatalogSource, ChangeSource, DocumentQueue, FlatRowSource, IndexSink, RelationSource,
    WatermarkStorage,
};
pub use postgres::{validate_table_name, PgCatalog};
pub use redis_store::{RedisDocumentQueue, RedisWatermarkStorage};
pub use search::{IndexConfig, OpenSearchSink};
pub use types::BulkUpsertSummary;
