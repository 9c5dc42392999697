//! OpenSearch implementation of the index sink.
//!
//! This module provides a concrete implementation of `IndexSink` using
//! OpenSearch (or a wire-compatible Elasticsearch) as the backend.

mod bulk;
mod index_config;
mod sink;

pub use index_config::IndexConfig;
pub use sink::OpenSearchSink;
