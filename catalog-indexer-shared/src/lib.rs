//! # Catalog Indexer Shared
//!
//! Shared types for the catalog indexer: progress markers, extracted
//! records, flat join rows and the search documents built from them.

pub mod document;
pub mod errors;
pub mod record;
pub mod source;
pub mod watermark;

pub use document::{Document, GenreRef, PersonRef};
pub use errors::KindError;
pub use record::{FlatJoinRow, PersonRole, SourceRecord};
pub use source::{RelationKind, SourceConfig, SourceKind};
pub use watermark::Watermark;
