//! Error types for parsing shared enumerations.

use thiserror::Error;

use crate::source::SourceKind;

/// Errors raised when converting text or kinds into the shared enums.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KindError {
    /// The text does not name a known source kind.
    #[error("Unknown source kind: {0}")]
    UnknownSource(String),

    /// The text does not name a known person role.
    #[error("Unknown person role: {0}")]
    UnknownRole(String),

    /// The source kind has no association table to reverse-join through.
    #[error("Source kind '{0}' does not support relation enrichment")]
    UnsupportedRelation(SourceKind),
}
