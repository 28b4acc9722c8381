//! Shared error taxonomy for the pipeline.
//!
//! Each fallible boundary maps its failures to exactly one variant so that
//! degraded-output behavior (empty search results, error-text answers) stays
//! observable in tests rather than hiding behind a catch-all.

use thiserror::Error;

/// Errors produced by the chunking, retrieval, and synthesis pipeline.
#[derive(Debug, Error)]
pub enum LoreError {
    /// Invalid chunking or engine configuration. Fatal: raised before any
    /// work is done and never converted into a degraded result.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The embedding provider failed or was unreachable.
    #[error("embedding provider unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// The completion provider failed or was unreachable.
    #[error("completion provider unavailable: {0}")]
    CompletionUnavailable(String),

    /// The vector index rejected or failed an operation.
    #[error("vector index error: {0}")]
    Index(String),

    /// The metadata store collaborator failed a lookup.
    #[error("document store error: {0}")]
    Storage(String),
}
