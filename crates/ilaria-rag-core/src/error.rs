//! Error taxonomy for the retrieval pipeline.
//!
//! Errors from the document and index layer are fatal to startup: a broken
//! knowledge base must not quietly serve empty answers. Errors from the
//! per-query embedding and generation calls propagate to the caller, which
//! decides how to present them.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by chunking, indexing, and answering.
#[derive(Debug, Error)]
pub enum RagError {
    /// The configured source document does not exist.
    #[error("document not found: {}", path.display())]
    DocumentNotFound { path: PathBuf },

    /// The query was empty or whitespace only.
    #[error("query must not be empty")]
    EmptyQuery,

    /// A persisted index snapshot could not be decoded.
    #[error("index snapshot at {} is corrupt: {reason}", path.display())]
    IndexLoadCorrupt { path: PathBuf, reason: String },

    /// A vector does not have the dimension the index was built with.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Texts, vectors, and metadata handed to the index differ in length.
    #[error("length mismatch: {texts} texts, {vectors} vectors, {metadatas} metadata entries")]
    LengthMismatch {
        texts: usize,
        vectors: usize,
        metadatas: usize,
    },

    /// The embedding capability failed.
    #[error("embedding failed: {0}")]
    Embedding(#[source] anyhow::Error),

    /// The language model capability failed.
    #[error("generation failed: {0}")]
    Generation(#[source] anyhow::Error),

    /// Filesystem access failed.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RagError {
    /// Whether this error comes from the document/index layer and must
    /// abort startup rather than degrade the service.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RagError::DocumentNotFound { .. }
                | RagError::IndexLoadCorrupt { .. }
                | RagError::DimensionMismatch { .. }
                | RagError::LengthMismatch { .. }
                | RagError::Io { .. }
        )
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RagError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result alias for core operations.
pub type Result<T> = std::result::Result<T, RagError>;
