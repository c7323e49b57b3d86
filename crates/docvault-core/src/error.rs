//! Error kinds surfaced by the ingestion and retrieval pipeline.
//!
//! Collaborator failures (PDF/OCR libraries, embedding backends, the
//! database driver) are wrapped into one of these kinds at the component
//! boundary, with the original error kept as the `source`.

use thiserror::Error;

use crate::models::FileKind;

/// Boxed cause attached to wrapped collaborator failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors returned by core operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// The declared file kind is not one of `pdf`, `txt`, `image`.
    #[error("unsupported file kind: '{0}' (expected pdf, txt, or image)")]
    UnsupportedFileKind(String),

    /// The PDF or OCR collaborator failed for an otherwise supported kind.
    #[error("{kind} extraction failed: {source}")]
    ExtractionFailed {
        /// The kind being extracted.
        kind: FileKind,
        /// The collaborator's error.
        #[source]
        source: BoxError,
    },

    /// Every embedding provider failed and the hash fallback is disabled.
    #[error("no embedding backend available: {0}")]
    EmbeddingUnavailable(String),

    /// The document does not exist or belongs to another owner.
    #[error("document not found: {0}")]
    NotFound(String),

    /// A failure while writing a document and its chunks.
    #[error("ingestion failed: {source}")]
    IngestionFailed {
        #[source]
        source: BoxError,
    },

    /// A failure while reading from the store.
    #[error("storage error: {source}")]
    Storage {
        #[source]
        source: BoxError,
    },

    /// Invalid chunker or embedder parameters.
    #[error("configuration error: {0}")]
    Config(String),
}

impl VaultError {
    pub fn extraction(kind: FileKind, source: impl Into<BoxError>) -> Self {
        VaultError::ExtractionFailed {
            kind,
            source: source.into(),
        }
    }

    pub fn ingestion(source: impl Into<BoxError>) -> Self {
        VaultError::IngestionFailed {
            source: source.into(),
        }
    }

    pub fn storage(source: impl Into<BoxError>) -> Self {
        VaultError::Storage {
            source: source.into(),
        }
    }
}

/// A convenience result type for core operations.
pub type Result<T> = std::result::Result<T, VaultError>;
