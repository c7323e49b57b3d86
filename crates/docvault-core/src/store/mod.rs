//! Storage abstraction for docvault.
//!
//! The [`DocumentStore`] trait defines every persistence operation the
//! ingestion and retrieval pipeline needs, so that the SQLite backend in the
//! app crate and the [`memory::InMemoryStore`] used by tests are
//! interchangeable behind an `Arc<dyn DocumentStore>`.
//!
//! Every operation except [`get_chunks`](DocumentStore::get_chunks) is
//! scoped to an owner: documents belonging to another owner behave exactly
//! like documents that do not exist.

pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Chunk, Document, NewChunk, NewDocument, SearchResult};

/// Abstract storage backend.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`add_document`](DocumentStore::add_document) | Atomically insert a document and its chunks |
/// | [`list_documents`](DocumentStore::list_documents) | Owner's documents, newest first |
/// | [`get_document`](DocumentStore::get_document) | One owned document |
/// | [`delete_document`](DocumentStore::delete_document) | Delete an owned document and its chunks |
/// | [`replace_content`](DocumentStore::replace_content) | Swap a document's text and chunk set |
/// | [`get_chunks`](DocumentStore::get_chunks) | A document's chunks by ordinal |
/// | [`similarity_candidates`](DocumentStore::similarity_candidates) | Score every owned chunk against a vector |
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Persist a document and its chunks in one atomic step.
    ///
    /// The store assigns the document id, the creation timestamp, chunk ids
    /// and ordinals (in the order given). On failure nothing is visible and
    /// the error is [`VaultError::IngestionFailed`](crate::VaultError::IngestionFailed).
    async fn add_document(&self, doc: NewDocument, chunks: Vec<NewChunk>) -> Result<Document>;

    /// Documents of `owner_id`, newest first. Ties keep later insertions first.
    async fn list_documents(&self, owner_id: &str) -> Result<Vec<Document>>;

    /// The document with `id` if it belongs to `owner_id`.
    async fn get_document(&self, id: &str, owner_id: &str) -> Result<Option<Document>>;

    /// Delete the document and all its chunks if `owner_id` owns it.
    ///
    /// Returns whether anything was deleted. Missing or foreign ids are not
    /// an error.
    async fn delete_document(&self, id: &str, owner_id: &str) -> Result<bool>;

    /// Overwrite a document's content and atomically replace its chunks.
    ///
    /// Returns [`VaultError::NotFound`](crate::VaultError::NotFound) if the
    /// document is absent or foreign.
    async fn replace_content(
        &self,
        id: &str,
        owner_id: &str,
        content: Option<String>,
        chunks: Vec<NewChunk>,
    ) -> Result<Document>;

    /// Chunks of a document ordered by ordinal. Not owner-scoped.
    async fn get_chunks(&self, document_id: &str) -> Result<Vec<Chunk>>;

    /// Every chunk of the owner's documents with its cosine similarity to
    /// `query_vec`, in insertion order (documents by creation, chunks by
    /// ordinal). Filtering and ranking are left to the caller.
    async fn similarity_candidates(
        &self,
        owner_id: &str,
        query_vec: &[f32],
    ) -> Result<Vec<SearchResult>>;
}
