//! Ingestion pipeline orchestration.
//!
//! Coordinates the upload flow: extraction → chunking → embedding →
//! storage. Each document is written in one atomic store call, so an
//! aborted ingestion leaves nothing behind.

use std::sync::Arc;

use tracing::{info, warn};

use docvault_core::chunk::{prepare_chunks, TextSplitter};
use docvault_core::embedding::Embedder;
use docvault_core::models::{Chunk, Document, DocumentSummary, FileKind, NewChunk, NewDocument};
use docvault_core::store::DocumentStore;
use docvault_core::{Result, VaultError};

use crate::extract::Extractor;

/// One file handed to the pipeline.
#[derive(Debug, Clone)]
pub struct Upload {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub kind: FileKind,
    /// Blank titles fall back to the filename without its extension.
    pub title: String,
    pub owner_id: String,
}

/// Content stored when a document is reprocessed. Original bytes are not
/// retained, so the text cannot be re-extracted.
pub fn reprocess_placeholder(filename: &str) -> String {
    format!(
        "Document '{}' was reprocessed. The original file is not retained, so its text \
         could not be re-extracted; upload the file again to restore its searchable content.",
        filename
    )
}

fn default_title(filename: &str) -> String {
    std::path::Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or(filename)
        .to_string()
}

pub struct Ingestor {
    store: Arc<dyn DocumentStore>,
    extractor: Extractor,
    splitter: TextSplitter,
    embedder: Arc<Embedder>,
}

impl Ingestor {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        extractor: Extractor,
        splitter: TextSplitter,
        embedder: Arc<Embedder>,
    ) -> Self {
        Self {
            store,
            extractor,
            splitter,
            embedder,
        }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn embedder(&self) -> &Arc<Embedder> {
        &self.embedder
    }

    /// Split and embed content into pipeline chunks.
    async fn chunk_and_embed(&self, filename: &str, content: Option<&str>) -> Result<Vec<NewChunk>> {
        let texts = content.map(|c| self.splitter.split(c)).unwrap_or_default();
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let embeddings = self.embedder.embed_batch(&texts).await?;
        let fallbacks = embeddings.iter().filter(|e| e.fallback).count();
        if fallbacks > 0 {
            warn!(filename, fallbacks, total = texts.len(), "chunks embedded with hash fallback");
        }
        Ok(prepare_chunks(filename, texts, embeddings))
    }

    /// Extract, chunk, embed, and store one upload.
    pub async fn ingest(&self, upload: Upload) -> Result<Document> {
        let content = self.extractor.extract(&upload.bytes, upload.kind).await?;
        let chunks = self
            .chunk_and_embed(&upload.filename, content.as_deref())
            .await?;

        let title = if upload.title.trim().is_empty() {
            default_title(&upload.filename)
        } else {
            upload.title.trim().to_string()
        };

        let chunk_count = chunks.len();
        let doc = self
            .store
            .add_document(
                NewDocument {
                    title,
                    filename: upload.filename,
                    kind: upload.kind,
                    content,
                    size_bytes: upload.bytes.len() as i64,
                    owner_id: upload.owner_id,
                },
                chunks,
            )
            .await?;

        info!(
            document_id = %doc.id,
            owner = %doc.owner_id,
            kind = %doc.kind,
            chunks = chunk_count,
            "ingested document"
        );
        Ok(doc)
    }

    /// Replace a document's content with the reprocess placeholder and
    /// regenerate its chunks.
    pub async fn reprocess_document(&self, id: &str, owner_id: &str) -> Result<Document> {
        let doc = self
            .store
            .get_document(id, owner_id)
            .await?
            .ok_or_else(|| VaultError::NotFound(id.to_string()))?;

        let content = reprocess_placeholder(&doc.filename);
        let chunks = self.chunk_and_embed(&doc.filename, Some(&content)).await?;
        let chunk_count = chunks.len();
        let updated = self
            .store
            .replace_content(id, owner_id, Some(content), chunks)
            .await?;

        info!(document_id = %id, chunks = chunk_count, "reprocessed document");
        Ok(updated)
    }

    /// Delete an owned document. Missing or foreign ids are not an error.
    pub async fn delete_document(&self, id: &str, owner_id: &str) -> Result<bool> {
        let deleted = self.store.delete_document(id, owner_id).await?;
        if deleted {
            info!(document_id = %id, owner = owner_id, "deleted document");
        }
        Ok(deleted)
    }

    /// Metadata of the owner's documents, newest first.
    pub async fn list_documents(&self, owner_id: &str) -> Result<Vec<DocumentSummary>> {
        Ok(self
            .store
            .list_documents(owner_id)
            .await?
            .iter()
            .map(Document::summary)
            .collect())
    }

    /// Chunks of an owned document.
    pub async fn document_chunks(&self, id: &str, owner_id: &str) -> Result<Vec<Chunk>> {
        if self.store.get_document(id, owner_id).await?.is_none() {
            return Err(VaultError::NotFound(id.to_string()));
        }
        self.store.get_chunks(id).await
    }
}
