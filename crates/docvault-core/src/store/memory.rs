//! In-memory [`DocumentStore`] implementation for tests and embedding.
//!
//! All state sits behind one `std::sync::RwLock`, so every write (including
//! a document together with its chunks) is a single critical section.
//! Similarity is brute-force cosine over the owner's chunks.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use crate::chunk::make_chunk;
use crate::embedding::cosine_similarity;
use crate::error::{Result, VaultError};
use crate::models::{Chunk, Document, NewChunk, NewDocument, SearchResult};

use super::DocumentStore;

struct StoredDoc {
    seq: u64,
    doc: Document,
    chunks: Vec<Chunk>,
}

#[derive(Default)]
struct State {
    next_seq: u64,
    docs: Vec<StoredDoc>,
}

/// In-memory store.
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| VaultError::storage("in-memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| VaultError::storage("in-memory store lock poisoned"))
    }
}

fn build_chunks(document_id: &str, chunks: Vec<NewChunk>, created_at: i64) -> Vec<Chunk> {
    chunks
        .into_iter()
        .enumerate()
        .map(|(i, c)| make_chunk(document_id, i as i64, c, created_at))
        .collect()
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn add_document(&self, doc: NewDocument, chunks: Vec<NewChunk>) -> Result<Document> {
        let now = chrono::Utc::now().timestamp_millis();
        let id = Uuid::new_v4().to_string();
        let document = Document {
            id: id.clone(),
            title: doc.title,
            filename: doc.filename,
            kind: doc.kind,
            content: doc.content,
            size_bytes: doc.size_bytes,
            created_at: now,
            owner_id: doc.owner_id,
        };
        let chunks = build_chunks(&id, chunks, now);

        let mut state = self
            .state
            .write()
            .map_err(|_| VaultError::ingestion("in-memory store lock poisoned"))?;
        let seq = state.next_seq;
        state.next_seq += 1;
        debug!(document_id = %id, chunks = chunks.len(), "stored document in memory");
        state.docs.push(StoredDoc {
            seq,
            doc: document.clone(),
            chunks,
        });
        Ok(document)
    }

    async fn list_documents(&self, owner_id: &str) -> Result<Vec<Document>> {
        let state = self.read()?;
        let mut owned: Vec<&StoredDoc> = state
            .docs
            .iter()
            .filter(|s| s.doc.owner_id == owner_id)
            .collect();
        owned.sort_by(|a, b| {
            b.doc
                .created_at
                .cmp(&a.doc.created_at)
                .then(b.seq.cmp(&a.seq))
        });
        Ok(owned.into_iter().map(|s| s.doc.clone()).collect())
    }

    async fn get_document(&self, id: &str, owner_id: &str) -> Result<Option<Document>> {
        let state = self.read()?;
        Ok(state
            .docs
            .iter()
            .find(|s| s.doc.id == id && s.doc.owner_id == owner_id)
            .map(|s| s.doc.clone()))
    }

    async fn delete_document(&self, id: &str, owner_id: &str) -> Result<bool> {
        let mut state = self.write()?;
        let before = state.docs.len();
        state
            .docs
            .retain(|s| !(s.doc.id == id && s.doc.owner_id == owner_id));
        Ok(state.docs.len() != before)
    }

    async fn replace_content(
        &self,
        id: &str,
        owner_id: &str,
        content: Option<String>,
        chunks: Vec<NewChunk>,
    ) -> Result<Document> {
        let mut state = self.write()?;
        let stored = state
            .docs
            .iter_mut()
            .find(|s| s.doc.id == id && s.doc.owner_id == owner_id)
            .ok_or_else(|| VaultError::NotFound(id.to_string()))?;

        let now = chrono::Utc::now().timestamp_millis();
        stored.doc.content = content;
        stored.chunks = build_chunks(id, chunks, now);
        Ok(stored.doc.clone())
    }

    async fn get_chunks(&self, document_id: &str) -> Result<Vec<Chunk>> {
        let state = self.read()?;
        Ok(state
            .docs
            .iter()
            .find(|s| s.doc.id == document_id)
            .map(|s| s.chunks.clone())
            .unwrap_or_default())
    }

    async fn similarity_candidates(
        &self,
        owner_id: &str,
        query_vec: &[f32],
    ) -> Result<Vec<SearchResult>> {
        let state = self.read()?;
        let mut owned: Vec<&StoredDoc> = state
            .docs
            .iter()
            .filter(|s| s.doc.owner_id == owner_id)
            .collect();
        owned.sort_by(|a, b| {
            a.doc
                .created_at
                .cmp(&b.doc.created_at)
                .then(a.seq.cmp(&b.seq))
        });

        Ok(owned
            .into_iter()
            .flat_map(|s| {
                s.chunks.iter().map(move |c| SearchResult {
                    similarity: cosine_similarity(query_vec, &c.embedding),
                    chunk: c.clone(),
                    document: s.doc.clone(),
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChunkMetadata, FileKind};

    fn new_doc(owner: &str, title: &str) -> NewDocument {
        NewDocument {
            title: title.to_string(),
            filename: format!("{}.txt", title),
            kind: FileKind::Txt,
            content: Some(format!("{} body", title)),
            size_bytes: 10,
            owner_id: owner.to_string(),
        }
    }

    fn new_chunk(text: &str, vector: Vec<f32>) -> NewChunk {
        NewChunk {
            text: text.to_string(),
            metadata: ChunkMetadata {
                source: "t.txt".to_string(),
                chunk_length: text.chars().count(),
                total_chunks: 1,
                fallback: false,
                model: "test".to_string(),
            },
            embedding: vector,
        }
    }

    #[tokio::test]
    async fn test_add_assigns_ordinals() {
        let store = InMemoryStore::new();
        let doc = store
            .add_document(
                new_doc("u1", "a"),
                vec![new_chunk("one", vec![1.0, 0.0]), new_chunk("two", vec![0.0, 1.0])],
            )
            .await
            .unwrap();

        let chunks = store.get_chunks(&doc.id).await.unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[1].chunk_index, 1);
        assert_eq!(chunks[1].text, "two");
        assert!(chunks.iter().all(|c| c.document_id == doc.id));
    }

    #[tokio::test]
    async fn test_list_newest_first_and_owner_scoped() {
        let store = InMemoryStore::new();
        let first = store.add_document(new_doc("u1", "first"), vec![]).await.unwrap();
        let second = store.add_document(new_doc("u1", "second"), vec![]).await.unwrap();
        store.add_document(new_doc("u2", "other"), vec![]).await.unwrap();

        let docs = store.list_documents("u1").await.unwrap();
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec![second.id.as_str(), first.id.as_str()]);
    }

    #[tokio::test]
    async fn test_foreign_get_and_delete() {
        let store = InMemoryStore::new();
        let doc = store
            .add_document(new_doc("u1", "a"), vec![new_chunk("x", vec![1.0])])
            .await
            .unwrap();

        assert!(store.get_document(&doc.id, "u2").await.unwrap().is_none());
        assert!(!store.delete_document(&doc.id, "u2").await.unwrap());
        assert!(store.get_document(&doc.id, "u1").await.unwrap().is_some());

        assert!(store.delete_document(&doc.id, "u1").await.unwrap());
        assert!(store.list_documents("u1").await.unwrap().is_empty());
        assert!(store.get_chunks(&doc.id).await.unwrap().is_empty());
        assert!(!store.delete_document("missing", "u1").await.unwrap());
    }

    #[tokio::test]
    async fn test_replace_content() {
        let store = InMemoryStore::new();
        let doc = store
            .add_document(
                new_doc("u1", "a"),
                vec![new_chunk("old one", vec![1.0]), new_chunk("old two", vec![1.0])],
            )
            .await
            .unwrap();

        let updated = store
            .replace_content(
                &doc.id,
                "u1",
                Some("fresh".to_string()),
                vec![new_chunk("fresh", vec![1.0])],
            )
            .await
            .unwrap();
        assert_eq!(updated.content.as_deref(), Some("fresh"));
        assert_eq!(updated.owner_id, "u1");

        let chunks = store.get_chunks(&doc.id).await.unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "fresh");
        assert_eq!(chunks[0].chunk_index, 0);

        let err = store
            .replace_content(&doc.id, "u2", None, vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_similarity_candidates_owner_scoped_in_order() {
        let store = InMemoryStore::new();
        store
            .add_document(
                new_doc("u1", "a"),
                vec![new_chunk("a0", vec![1.0, 0.0]), new_chunk("a1", vec![0.0, 1.0])],
            )
            .await
            .unwrap();
        store
            .add_document(new_doc("u2", "b"), vec![new_chunk("b0", vec![1.0, 0.0])])
            .await
            .unwrap();

        let cands = store.similarity_candidates("u1", &[1.0, 0.0]).await.unwrap();
        let texts: Vec<&str> = cands.iter().map(|c| c.chunk.text.as_str()).collect();
        assert_eq!(texts, vec!["a0", "a1"]);
        assert!((cands[0].similarity - 1.0).abs() < 1e-6);
        assert!(cands[1].similarity.abs() < 1e-6);
        assert!(cands.iter().all(|c| c.document.owner_id == "u1"));
    }
}
