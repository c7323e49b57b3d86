//! SQLite-backed [`DocumentStore`] implementation.
//!
//! Documents and chunks live in two tables; `chunks.document_id` references
//! `documents(id) ON DELETE CASCADE`, so deleting a document removes its
//! chunks. Embeddings are stored as little-endian f32 BLOBs and cosine
//! similarity is computed in process.

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use tracing::debug;
use uuid::Uuid;

use docvault_core::chunk::make_chunk;
use docvault_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use docvault_core::models::{
    Chunk, ChunkMetadata, Document, FileKind, NewChunk, NewDocument, SearchResult,
};
use docvault_core::store::DocumentStore;
use docvault_core::{Result, VaultError};

/// SQLite implementation of the [`DocumentStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

const DOCUMENT_COLUMNS: &str =
    "id, owner_id, title, filename, kind, content, size_bytes, created_at";

fn row_to_document(row: &SqliteRow) -> Result<Document> {
    let kind: String = row.try_get("kind").map_err(VaultError::storage)?;
    Ok(Document {
        id: row.try_get("id").map_err(VaultError::storage)?,
        owner_id: row.try_get("owner_id").map_err(VaultError::storage)?,
        title: row.try_get("title").map_err(VaultError::storage)?,
        filename: row.try_get("filename").map_err(VaultError::storage)?,
        kind: kind.parse::<FileKind>().map_err(VaultError::storage)?,
        content: row.try_get("content").map_err(VaultError::storage)?,
        size_bytes: row.try_get("size_bytes").map_err(VaultError::storage)?,
        created_at: row.try_get("created_at").map_err(VaultError::storage)?,
    })
}

fn row_to_chunk(row: &SqliteRow) -> Result<Chunk> {
    let blob: Vec<u8> = row.try_get("embedding").map_err(VaultError::storage)?;
    let metadata_json: String = row.try_get("metadata_json").map_err(VaultError::storage)?;
    let metadata: ChunkMetadata =
        serde_json::from_str(&metadata_json).map_err(VaultError::storage)?;
    Ok(Chunk {
        id: row.try_get("chunk_id").map_err(VaultError::storage)?,
        document_id: row.try_get("document_id").map_err(VaultError::storage)?,
        chunk_index: row.try_get("chunk_index").map_err(VaultError::storage)?,
        text: row.try_get("text").map_err(VaultError::storage)?,
        embedding: blob_to_vec(&blob),
        metadata,
        hash: row.try_get("hash").map_err(VaultError::storage)?,
        created_at: row.try_get("chunk_created_at").map_err(VaultError::storage)?,
    })
}

/// Insert chunks for a document inside an open transaction.
async fn insert_chunks(
    tx: &mut Transaction<'_, Sqlite>,
    document_id: &str,
    chunks: Vec<NewChunk>,
    created_at: i64,
) -> std::result::Result<usize, Box<dyn std::error::Error + Send + Sync>> {
    let count = chunks.len();
    for (i, new_chunk) in chunks.into_iter().enumerate() {
        let chunk = make_chunk(document_id, i as i64, new_chunk, created_at);
        let metadata_json = serde_json::to_string(&chunk.metadata)?;
        sqlx::query(
            r#"
            INSERT INTO chunks (id, document_id, chunk_index, text, embedding, dims,
                                metadata_json, hash, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&chunk.id)
        .bind(&chunk.document_id)
        .bind(chunk.chunk_index)
        .bind(&chunk.text)
        .bind(vec_to_blob(&chunk.embedding))
        .bind(chunk.embedding.len() as i64)
        .bind(&metadata_json)
        .bind(&chunk.hash)
        .bind(chunk.created_at)
        .execute(&mut **tx)
        .await?;
    }
    Ok(count)
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn add_document(&self, doc: NewDocument, chunks: Vec<NewChunk>) -> Result<Document> {
        let document = Document {
            id: Uuid::new_v4().to_string(),
            title: doc.title,
            filename: doc.filename,
            kind: doc.kind,
            content: doc.content,
            size_bytes: doc.size_bytes,
            created_at: chrono::Utc::now().timestamp_millis(),
            owner_id: doc.owner_id,
        };

        let mut tx = self.pool.begin().await.map_err(VaultError::ingestion)?;

        sqlx::query(
            r#"
            INSERT INTO documents (id, owner_id, title, filename, kind, content,
                                   size_bytes, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&document.id)
        .bind(&document.owner_id)
        .bind(&document.title)
        .bind(&document.filename)
        .bind(document.kind.as_str())
        .bind(&document.content)
        .bind(document.size_bytes)
        .bind(document.created_at)
        .execute(&mut *tx)
        .await
        .map_err(VaultError::ingestion)?;

        let count = insert_chunks(&mut tx, &document.id, chunks, document.created_at)
            .await
            .map_err(VaultError::ingestion)?;

        tx.commit().await.map_err(VaultError::ingestion)?;
        debug!(document_id = %document.id, chunks = count, "stored document");
        Ok(document)
    }

    async fn list_documents(&self, owner_id: &str) -> Result<Vec<Document>> {
        let rows = sqlx::query(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE owner_id = ? \
             ORDER BY created_at DESC, rowid DESC"
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(VaultError::storage)?;

        rows.iter().map(row_to_document).collect()
    }

    async fn get_document(&self, id: &str, owner_id: &str) -> Result<Option<Document>> {
        let row = sqlx::query(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ? AND owner_id = ?"
        ))
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(VaultError::storage)?;

        row.as_ref().map(row_to_document).transpose()
    }

    async fn delete_document(&self, id: &str, owner_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ? AND owner_id = ?")
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await
            .map_err(VaultError::storage)?;
        Ok(result.rows_affected() > 0)
    }

    async fn replace_content(
        &self,
        id: &str,
        owner_id: &str,
        content: Option<String>,
        chunks: Vec<NewChunk>,
    ) -> Result<Document> {
        let mut tx = self.pool.begin().await.map_err(VaultError::ingestion)?;

        let updated = sqlx::query("UPDATE documents SET content = ? WHERE id = ? AND owner_id = ?")
            .bind(&content)
            .bind(id)
            .bind(owner_id)
            .execute(&mut *tx)
            .await
            .map_err(VaultError::ingestion)?;
        if updated.rows_affected() == 0 {
            return Err(VaultError::NotFound(id.to_string()));
        }

        sqlx::query("DELETE FROM chunks WHERE document_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(VaultError::ingestion)?;

        let now = chrono::Utc::now().timestamp_millis();
        insert_chunks(&mut tx, id, chunks, now)
            .await
            .map_err(VaultError::ingestion)?;

        let row = sqlx::query(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?"
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(VaultError::ingestion)?;
        let document = row_to_document(&row)?;

        tx.commit().await.map_err(VaultError::ingestion)?;
        Ok(document)
    }

    async fn get_chunks(&self, document_id: &str) -> Result<Vec<Chunk>> {
        let rows = sqlx::query(
            r#"
            SELECT id AS chunk_id, document_id, chunk_index, text, embedding,
                   metadata_json, hash, created_at AS chunk_created_at
            FROM chunks
            WHERE document_id = ?
            ORDER BY chunk_index ASC
            "#,
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await
        .map_err(VaultError::storage)?;

        rows.iter().map(row_to_chunk).collect()
    }

    async fn similarity_candidates(
        &self,
        owner_id: &str,
        query_vec: &[f32],
    ) -> Result<Vec<SearchResult>> {
        let rows = sqlx::query(
            r#"
            SELECT d.id, d.owner_id, d.title, d.filename, d.kind, d.content,
                   d.size_bytes, d.created_at,
                   c.id AS chunk_id, c.document_id, c.chunk_index, c.text,
                   c.embedding, c.metadata_json, c.hash,
                   c.created_at AS chunk_created_at
            FROM chunks c
            JOIN documents d ON d.id = c.document_id
            WHERE d.owner_id = ?
            ORDER BY d.created_at ASC, d.rowid ASC, c.chunk_index ASC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(VaultError::storage)?;

        rows.iter()
            .map(|row| {
                let chunk = row_to_chunk(row)?;
                let document = row_to_document(row)?;
                Ok(SearchResult {
                    similarity: cosine_similarity(query_vec, &chunk.embedding),
                    chunk,
                    document,
                })
            })
            .collect()
    }
}
