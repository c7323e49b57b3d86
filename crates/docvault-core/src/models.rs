//! Core data models used throughout docvault.
//!
//! These types represent the documents, chunks, and search results that
//! flow through the ingestion and retrieval pipeline.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::VaultError;

/// MIME types accepted at the upload boundary.
pub const SUPPORTED_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "text/plain",
    "image/jpeg",
    "image/png",
    "image/webp",
];

/// Largest accepted upload, in bytes (10 MiB).
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// The closed set of file kinds the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Pdf,
    Txt,
    Image,
}

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Pdf => "pdf",
            FileKind::Txt => "txt",
            FileKind::Image => "image",
        }
    }

    /// Map a MIME type from the supported set to a kind.
    pub fn from_mime(mime: &str) -> Result<Self, VaultError> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "application/pdf" => Ok(FileKind::Pdf),
            "text/plain" => Ok(FileKind::Txt),
            "image/jpeg" | "image/png" | "image/webp" => Ok(FileKind::Image),
            other => Err(VaultError::UnsupportedFileKind(other.to_string())),
        }
    }

    /// Infer the kind from a filename extension.
    pub fn from_path(path: &Path) -> Result<Self, VaultError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "pdf" => Ok(FileKind::Pdf),
            "txt" => Ok(FileKind::Txt),
            "jpg" | "jpeg" | "png" | "webp" => Ok(FileKind::Image),
            _ => Err(VaultError::UnsupportedFileKind(path.display().to_string())),
        }
    }
}

impl FromStr for FileKind {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pdf" => Ok(FileKind::Pdf),
            "txt" => Ok(FileKind::Txt),
            "image" => Ok(FileKind::Image),
            other => Err(VaultError::UnsupportedFileKind(other.to_string())),
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One uploaded artifact, owned by exactly one identity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub filename: String,
    pub kind: FileKind,
    /// Extracted text. `None` when extraction recognized nothing.
    pub content: Option<String>,
    pub size_bytes: i64,
    /// Unix timestamp in milliseconds.
    pub created_at: i64,
    pub owner_id: String,
}

impl Document {
    /// Metadata-only view exposed by list endpoints.
    pub fn summary(&self) -> DocumentSummary {
        DocumentSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            filename: self.filename.clone(),
            kind: self.kind,
            created_at: format_ts_iso(self.created_at),
        }
    }
}

/// Document metadata without content or embeddings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentSummary {
    pub id: String,
    pub title: String,
    pub filename: String,
    pub kind: FileKind,
    /// ISO 8601 upload time.
    pub created_at: String,
}

/// Fields of a document before it is persisted.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub title: String,
    pub filename: String,
    pub kind: FileKind,
    pub content: Option<String>,
    pub size_bytes: i64,
    pub owner_id: String,
}

/// Per-chunk metadata, stored as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Filename of the parent document.
    pub source: String,
    /// Length of the chunk text in characters.
    pub chunk_length: usize,
    pub total_chunks: usize,
    /// True when the embedding came from the hash fallback.
    pub fallback: bool,
    /// Model that produced the embedding.
    pub model: String,
}

/// A chunk of a document's text with its embedding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub chunk_index: i64,
    pub text: String,
    #[serde(skip_serializing)]
    pub embedding: Vec<f32>,
    pub metadata: ChunkMetadata,
    /// SHA-256 of `text`.
    pub hash: String,
    pub created_at: i64,
}

/// A chunk produced by the pipeline, not yet assigned an id or ordinal.
#[derive(Debug, Clone, PartialEq)]
pub struct NewChunk {
    pub text: String,
    pub embedding: Vec<f32>,
    pub metadata: ChunkMetadata,
}

/// A chunk, its parent document, and its similarity to a query.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub chunk: Chunk,
    pub document: Document,
    /// Cosine similarity in `[-1.0, 1.0]`.
    pub similarity: f32,
}

/// Format a millisecond timestamp as ISO 8601.
pub fn format_ts_iso(ts_millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ts_millis)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts_millis.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parse_case_insensitive() {
        assert_eq!("PDF".parse::<FileKind>().unwrap(), FileKind::Pdf);
        assert_eq!(" image ".parse::<FileKind>().unwrap(), FileKind::Image);
    }

    #[test]
    fn test_kind_parse_unknown() {
        let err = "docx".parse::<FileKind>().unwrap_err();
        assert!(matches!(err, VaultError::UnsupportedFileKind(k) if k == "docx"));
    }

    #[test]
    fn test_kind_from_mime() {
        for mime in SUPPORTED_MIME_TYPES {
            assert!(FileKind::from_mime(mime).is_ok(), "{} rejected", mime);
        }
        assert_eq!(FileKind::from_mime("image/webp").unwrap(), FileKind::Image);
        assert!(FileKind::from_mime("application/zip").is_err());
    }

    #[test]
    fn test_kind_from_path() {
        assert_eq!(
            FileKind::from_path(Path::new("notes/Guide.PDF")).unwrap(),
            FileKind::Pdf
        );
        assert_eq!(
            FileKind::from_path(Path::new("scan.jpeg")).unwrap(),
            FileKind::Image
        );
        assert!(FileKind::from_path(Path::new("README")).is_err());
    }

    #[test]
    fn test_summary_hides_content() {
        let doc = Document {
            id: "d1".to_string(),
            title: "Lease".to_string(),
            filename: "lease.txt".to_string(),
            kind: FileKind::Txt,
            content: Some("secret terms".to_string()),
            size_bytes: 12,
            created_at: 0,
            owner_id: "u1".to_string(),
        };
        let json = serde_json::to_value(doc.summary()).unwrap();
        assert!(json.get("content").is_none());
        assert_eq!(json["kind"], "txt");
        assert_eq!(json["created_at"], "1970-01-01T00:00:00Z");
    }
}
