//! Document commands: `add`, `list`, `chunks`, `delete`, `reprocess`.
//!
//! These stand in for the upload, list, delete, and reprocess endpoints.
//! Output goes to stdout; logs go to stderr.

use std::path::Path;

use anyhow::{bail, Context, Result};

use docvault_core::models::{FileKind, MAX_UPLOAD_BYTES};

use crate::config::Config;
use crate::ingest::Upload;
use crate::vault::Vault;

/// Resolve the file kind for an upload. An explicit kind (`pdf`, `txt`,
/// `image`) or MIME type wins over the filename extension.
pub fn resolve_kind(path: &Path, declared: Option<&str>) -> Result<FileKind> {
    let kind = match declared {
        Some(d) if d.contains('/') => FileKind::from_mime(d)?,
        Some(d) => d.parse::<FileKind>()?,
        None => FileKind::from_path(path)?,
    };
    Ok(kind)
}

/// Enforce the upload size limit.
pub fn check_upload_size(path: &Path, size: u64) -> Result<()> {
    if size > MAX_UPLOAD_BYTES {
        bail!(
            "{} is {} bytes; the upload limit is {} bytes (10 MiB)",
            path.display(),
            size,
            MAX_UPLOAD_BYTES
        );
    }
    Ok(())
}

pub async fn run_add(
    config: &Config,
    path: &Path,
    owner_id: &str,
    title: Option<String>,
    kind: Option<String>,
) -> Result<()> {
    let kind = resolve_kind(path, kind.as_deref())?;
    let size = std::fs::metadata(path)
        .with_context(|| format!("Failed to read {}", path.display()))?
        .len();
    check_upload_size(path, size)?;

    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload")
        .to_string();

    let vault = Vault::open(config).await?;
    let result = vault
        .ingestor
        .ingest(Upload {
            bytes,
            filename,
            kind,
            title: title.unwrap_or_default(),
            owner_id: owner_id.to_string(),
        })
        .await;
    let doc = match result {
        Ok(doc) => doc,
        Err(e) => {
            vault.close().await;
            return Err(e.into());
        }
    };
    let chunk_count = vault.ingestor.store().get_chunks(&doc.id).await?.len();
    vault.close().await;

    println!("added {}", doc.id);
    println!("  title: {}", doc.title);
    println!("  kind: {}", doc.kind);
    println!("  bytes: {}", doc.size_bytes);
    println!("  chunks: {}", chunk_count);
    if doc.content.is_none() {
        println!("  content: none (no text recognized)");
    }
    Ok(())
}

pub async fn run_list(config: &Config, owner_id: &str, json: bool) -> Result<()> {
    let vault = Vault::open(config).await?;
    let docs = vault.ingestor.list_documents(owner_id).await?;
    vault.close().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&docs)?);
        return Ok(());
    }
    if docs.is_empty() {
        println!("No documents.");
        return Ok(());
    }
    for doc in &docs {
        println!(
            "{}  {:<5}  {}  {} ({})",
            doc.id, doc.kind, doc.created_at, doc.title, doc.filename
        );
    }
    Ok(())
}

pub async fn run_chunks(config: &Config, id: &str, owner_id: &str) -> Result<()> {
    let vault = Vault::open(config).await?;
    let chunks = vault.ingestor.document_chunks(id, owner_id).await;
    vault.close().await;
    let chunks = chunks?;

    println!("--- Chunks ({}) ---", chunks.len());
    for chunk in &chunks {
        println!(
            "[chunk {}] {} chars, model {}{}",
            chunk.chunk_index,
            chunk.metadata.chunk_length,
            chunk.metadata.model,
            if chunk.metadata.fallback { " (fallback)" } else { "" }
        );
        println!("{}", chunk.text);
        println!();
    }
    Ok(())
}

pub async fn run_delete(config: &Config, id: &str, owner_id: &str) -> Result<()> {
    let vault = Vault::open(config).await?;
    vault.ingestor.delete_document(id, owner_id).await?;
    vault.close().await;
    // Missing and foreign ids report the same outcome.
    println!("deleted {}", id);
    Ok(())
}

pub async fn run_reprocess(config: &Config, id: &str, owner_id: &str) -> Result<()> {
    let vault = Vault::open(config).await?;
    let doc = vault.ingestor.reprocess_document(id, owner_id).await;
    vault.close().await;
    let doc = doc?;
    println!("reprocessed {}", doc.id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_kind_precedence() {
        let path = Path::new("scan.png");
        assert_eq!(resolve_kind(path, None).unwrap(), FileKind::Image);
        assert_eq!(resolve_kind(path, Some("txt")).unwrap(), FileKind::Txt);
        assert_eq!(
            resolve_kind(path, Some("application/pdf")).unwrap(),
            FileKind::Pdf
        );
    }

    #[test]
    fn test_resolve_kind_rejects_unsupported() {
        assert!(resolve_kind(Path::new("notes.docx"), None).is_err());
        assert!(resolve_kind(Path::new("a.txt"), Some("docx")).is_err());
        assert!(resolve_kind(Path::new("a.txt"), Some("application/zip")).is_err());
    }

    #[test]
    fn test_upload_size_limit() {
        let path = Path::new("big.pdf");
        assert!(check_upload_size(path, MAX_UPLOAD_BYTES).is_ok());
        assert!(check_upload_size(path, MAX_UPLOAD_BYTES + 1).is_err());
    }
}
