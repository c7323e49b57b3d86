//! Retrieval entry point and the `docvault search` command.

use std::sync::Arc;

use anyhow::Result;

use docvault_core::embedding::Embedder;
use docvault_core::models::SearchResult;
use docvault_core::search::{self, SearchParams};
use docvault_core::store::DocumentStore;

use crate::config::Config;
use crate::vault::Vault;

/// Owner-scoped similarity search with configured defaults.
pub struct Retriever {
    store: Arc<dyn DocumentStore>,
    embedder: Arc<Embedder>,
    defaults: SearchParams,
}

impl Retriever {
    pub fn new(store: Arc<dyn DocumentStore>, embedder: Arc<Embedder>, defaults: SearchParams) -> Self {
        Self {
            store,
            embedder,
            defaults,
        }
    }

    pub fn defaults(&self) -> SearchParams {
        self.defaults
    }

    /// Rank the owner's chunks against `query`. `None` uses the default.
    pub async fn search(
        &self,
        query: &str,
        limit: Option<usize>,
        threshold: Option<f32>,
        owner_id: &str,
    ) -> docvault_core::Result<Vec<SearchResult>> {
        let params = SearchParams {
            limit: limit.unwrap_or(self.defaults.limit),
            similarity_threshold: threshold.unwrap_or(self.defaults.similarity_threshold),
        };
        search::search(
            self.store.as_ref(),
            &self.embedder,
            query,
            params,
            owner_id,
        )
        .await
    }
}

pub async fn run_search(
    config: &Config,
    query: &str,
    owner_id: &str,
    limit: Option<usize>,
    threshold: Option<f32>,
    json: bool,
) -> Result<()> {
    let vault = Vault::open(config).await?;
    let results = vault
        .retriever
        .search(query, limit, threshold, owner_id)
        .await?;
    vault.close().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        println!(
            "{}. [{:.2}] {} ({})",
            i + 1,
            result.similarity,
            result.document.title,
            result.document.filename
        );
        println!(
            "    chunk: {}/{}",
            result.chunk.chunk_index + 1,
            result.chunk.metadata.total_chunks
        );
        if result.chunk.metadata.fallback {
            println!("    embedding: hash fallback");
        }
        let excerpt: String = result.chunk.text.chars().take(240).collect();
        println!("    excerpt: \"{}\"", excerpt.replace('\n', " ").trim());
        println!("    id: {}", result.document.id);
        println!();
    }

    Ok(())
}
