//! Retrieval tool for a conversational agent.
//!
//! [`SearchTool`] wraps a [`Retriever`] and always answers with a
//! [`SearchToolResponse`] envelope: failures are reported in the envelope,
//! never returned as errors, so the agent can relay them.
//!
//! The agent calls the tool with:
//!
//! ```json
//! { "query": "When are quiet hours?", "limit": 3 }
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, info};

use docvault_core::models::SearchResult;

use crate::config::Config;
use crate::search::Retriever;
use crate::vault::Vault;

pub const TOOL_NAME: &str = "search_documents";
pub const TOOL_DEFAULT_LIMIT: usize = 5;
pub const TOOL_SIMILARITY_THRESHOLD: f32 = 0.2;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResult {
    /// 1-based position.
    pub rank: usize,
    pub content: String,
    pub source_title: String,
    pub source_filename: String,
    /// Similarity as a rounded percentage.
    pub similarity_pct: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchToolResponse {
    pub success: bool,
    pub message: String,
    /// Results rendered for a language model, blank-line separated.
    pub content: String,
    /// Distinct document titles in rank order.
    pub sources: Vec<String>,
    pub results: Vec<ToolResult>,
}

impl SearchToolResponse {
    fn failure(message: String) -> Self {
        Self {
            success: false,
            message,
            content: String::new(),
            sources: Vec::new(),
            results: Vec::new(),
        }
    }

    fn from_results(results: &[SearchResult]) -> Self {
        let items: Vec<ToolResult> = results
            .iter()
            .enumerate()
            .map(|(i, r)| ToolResult {
                rank: i + 1,
                content: r.chunk.text.clone(),
                source_title: r.document.title.clone(),
                source_filename: r.document.filename.clone(),
                similarity_pct: (r.similarity * 100.0).round() as i64,
            })
            .collect();

        let content = items
            .iter()
            .map(|r| {
                format!(
                    "[{}] {} ({})\n{}",
                    r.rank, r.source_title, r.source_filename, r.content
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        let mut seen = HashSet::new();
        let sources: Vec<String> = items
            .iter()
            .filter(|r| seen.insert(r.source_title.clone()))
            .map(|r| r.source_title.clone())
            .collect();

        Self {
            success: true,
            message: format!(
                "Found {} relevant passage(s) in {} document(s).",
                items.len(),
                sources.len()
            ),
            content,
            sources,
            results: items,
        }
    }
}

pub struct SearchTool {
    retriever: Arc<Retriever>,
}

impl SearchTool {
    pub fn new(retriever: Arc<Retriever>) -> Self {
        Self { retriever }
    }

    pub fn name(&self) -> &str {
        TOOL_NAME
    }

    pub fn description(&self) -> &str {
        "Search the user's uploaded documents for passages relevant to a question"
    }

    pub fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "What to look for in the user's documents"
                },
                "limit": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "Maximum number of passages to return (default 5)"
                }
            },
            "required": ["query"]
        })
    }

    /// Search the owner's documents.
    pub async fn run(&self, query: &str, limit: Option<usize>, owner_id: &str) -> SearchToolResponse {
        let limit = limit.filter(|l| *l > 0).unwrap_or(TOOL_DEFAULT_LIMIT);
        info!(query, limit, owner = owner_id, "search tool called");

        let results = match self
            .retriever
            .search(query, Some(limit), Some(TOOL_SIMILARITY_THRESHOLD), owner_id)
            .await
        {
            Ok(results) => results,
            Err(e) => {
                error!(error = %e, "search tool failed");
                return SearchToolResponse::failure(format!("Search failed: {}", e));
            }
        };

        if results.is_empty() {
            return SearchToolResponse::failure(format!(
                "No relevant information found in your documents for \"{}\".",
                query.trim()
            ));
        }
        SearchToolResponse::from_results(&results)
    }

    /// Run with JSON arguments matching [`parameters_schema`](Self::parameters_schema).
    pub async fn execute(&self, args: &Value, owner_id: &str) -> SearchToolResponse {
        let Some(query) = args.get("query").and_then(|v| v.as_str()) else {
            return SearchToolResponse::failure(
                "Search failed: missing required 'query' parameter".to_string(),
            );
        };
        let limit = args
            .get("limit")
            .and_then(|v| v.as_u64())
            .map(|v| v as usize);
        self.run(query, limit, owner_id).await
    }
}

/// `docvault tool`: print the envelope an agent would receive.
pub async fn run_tool(
    config: &Config,
    query: &str,
    owner_id: &str,
    limit: Option<usize>,
    schema: bool,
) -> anyhow::Result<()> {
    let vault = Vault::open(config).await?;
    let tool = SearchTool::new(vault.retriever.clone());
    let output = if schema {
        json!({
            "name": tool.name(),
            "description": tool.description(),
            "parameters": tool.parameters_schema(),
        })
    } else {
        serde_json::to_value(tool.run(query, limit, owner_id).await)?
    };
    drop(tool);
    vault.close().await;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use docvault_core::embedding::{fallback_embedding, Embedder};
    use docvault_core::models::{ChunkMetadata, FileKind, NewChunk, NewDocument};
    use docvault_core::search::SearchParams;
    use docvault_core::store::memory::InMemoryStore;
    use docvault_core::store::DocumentStore;
    use docvault_core::{Result as VaultResult, VaultError};

    const DIMS: usize = 16;

    async fn add(store: &InMemoryStore, owner: &str, title: &str, texts: &[&str]) {
        let chunks = texts
            .iter()
            .map(|t| NewChunk {
                text: t.to_string(),
                embedding: fallback_embedding(t, DIMS),
                metadata: ChunkMetadata {
                    source: format!("{}.txt", title),
                    chunk_length: t.chars().count(),
                    total_chunks: texts.len(),
                    fallback: true,
                    model: "hash-fallback".to_string(),
                },
            })
            .collect();
        store
            .add_document(
                NewDocument {
                    title: title.to_string(),
                    filename: format!("{}.txt", title),
                    kind: FileKind::Txt,
                    content: Some(texts.join(" ")),
                    size_bytes: 1,
                    owner_id: owner.to_string(),
                },
                chunks,
            )
            .await
            .unwrap();
    }

    fn tool_over(store: Arc<dyn DocumentStore>) -> SearchTool {
        let retriever = Retriever::new(store, Arc::new(Embedder::new(DIMS)), SearchParams::default());
        SearchTool::new(Arc::new(retriever))
    }

    #[tokio::test]
    async fn test_success_envelope() {
        let store = InMemoryStore::new();
        add(&store, "u1", "Housing", &["quiet hours start at ten"]).await;
        let tool = tool_over(Arc::new(store));

        let resp = tool.run("quiet hours start at ten", None, "u1").await;
        assert!(resp.success);
        assert_eq!(resp.results.len(), 1);
        assert_eq!(resp.results[0].rank, 1);
        assert_eq!(resp.results[0].similarity_pct, 100);
        assert_eq!(resp.sources, vec!["Housing".to_string()]);
        assert_eq!(resp.content, "[1] Housing (Housing.txt)\nquiet hours start at ten");
    }

    #[tokio::test]
    async fn test_no_match_for_other_owner() {
        let store = InMemoryStore::new();
        add(&store, "u2", "Housing", &["quiet hours start at ten"]).await;
        let tool = tool_over(Arc::new(store));

        let resp = tool.run("quiet hours start at ten", None, "u1").await;
        assert!(!resp.success);
        assert!(resp.results.is_empty());
        assert!(resp.message.contains("No relevant information"));
    }

    #[test]
    fn test_sources_deduplicated_in_rank_order() {
        let make = |title: &str, text: &str, sim: f32| SearchResult {
            chunk: docvault_core::models::Chunk {
                id: text.to_string(),
                document_id: title.to_string(),
                chunk_index: 0,
                text: text.to_string(),
                embedding: vec![],
                metadata: ChunkMetadata {
                    source: format!("{}.txt", title),
                    chunk_length: text.len(),
                    total_chunks: 1,
                    fallback: false,
                    model: "m".to_string(),
                },
                hash: String::new(),
                created_at: 0,
            },
            document: docvault_core::models::Document {
                id: title.to_string(),
                title: title.to_string(),
                filename: format!("{}.txt", title),
                kind: FileKind::Txt,
                content: None,
                size_bytes: 0,
                created_at: 0,
                owner_id: "u1".to_string(),
            },
            similarity: sim,
        };
        let resp = SearchToolResponse::from_results(&[
            make("B", "b1", 0.914),
            make("A", "a1", 0.8),
            make("B", "b2", 0.556),
        ]);
        assert_eq!(resp.sources, vec!["B".to_string(), "A".to_string()]);
        let pcts: Vec<i64> = resp.results.iter().map(|r| r.similarity_pct).collect();
        assert_eq!(pcts, vec![91, 80, 56]);
        assert_eq!(resp.content.matches("\n\n").count(), 2);
        assert!(resp.message.contains("3 relevant passage(s) in 2 document(s)"));
    }

    struct BrokenStore;

    #[async_trait]
    impl DocumentStore for BrokenStore {
        async fn add_document(
            &self,
            _doc: NewDocument,
            _chunks: Vec<NewChunk>,
        ) -> VaultResult<docvault_core::models::Document> {
            Err(VaultError::ingestion("read-only"))
        }
        async fn list_documents(
            &self,
            _owner_id: &str,
        ) -> VaultResult<Vec<docvault_core::models::Document>> {
            Ok(vec![])
        }
        async fn get_document(
            &self,
            _id: &str,
            _owner_id: &str,
        ) -> VaultResult<Option<docvault_core::models::Document>> {
            Ok(None)
        }
        async fn delete_document(&self, _id: &str, _owner_id: &str) -> VaultResult<bool> {
            Ok(false)
        }
        async fn replace_content(
            &self,
            id: &str,
            _owner_id: &str,
            _content: Option<String>,
            _chunks: Vec<NewChunk>,
        ) -> VaultResult<docvault_core::models::Document> {
            Err(VaultError::NotFound(id.to_string()))
        }
        async fn get_chunks(
            &self,
            _document_id: &str,
        ) -> VaultResult<Vec<docvault_core::models::Chunk>> {
            Ok(vec![])
        }
        async fn similarity_candidates(
            &self,
            _owner_id: &str,
            _query_vec: &[f32],
        ) -> VaultResult<Vec<SearchResult>> {
            Err(VaultError::storage("database is locked"))
        }
    }

    #[tokio::test]
    async fn test_store_failure_reported_in_envelope() {
        let tool = tool_over(Arc::new(BrokenStore));
        let resp = tool.run("anything", None, "u1").await;
        assert!(!resp.success);
        assert!(resp.message.contains("database is locked"));
        assert!(resp.results.is_empty());
    }

    #[tokio::test]
    async fn test_execute_requires_query() {
        let tool = tool_over(Arc::new(InMemoryStore::new()));
        let resp = tool.execute(&json!({ "limit": 2 }), "u1").await;
        assert!(!resp.success);
        assert!(resp.message.contains("query"));
    }

    #[test]
    fn test_schema_requires_query() {
        let tool = tool_over(Arc::new(InMemoryStore::new()));
        let schema = tool.parameters_schema();
        assert_eq!(schema["required"], json!(["query"]));
        assert_eq!(schema["properties"]["limit"]["type"], "integer");
        assert_eq!(tool.name(), "search_documents");
    }
}
