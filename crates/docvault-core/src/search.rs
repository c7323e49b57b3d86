//! Similarity retrieval over a [`DocumentStore`].
//!
//! The algorithm works entirely through the store trait and the
//! [`Embedder`], with no database or configuration dependencies:
//!
//! 1. Return nothing for a blank query (no embedding call).
//! 2. Embed the query.
//! 3. Fetch every owned chunk with its cosine similarity.
//! 4. Keep similarities strictly greater than the threshold.
//! 5. Stable sort by similarity, descending.
//! 6. Truncate to the limit.

use std::cmp::Ordering;

use tracing::debug;

use crate::embedding::Embedder;
use crate::error::Result;
use crate::models::SearchResult;
use crate::store::DocumentStore;

pub const DEFAULT_LIMIT: usize = 10;
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.1;

/// Retrieval tuning parameters, decoupled from application config.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchParams {
    /// Maximum results to return.
    pub limit: usize,
    /// Results must score strictly above this.
    pub similarity_threshold: f32,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}

/// Rank the owner's chunks against `query`.
///
/// An empty result is a normal outcome, including when the owner has no
/// documents at all.
pub async fn search(
    store: &dyn DocumentStore,
    embedder: &Embedder,
    query: &str,
    params: SearchParams,
    owner_id: &str,
) -> Result<Vec<SearchResult>> {
    if query.trim().is_empty() || params.limit == 0 {
        return Ok(Vec::new());
    }

    let query_vec = embedder.embed(query).await?;
    let candidates = store
        .similarity_candidates(owner_id, &query_vec.vector)
        .await?;
    let total = candidates.len();
    let results = rank(candidates, params);

    debug!(
        owner = owner_id,
        candidates = total,
        returned = results.len(),
        fallback = query_vec.fallback,
        "search complete"
    );
    Ok(results)
}

/// Filter by threshold, stable-sort descending, truncate.
pub fn rank(candidates: Vec<SearchResult>, params: SearchParams) -> Vec<SearchResult> {
    let mut kept: Vec<SearchResult> = candidates
        .into_iter()
        .filter(|c| c.similarity > params.similarity_threshold)
        .collect();
    kept.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(Ordering::Equal)
    });
    kept.truncate(params.limit);
    kept
}
