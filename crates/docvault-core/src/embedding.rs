//! Embedding provider trait, provider chain, and vector utilities.
//!
//! Defines the [`EmbeddingProvider`] trait that all embedding backends
//! implement and the [`Embedder`], which tries an ordered list of
//! providers and falls back to a deterministic hash embedding when every
//! provider fails. Also provides pure helpers for vector serialization and
//! similarity computation.
//!
//! Concrete provider implementations (OpenAI, Ollama, fastembed) live in
//! the `docvault` app crate.
//!
//! # Fallback
//!
//! The fallback vector is derived from a 32-bit polynomial rolling hash of
//! the text's UTF-16 code units:
//!
//! ```text
//! h = h * 31 + unit            (wrapping i32)
//! v[i] = (sin(h + i) * 43758.5453) % 1
//! ```
//!
//! It has no semantic quality; it only keeps ingestion and search
//! available when no backend answers.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{Result, VaultError};

/// Default vector dimensionality.
pub const DEFAULT_DIMS: usize = 384;

/// Model name recorded for hash-derived vectors.
pub const FALLBACK_MODEL: &str = "hash-fallback";

/// Trait for embedding providers.
///
/// Implementations wrap a single backend model. Errors are reported to the
/// [`Embedder`], which logs them and moves on to the next provider.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// Generate an embedding vector for one text.
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;
}

/// Result of asking one provider for a vector.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Ok(Vec<f32>),
    ModelFailed(String),
}

/// A vector plus where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub vector: Vec<f32>,
    pub model: String,
    pub fallback: bool,
}

/// Ordered provider chain with a terminal hash fallback.
///
/// # Example
///
/// ```rust
/// use docvault_core::embedding::Embedder;
///
/// # tokio_test_block(async {
/// let embedder = Embedder::new(384);
/// let e = embedder.embed("campus housing").await.unwrap();
/// assert!(e.fallback);
/// assert_eq!(e.vector.len(), 384);
/// # });
/// # fn tokio_test_block<F: std::future::Future>(f: F) {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f);
/// # }
/// ```
pub struct Embedder {
    providers: Vec<Box<dyn EmbeddingProvider>>,
    dims: usize,
    fallback_enabled: bool,
}

impl Embedder {
    /// An embedder with no providers; every text gets the fallback vector.
    pub fn new(dims: usize) -> Self {
        Self {
            providers: Vec::new(),
            dims,
            fallback_enabled: true,
        }
    }

    /// Append a provider. Providers are tried in insertion order.
    pub fn with_provider(mut self, provider: Box<dyn EmbeddingProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Enable or disable the hash fallback.
    pub fn with_fallback(mut self, enabled: bool) -> Self {
        self.fallback_enabled = enabled;
        self
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    async fn attempt(&self, provider: &dyn EmbeddingProvider, text: &str) -> AttemptOutcome {
        match provider.embed(text).await {
            Ok(vector) if vector.len() == self.dims => AttemptOutcome::Ok(vector),
            Ok(vector) => AttemptOutcome::ModelFailed(format!(
                "returned {} dimensions, expected {}",
                vector.len(),
                self.dims
            )),
            Err(e) => AttemptOutcome::ModelFailed(format!("{:#}", e)),
        }
    }

    /// Embed one text.
    ///
    /// # Errors
    ///
    /// Only [`VaultError::EmbeddingUnavailable`], and only when the fallback
    /// is disabled and every provider failed.
    pub async fn embed(&self, text: &str) -> Result<Embedding> {
        let mut down = vec![false; self.providers.len()];
        self.embed_with(text, &mut down).await
    }

    /// Try every provider not marked in `down`; a provider that fails is
    /// marked so later calls sharing `down` skip it.
    async fn embed_with(&self, text: &str, down: &mut [bool]) -> Result<Embedding> {
        let mut failures = Vec::new();

        for (provider, is_down) in self.providers.iter().zip(down.iter_mut()) {
            if *is_down {
                continue;
            }
            match self.attempt(provider.as_ref(), text).await {
                AttemptOutcome::Ok(vector) => {
                    return Ok(Embedding {
                        vector,
                        model: provider.model_name().to_string(),
                        fallback: false,
                    });
                }
                AttemptOutcome::ModelFailed(reason) => {
                    warn!(model = provider.model_name(), %reason, "embedding model failed");
                    failures.push(format!("{}: {}", provider.model_name(), reason));
                    *is_down = true;
                }
            }
        }

        if !self.fallback_enabled {
            return Err(VaultError::EmbeddingUnavailable(if !failures.is_empty() {
                failures.join("; ")
            } else if self.providers.is_empty() {
                "no embedding models configured".to_string()
            } else {
                "every embedding model already failed in this batch".to_string()
            }));
        }

        if !self.providers.is_empty() {
            debug!(chars = text.len(), "using hash fallback embedding");
        }
        Ok(Embedding {
            vector: fallback_embedding(text, self.dims),
            model: FALLBACK_MODEL.to_string(),
            fallback: true,
        })
    }

    /// Embed each text, preserving order.
    ///
    /// A provider that fails is not tried again for the rest of the batch,
    /// so an outage costs one failed call per provider rather than one per
    /// text.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let mut down = vec![false; self.providers.len()];
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed_with(text, &mut down).await?);
        }
        Ok(out)
    }
}

/// 32-bit polynomial rolling hash over UTF-16 code units.
pub fn text_hash(text: &str) -> i32 {
    text.encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(unit as i32))
}

/// Deterministic hash-derived vector of length `dims`.
pub fn fallback_embedding(text: &str, dims: usize) -> Vec<f32> {
    let hash = text_hash(text) as f64;
    (0..dims)
        .map(|i| (((hash + i as f64).sin() * 43758.5453) % 1.0) as f32)
        .collect()
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// # Example
///
/// ```rust
/// use docvault_core::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12);
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`:
/// - `1.0` = identical direction
/// - `0.0` = orthogonal (unrelated)
/// - `-1.0` = opposite direction
///
/// Returns `0.0` for empty vectors, zero vectors, or vectors of different
/// lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    (dot / denom).clamp(-1.0, 1.0)
}
