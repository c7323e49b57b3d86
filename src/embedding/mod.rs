//! Concrete embedding providers and the configured provider chain.
//!
//! Implements [`EmbeddingProvider`] for:
//! - **[`OpenAIProvider`]**: `POST /v1/embeddings`, key from `OPENAI_API_KEY`.
//! - **[`OllamaProvider`]**: `POST /api/embed` on a local or remote Ollama.
//! - **`LocalProvider`**: fastembed, behind the `local-embeddings-fastembed`
//!   feature. No network calls after the model download.
//!
//! [`build_embedder`] turns the ordered `[[embedding.models]]` list into an
//! [`Embedder`], which tries each provider in turn and falls back to the
//! deterministic hash vector.
//!
//! # Retry Strategy
//!
//! The HTTP providers use exponential backoff for transient errors:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors and timeouts → retry
//! - Backoff: 1s, 2s, 4s, ... (capped at 2^5)
//!
//! Once retries are exhausted the provider reports an error and the
//! [`Embedder`] moves on.

#[cfg(feature = "local-embeddings-fastembed")]
mod local_fastembed;

#[cfg(feature = "local-embeddings-fastembed")]
pub use local_fastembed::LocalProvider;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use docvault_core::embedding::{Embedder, EmbeddingProvider};

use crate::config::{EmbeddingConfig, ModelConfig};

pub const OPENAI_URL: &str = "https://api.openai.com";
pub const OLLAMA_URL: &str = "http://localhost:11434";

/// HTTP settings shared by the remote providers.
#[derive(Debug, Clone)]
struct HttpSettings {
    client: reqwest::Client,
    max_retries: u32,
}

impl HttpSettings {
    fn new(config: &EmbeddingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            max_retries: config.max_retries,
        })
    }

    /// POST `body` to `url`, retrying transient failures.
    async fn post_json(
        &self,
        label: &str,
        url: &str,
        bearer: Option<&str>,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                debug!(provider = label, attempt, ?delay, "retrying embedding request");
                tokio::time::sleep(delay).await;
            }

            let mut request = self.client.post(url).json(body);
            if let Some(token) = bearer {
                request = request.bearer_auth(token);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response.json().await?);
                    }

                    let body_text = response.text().await.unwrap_or_default();

                    // Rate limited or server error: retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(anyhow!("{} API error {}: {}", label, status, body_text));
                        continue;
                    }

                    // Other client errors are final
                    bail!("{} API error {}: {}", label, status, body_text);
                }
                // Nothing is listening: retrying the same address cannot help.
                Err(e) if e.is_connect() => {
                    bail!("{} request to {} failed: {}", label, url, e);
                }
                Err(e) => {
                    last_err = Some(anyhow!("{} request to {} failed: {}", label, url, e));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("{} embedding failed after retries", label)))
    }
}

/// Run blocking embedding work on the blocking pool with a deadline.
///
/// On timeout the worker thread is left to finish on its own; the caller
/// moves on to the next provider.
#[cfg_attr(not(feature = "local-embeddings-fastembed"), allow(dead_code))]
async fn blocking_with_timeout<T, F>(label: &str, timeout: Duration, work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::time::timeout(timeout, tokio::task::spawn_blocking(work))
        .await
        .map_err(|_| anyhow!("{} embedding timed out after {:?}", label, timeout))??
}

// ============ OpenAI Provider ============

/// Embedding provider using the OpenAI API.
///
/// The API key is read from `OPENAI_API_KEY` on every call, so a missing
/// key surfaces as a model failure rather than a startup error.
pub struct OpenAIProvider {
    model: String,
    dims: usize,
    base_url: String,
    http: HttpSettings,
}

impl OpenAIProvider {
    pub fn new(model: &ModelConfig, config: &EmbeddingConfig) -> Result<Self> {
        Ok(Self {
            model: model.model.clone(),
            dims: config.dims,
            base_url: model
                .url
                .clone()
                .unwrap_or_else(|| OPENAI_URL.to_string()),
            http: HttpSettings::new(config)?,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow!("OPENAI_API_KEY environment variable not set"))?;

        // text-embedding-3 models can shorten their output to the store's width.
        let body = serde_json::json!({
            "model": self.model,
            "input": [text],
            "dimensions": self.dims,
        });

        let url = format!("{}/v1/embeddings", self.base_url.trim_end_matches('/'));
        let json = self
            .http
            .post_json("OpenAI", &url, Some(&api_key), &body)
            .await?;
        first_vector(parse_openai_response(&json)?)
    }
}

/// Extract the `data[].embedding` arrays in order.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing data array"))?;

    data.iter()
        .map(|item| {
            item.get("embedding")
                .ok_or_else(|| anyhow!("Invalid OpenAI response: missing embedding"))
                .and_then(json_to_vec)
        })
        .collect()
}

// ============ Ollama Provider ============

/// Embedding provider using an Ollama instance.
///
/// Requires the model to be pulled (e.g. `ollama pull all-minilm`).
pub struct OllamaProvider {
    model: String,
    url: String,
    http: HttpSettings,
}

impl OllamaProvider {
    pub fn new(model: &ModelConfig, config: &EmbeddingConfig) -> Result<Self> {
        Ok(Self {
            model: model.model.clone(),
            url: model.url.clone().unwrap_or_else(|| OLLAMA_URL.to_string()),
            http: HttpSettings::new(config)?,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": [text],
        });
        let url = format!("{}/api/embed", self.url.trim_end_matches('/'));
        let json = self.http.post_json("Ollama", &url, None, &body).await?;
        first_vector(parse_ollama_response(&json)?)
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow!("Invalid Ollama response: missing embeddings array"))?;

    embeddings.iter().map(json_to_vec).collect()
}

fn json_to_vec(value: &serde_json::Value) -> Result<Vec<f32>> {
    value
        .as_array()
        .ok_or_else(|| anyhow!("embedding is not an array"))?
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| anyhow!("embedding contains a non-numeric value"))
        })
        .collect()
}

fn first_vector(vectors: Vec<Vec<f32>>) -> Result<Vec<f32>> {
    vectors
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("Empty embedding response"))
}

// ============ Provider chain ============

/// Create the provider for one `[[embedding.models]]` entry.
///
/// | `provider` | Implementation |
/// |-----------|----------------|
/// | `"openai"` | [`OpenAIProvider`] |
/// | `"ollama"` | [`OllamaProvider`] |
/// | `"local"` | `LocalProvider` (needs `local-embeddings-fastembed`) |
pub fn create_provider(
    model: &ModelConfig,
    config: &EmbeddingConfig,
) -> Result<Box<dyn EmbeddingProvider>> {
    match model.provider.as_str() {
        "openai" => Ok(Box::new(OpenAIProvider::new(model, config)?)),
        "ollama" => Ok(Box::new(OllamaProvider::new(model, config)?)),
        #[cfg(feature = "local-embeddings-fastembed")]
        "local" => Ok(Box::new(LocalProvider::new(model, config)?)),
        #[cfg(not(feature = "local-embeddings-fastembed"))]
        "local" => bail!("Local embedding provider requires --features local-embeddings-fastembed"),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

/// Build the configured provider chain.
pub fn build_embedder(config: &EmbeddingConfig) -> Result<Embedder> {
    let mut embedder = Embedder::new(config.dims).with_fallback(config.fallback);
    for model in &config.models {
        embedder = embedder.with_provider(create_provider(model, config)?);
    }
    Ok(embedder)
}
