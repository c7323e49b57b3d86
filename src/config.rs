//! TOML configuration for docvault.
//!
//! Only `[db]` is required; every other section falls back to defaults.
//! [`load_config`] parses and validates the file and is the only way the
//! CLI obtains a [`Config`].

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use docvault_core::chunk::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use docvault_core::embedding::DEFAULT_DIMS;
use docvault_core::search::{SearchParams, DEFAULT_LIMIT, DEFAULT_SIMILARITY_THRESHOLD};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}
fn default_chunk_overlap() -> usize {
    DEFAULT_CHUNK_OVERLAP
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_LIMIT,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}

impl RetrievalConfig {
    pub fn params(&self) -> SearchParams {
        SearchParams {
            limit: self.default_limit,
            similarity_threshold: self.similarity_threshold,
        }
    }
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}
fn default_similarity_threshold() -> f32 {
    DEFAULT_SIMILARITY_THRESHOLD
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_dims")]
    pub dims: usize,
    /// Use the deterministic hash vector when every model fails.
    #[serde(default = "default_true")]
    pub fallback: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Tried in order.
    #[serde(default)]
    pub models: Vec<ModelConfig>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dims: DEFAULT_DIMS,
            fallback: true,
            timeout_secs: 30,
            max_retries: 2,
            models: Vec::new(),
        }
    }
}

fn default_dims() -> usize {
    DEFAULT_DIMS
}
fn default_true() -> bool {
    true
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    /// `openai`, `ollama`, or `local`.
    pub provider: String,
    pub model: String,
    /// Base URL override (Ollama defaults to `http://localhost:11434`).
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractionConfig {
    #[serde(default = "default_ocr_command")]
    pub ocr_command: String,
    #[serde(default = "default_ocr_language")]
    pub ocr_language: String,
    #[serde(default = "default_extraction_timeout")]
    pub timeout_secs: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            ocr_command: default_ocr_command(),
            ocr_language: default_ocr_language(),
            timeout_secs: default_extraction_timeout(),
        }
    }
}

fn default_ocr_command() -> String {
    "tesseract".to_string()
}
fn default_ocr_language() -> String {
    "eng".to_string()
}
fn default_extraction_timeout() -> u64 {
    60
}

const PROVIDERS: &[&str] = &["openai", "ollama", "local"];

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Output width of models with a fixed vector size. `None` for unknown
/// models and for OpenAI `text-embedding-3-*`, which shorten on request.
pub fn known_model_dims(provider: &str, model: &str) -> Option<usize> {
    // Ollama tags (`all-minilm:latest`) do not change the width.
    let name = model.split(':').next().unwrap_or(model).trim();
    match (provider, name) {
        ("ollama", "all-minilm") => Some(384),
        ("ollama", "nomic-embed-text") => Some(768),
        ("ollama", "mxbai-embed-large") => Some(1024),
        ("openai", "text-embedding-ada-002") => Some(1536),
        ("local", "all-minilm-l6-v2" | "bge-small-en-v1.5" | "multilingual-e5-small") => Some(384),
        ("local", "bge-base-en-v1.5") => Some(768),
        _ => None,
    }
}

/// Parse and validate config text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    // Validate chunking
    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.chunk_overlap >= config.chunking.chunk_size {
        anyhow::bail!(
            "chunking.chunk_overlap ({}) must be less than chunking.chunk_size ({})",
            config.chunking.chunk_overlap,
            config.chunking.chunk_size
        );
    }

    // Validate retrieval
    if config.retrieval.default_limit < 1 {
        anyhow::bail!("retrieval.default_limit must be >= 1");
    }
    if !(-1.0..=1.0).contains(&config.retrieval.similarity_threshold) {
        anyhow::bail!("retrieval.similarity_threshold must be in [-1.0, 1.0]");
    }

    // Validate embedding
    if config.embedding.dims == 0 {
        anyhow::bail!("embedding.dims must be > 0");
    }
    for model in &config.embedding.models {
        if !PROVIDERS.contains(&model.provider.as_str()) {
            anyhow::bail!(
                "Unknown embedding provider: '{}'. Must be openai, ollama, or local.",
                model.provider
            );
        }
        if model.model.trim().is_empty() {
            anyhow::bail!(
                "embedding.models: model must be specified for provider '{}'",
                model.provider
            );
        }
        if let Some(width) = known_model_dims(&model.provider, &model.model) {
            if width != config.embedding.dims {
                anyhow::bail!(
                    "embedding model '{}' ({}) produces {} dimensions but embedding.dims = {}",
                    model.model,
                    model.provider,
                    width,
                    config.embedding.dims
                );
            }
        }
    }
    if !config.embedding.fallback && config.embedding.models.is_empty() {
        anyhow::bail!("embedding.fallback = false requires at least one [[embedding.models]] entry");
    }

    if config.extraction.timeout_secs == 0 {
        anyhow::bail!("extraction.timeout_secs must be > 0");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse_config("[db]\npath = \"./data/docvault.sqlite\"\n").unwrap();
        assert_eq!(config.chunking.chunk_size, 1000);
        assert_eq!(config.chunking.chunk_overlap, 200);
        assert_eq!(config.retrieval.default_limit, 10);
        assert!((config.retrieval.similarity_threshold - 0.1).abs() < 1e-6);
        assert_eq!(config.embedding.dims, 384);
        assert!(config.embedding.fallback);
        assert!(config.embedding.models.is_empty());
        assert_eq!(config.extraction.ocr_command, "tesseract");
    }

    #[test]
    fn test_model_list_in_order() {
        let config = parse_config(
            r#"
[db]
path = "x.sqlite"

[[embedding.models]]
provider = "openai"
model = "text-embedding-3-small"

[[embedding.models]]
provider = "ollama"
model = "all-minilm"
url = "http://gpu-box:11434"
"#,
        )
        .unwrap();
        let providers: Vec<&str> = config
            .embedding
            .models
            .iter()
            .map(|m| m.provider.as_str())
            .collect();
        assert_eq!(providers, vec!["openai", "ollama"]);
        assert_eq!(
            config.embedding.models[1].url.as_deref(),
            Some("http://gpu-box:11434")
        );
    }

    #[test]
    fn test_rejects_overlap_not_below_size() {
        let err = parse_config(
            "[db]\npath = \"x\"\n[chunking]\nchunk_size = 100\nchunk_overlap = 100\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("chunk_overlap"));
    }

    #[test]
    fn test_rejects_unknown_provider() {
        let err = parse_config(
            "[db]\npath = \"x\"\n[[embedding.models]]\nprovider = \"cohere\"\nmodel = \"m\"\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("cohere"));
    }

    #[test]
    fn test_rejects_threshold_out_of_range() {
        let err = parse_config("[db]\npath = \"x\"\n[retrieval]\nsimilarity_threshold = 1.5\n")
            .unwrap_err();
        assert!(err.to_string().contains("similarity_threshold"));
    }

    #[test]
    fn test_example_config_is_valid() {
        let config = parse_config(include_str!("../config/docvault.example.toml")).unwrap();
        assert_eq!(config.embedding.dims, 384);
        assert_eq!(config.embedding.models[0].model, "all-minilm");
    }

    #[test]
    fn test_rejects_model_with_other_width() {
        let config_with = |dims: usize| {
            format!(
                "[db]\npath = \"x\"\n[embedding]\ndims = {}\n\
                 [[embedding.models]]\nprovider = \"ollama\"\nmodel = \"nomic-embed-text:latest\"\n",
                dims
            )
        };
        let err = parse_config(&config_with(384)).unwrap_err();
        assert!(err.to_string().contains("768 dimensions"), "{}", err);
        assert!(parse_config(&config_with(768)).is_ok());
    }

    #[test]
    fn test_known_model_dims() {
        assert_eq!(known_model_dims("ollama", "all-minilm"), Some(384));
        assert_eq!(known_model_dims("openai", "text-embedding-3-small"), None);
        assert_eq!(known_model_dims("ollama", "some-new-model"), None);
    }

    #[test]
    fn test_missing_db_section_fails() {
        assert!(parse_config("[chunking]\nchunk_size = 10\n").is_err());
    }
}
