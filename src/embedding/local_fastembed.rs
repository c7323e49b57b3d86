//! Local inference through fastembed.
//!
//! The ONNX model is downloaded from Hugging Face on first use and cached;
//! after that embeddings run offline. Inference is blocking, so it runs on
//! tokio's blocking pool with the model behind a mutex.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use docvault_core::embedding::EmbeddingProvider;

use super::blocking_with_timeout;
use crate::config::{EmbeddingConfig, ModelConfig};

pub struct LocalProvider {
    model_name: String,
    model: fastembed::EmbeddingModel,
    engine: Arc<Mutex<Option<fastembed::TextEmbedding>>>,
    /// Covers the first-use model download too.
    timeout: Duration,
}

impl LocalProvider {
    pub fn new(config: &ModelConfig, embedding: &EmbeddingConfig) -> Result<Self> {
        Ok(Self {
            model_name: config.model.clone(),
            model: to_fastembed_model(&config.model)?,
            engine: Arc::new(Mutex::new(None)),
            timeout: Duration::from_secs(embedding.timeout_secs),
        })
    }
}

fn to_fastembed_model(name: &str) -> Result<fastembed::EmbeddingModel> {
    match name {
        "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        "multilingual-e5-small" => Ok(fastembed::EmbeddingModel::MultilingualE5Small),
        other => bail!(
            "Unknown local embedding model: '{}'. Supported models: \
             all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, multilingual-e5-small",
            other
        ),
    }
}

#[async_trait]
impl EmbeddingProvider for LocalProvider {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let engine = Arc::clone(&self.engine);
        let model = self.model.clone();
        let text = text.to_string();

        blocking_with_timeout("local", self.timeout, move || {
            let mut guard = engine
                .lock()
                .map_err(|_| anyhow!("local embedding model lock poisoned"))?;
            if guard.is_none() {
                let loaded = fastembed::TextEmbedding::try_new(
                    fastembed::InitOptions::new(model).with_show_download_progress(false),
                )
                .map_err(|e| anyhow!("Failed to initialize local embedding model: {}", e))?;
                *guard = Some(loaded);
            }
            let engine = guard
                .as_mut()
                .ok_or_else(|| anyhow!("local embedding model not loaded"))?;

            let mut vectors = engine
                .embed(vec![text], None)
                .map_err(|e| anyhow!("Local embedding failed: {}", e))?;
            vectors
                .pop()
                .ok_or_else(|| anyhow!("Empty embedding response"))
        })
        .await
    }
}
