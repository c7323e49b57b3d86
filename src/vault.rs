//! Wiring: builds the store, embedder, extractor, and splitter from config.

use std::sync::Arc;

use anyhow::Result;
use sqlx::SqlitePool;

use docvault_core::chunk::TextSplitter;
use docvault_core::store::DocumentStore;

use crate::config::Config;
use crate::db;
use crate::embedding::build_embedder;
use crate::extract::Extractor;
use crate::ingest::Ingestor;
use crate::search::Retriever;
use crate::sqlite_store::SqliteStore;

/// The pipeline components for one database.
pub struct Vault {
    pub ingestor: Ingestor,
    pub retriever: Arc<Retriever>,
    pool: SqlitePool,
}

impl Vault {
    /// Connect to the configured database and assemble the pipeline.
    ///
    /// The schema must already exist (`docvault init`).
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        let store: Arc<dyn DocumentStore> = Arc::new(SqliteStore::new(pool.clone()));
        Self::with_store(config, store, pool)
    }

    fn with_store(config: &Config, store: Arc<dyn DocumentStore>, pool: SqlitePool) -> Result<Self> {
        let splitter = TextSplitter::builder()
            .chunk_size(config.chunking.chunk_size)
            .chunk_overlap(config.chunking.chunk_overlap)
            .build()?;
        let embedder = Arc::new(build_embedder(&config.embedding)?);
        let extractor = Extractor::from_config(&config.extraction);

        Ok(Self {
            ingestor: Ingestor::new(store.clone(), extractor, splitter, embedder.clone()),
            retriever: Arc::new(Retriever::new(store, embedder, config.retrieval.params())),
            pool,
        })
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}
