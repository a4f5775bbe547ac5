//! Application wiring.
//!
//! [`Services`] builds every component once from a [`Config`] and shares
//! the index and language model between them through `Arc`. Both the CLI
//! and the HTTP server run on top of one `Services` value.

use std::sync::Arc;

use anyhow::{Context, Result};
use ragline_core::embedding::{Embedder, EmbeddingGateway};
use ragline_core::index::VectorIndex;
use ragline_core::store::memory::InMemoryStore;
use ragline_core::store::VectorStore;

use crate::chat::ChatEngine;
use crate::config::Config;
use crate::embedding::create_embedder;
use crate::extractor::Extractor;
use crate::ingest::Ingestor;
use crate::llm::{create_llm, LanguageModel};
use crate::rag::RagEngine;
use crate::session_store::SessionStore;
use crate::sqlite_store::SqliteStore;
use crate::summarize::Summarizer;

pub struct Services {
    pub config: Config,
    pub index: Arc<VectorIndex>,
    pub ingestor: Ingestor,
    pub rag: RagEngine,
    pub chat: ChatEngine,
    pub summarizer: Summarizer,
    pub extractor: Extractor,
}

impl Services {
    /// Build the configured index engine, embedder and language model.
    pub async fn from_config(config: Config) -> Result<Self> {
        let store: Arc<dyn VectorStore> = match config.index.backend.as_str() {
            "memory" => Arc::new(InMemoryStore::new()),
            _ => Arc::new(SqliteStore::open(&config.index.path).await?),
        };
        let embedder = create_embedder(&config.embedding)
            .context("Failed to initialize embedding provider")?;
        let llm = create_llm(&config.llm).context("Failed to initialize language model")?;
        Self::with_backends(config, store, embedder, llm).await
    }

    /// Build on explicit backends.
    pub async fn with_backends(
        config: Config,
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        llm: Arc<dyn LanguageModel>,
    ) -> Result<Self> {
        let gateway = EmbeddingGateway::new(embedder, config.embedding.batch_size);
        let index = Arc::new(
            VectorIndex::open(store, gateway, config.index.collection.clone())
                .await
                .context("Failed to open vector index")?,
        );
        let chunker = config.chunking.chunker()?;
        let max_mb = config.ingest.max_file_size_mb;

        let session_store = config
            .sessions
            .persist
            .then(|| SessionStore::new(config.sessions.dir.clone()));

        tracing::debug!(
            backend = %config.index.backend,
            collection = %config.index.collection,
            llm = llm.name(),
            model = llm.model(),
            "services ready"
        );

        Ok(Self {
            ingestor: Ingestor::new(Arc::clone(&index), chunker, max_mb),
            rag: RagEngine::new(Arc::clone(&index), Arc::clone(&llm), config.retrieval.top_k),
            chat: ChatEngine::new(
                Arc::clone(&llm),
                config.sessions.max_history,
                config.sessions.max_sessions,
                session_store,
            ),
            summarizer: Summarizer::new(Arc::clone(&llm), max_mb),
            extractor: Extractor::new(llm, max_mb),
            index,
            config,
        })
    }
}
