//! Application state for the HTTP server

use std::sync::Arc;

use dashmap::DashMap;

use crate::config::RagConfig;
use crate::engine::ChatEngine;
use crate::error::Result;
use crate::index::VectorIndex;
use crate::ingestion::IngestPipeline;
use crate::memory::SessionMemory;
use crate::providers::{OllamaEmbedder, ProviderRegistry};
use crate::types::DocumentRecord;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: RagConfig,
    pipeline: IngestPipeline,
    index: Arc<VectorIndex>,
    memory: Arc<SessionMemory>,
    registry: Arc<ProviderRegistry>,
    engine: ChatEngine,
    /// Per-source bookkeeping surfaced by the status endpoint
    documents: DashMap<String, DocumentRecord>,
}

impl AppState {
    /// Build the state: embedder, index, memory, engine
    pub fn new(config: RagConfig, registry: ProviderRegistry) -> Result<Self> {
        config.validate()?;

        let embedder = Arc::new(OllamaEmbedder::new(&config.embedding));
        let index = match &config.index.snapshot_path {
            Some(path) => Arc::new(VectorIndex::open(embedder, path.clone())?),
            None => Arc::new(VectorIndex::new(embedder)),
        };
        tracing::info!(chunks = index.chunk_count(), "Vector index initialized");

        let memory = Arc::new(SessionMemory::new());
        let registry = Arc::new(registry);
        let engine = ChatEngine::new(
            Arc::clone(&index),
            Arc::clone(&memory),
            Arc::clone(&registry),
            config.retrieval.top_k,
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                pipeline: IngestPipeline::new(&config.chunking),
                config,
                index,
                memory,
                registry,
                engine,
                documents: DashMap::new(),
            }),
        })
    }

    pub fn config(&self) -> &RagConfig {
        &self.inner.config
    }

    pub fn pipeline(&self) -> &IngestPipeline {
        &self.inner.pipeline
    }

    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.inner.index
    }

    pub fn memory(&self) -> &Arc<SessionMemory> {
        &self.inner.memory
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.inner.registry
    }

    pub fn engine(&self) -> &ChatEngine {
        &self.inner.engine
    }

    /// Record an ingested source, replacing any previous record for it
    pub fn add_record(&self, record: DocumentRecord) {
        self.inner.documents.insert(record.source_id.clone(), record);
    }

    pub fn list_records(&self) -> Vec<DocumentRecord> {
        let mut records: Vec<DocumentRecord> = self
            .inner
            .documents
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by(|a, b| a.source_id.cmp(&b.source_id));
        records
    }

    pub fn record_count(&self) -> usize {
        self.inner.documents.len()
    }

    pub fn clear_records(&self) {
        self.inner.documents.clear();
    }
}
