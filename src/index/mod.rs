//! In-process vector index with brute-force cosine search
//!
//! Embeds chunk text through an `EmbeddingProvider` and keeps the vectors in
//! memory behind a read-write lock. An optional JSON snapshot persists the
//! entries across restarts.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::providers::EmbeddingProvider;
use crate::types::{DocumentChunk, ScoredChunk};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexEntry {
    embedding: Vec<f32>,
    chunk: DocumentChunk,
}

/// Embedding-backed chunk store with top-k similarity search
pub struct VectorIndex {
    embedder: Arc<dyn EmbeddingProvider>,
    entries: RwLock<Vec<IndexEntry>>,
    snapshot_path: Option<PathBuf>,
}

impl VectorIndex {
    /// Create an empty in-memory index
    pub fn new(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            embedder,
            entries: RwLock::new(Vec::new()),
            snapshot_path: None,
        }
    }

    /// Create an index backed by a JSON snapshot, reloading existing entries
    pub fn open(embedder: Arc<dyn EmbeddingProvider>, path: PathBuf) -> Result<Self> {
        let entries = if path.exists() {
            let data = std::fs::read_to_string(&path)?;
            let entries: Vec<IndexEntry> = serde_json::from_str(&data)?;
            tracing::info!(path = %path.display(), entries = entries.len(), "Loaded index snapshot");
            entries
        } else {
            Vec::new()
        };

        Ok(Self {
            embedder,
            entries: RwLock::new(entries),
            snapshot_path: Some(path),
        })
    }

    /// Embed and insert chunks, returning how many were added.
    ///
    /// There is no dedup key; re-adding identical chunks stores them again.
    pub async fn add(&self, chunks: Vec<DocumentChunk>) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;

        let added = chunks.len();
        {
            let mut entries = self.entries.write();
            for (chunk, embedding) in chunks.into_iter().zip(embeddings) {
                entries.push(IndexEntry { embedding, chunk });
            }
        }

        self.save_snapshot()?;
        Ok(added)
    }

    /// Return up to `k` chunks nearest to the query, best first.
    ///
    /// An empty index yields an empty result; `k == 0` is a caller error.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        if k == 0 {
            return Err(Error::index("k must be positive"));
        }

        if self.entries.read().is_empty() {
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed(query).await?;

        let entries = self.entries.read();
        let mut scored: Vec<ScoredChunk> = entries
            .iter()
            .map(|entry| ScoredChunk {
                score: cosine_sim(&query_embedding, &entry.embedding),
                chunk: entry.chunk.clone(),
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    /// Remove everything, returning the number of chunks removed
    pub fn clear(&self) -> Result<usize> {
        let removed = {
            let mut entries = self.entries.write();
            let removed = entries.len();
            entries.clear();
            removed
        };
        self.save_snapshot()?;
        Ok(removed)
    }

    /// Number of chunks currently stored
    pub fn chunk_count(&self) -> usize {
        self.entries.read().len()
    }

    fn save_snapshot(&self) -> Result<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let entries = self.entries.read();
        let data = serde_json::to_string(&*entries)?;
        std::fs::write(path, data)?;
        Ok(())
    }
}

/// Cosine similarity between two vectors; 0.0 when either has no magnitude
fn cosine_sim(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
