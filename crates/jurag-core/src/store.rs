//! Vector store for chunk embeddings: build from chunks, exact cosine search, and
//! atomic persistence so a second run can reuse the index without re-embedding.
//!
//! On disk the index is a directory holding a single `index.json`.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::chunks::Chunk;
use crate::embedding::{check_vector, Embedder, EmbeddingError};

pub const INDEX_FILENAME: &str = "index.json";
const FORMAT_VERSION: u32 = 1;
/// Texts per embedding request when building.
pub const EMBED_BATCH_SIZE: usize = 64;

/// A chunk with its embedding, stored for similarity search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedChunk {
    pub chunk: Chunk,
    /// Normalized embedding vector (unit length for cosine similarity via dot product).
    embedding: Vec<f32>,
}

/// One search hit. Higher score is more similar.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Holds chunks and their embeddings; supports similarity search.
/// All vectors share one dimension and come from one embedding model.
#[derive(Debug, Clone)]
pub struct VectorStore {
    model: String,
    dimensions: usize,
    items: Vec<IndexedChunk>,
}

#[derive(Serialize)]
struct IndexFileRef<'a> {
    format_version: u32,
    model: &'a str,
    dimensions: usize,
    items: &'a [IndexedChunk],
}

#[derive(Deserialize)]
struct IndexFile {
    format_version: u32,
    model: String,
    dimensions: usize,
    items: Vec<IndexedChunk>,
}

impl VectorStore {
    pub fn new(model: impl Into<String>, dimensions: usize) -> Self {
        Self {
            model: model.into(),
            dimensions,
            items: Vec::new(),
        }
    }

    /// Embeds every chunk (in batches) and stores them in order.
    #[tracing::instrument(skip_all, fields(chunks = chunks.len(), model = embedder.model()))]
    pub async fn build(chunks: Vec<Chunk>, embedder: &dyn Embedder) -> Result<Self, EmbeddingError> {
        let mut store = Self::new(embedder.model(), embedder.dimensions());
        let mut remaining = chunks.into_iter().peekable();
        while remaining.peek().is_some() {
            let batch: Vec<Chunk> = remaining.by_ref().take(EMBED_BATCH_SIZE).collect();
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embeddings = embedder.embed_batch(&texts).await?;
            if embeddings.len() != batch.len() {
                return Err(EmbeddingError::CountMismatch {
                    expected: batch.len(),
                    actual: embeddings.len(),
                });
            }
            store.add_batch(batch, embeddings)?;
        }
        tracing::info!(entries = store.len(), dimensions = store.dimensions, "vector index built");
        Ok(store)
    }

    /// Add a chunk with its embedding. Embedding is normalized before storage.
    pub fn add(&mut self, chunk: Chunk, embedding: Vec<f32>) -> Result<(), EmbeddingError> {
        check_vector(&embedding, self.dimensions)?;
        self.items.push(IndexedChunk {
            chunk,
            embedding: normalize(&embedding),
        });
        Ok(())
    }

    /// Add multiple chunks with embeddings in one batch.
    pub fn add_batch(&mut self, chunks: Vec<Chunk>, embeddings: Vec<Vec<f32>>) -> Result<(), EmbeddingError> {
        if chunks.len() != embeddings.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: chunks.len(),
                actual: embeddings.len(),
            });
        }
        for (chunk, embedding) in chunks.into_iter().zip(embeddings) {
            self.add(chunk, embedding)?;
        }
        Ok(())
    }

    /// Returns the `min(k, len)` chunks most similar to the query, best first.
    /// Equal scores keep insertion order.
    pub fn search(&self, query_embedding: &[f32], k: usize) -> Result<Vec<ScoredChunk>, StoreError> {
        if k == 0 {
            return Err(StoreError::InvalidTopK);
        }
        if query_embedding.len() != self.dimensions {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimensions,
                actual: query_embedding.len(),
            });
        }
        let q_norm = normalize(query_embedding);
        let mut scored: Vec<ScoredChunk> = self
            .items
            .iter()
            .map(|ic| ScoredChunk {
                chunk: ic.chunk.clone(),
                score: dot(&q_norm, &ic.embedding),
            })
            .collect();
        // sort_by is stable, so ties stay in insertion order.
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);
        Ok(scored)
    }

    /// Whether a persisted index exists under `dir`.
    pub fn exists(dir: &Path) -> bool {
        index_file(dir).is_file()
    }

    /// Writes the index to `dir/index.json` through a temp file renamed into place,
    /// so a concurrent reader sees either the old file or the complete new one.
    #[tracing::instrument(skip_all, fields(dir = %dir.display()))]
    pub fn persist(&self, dir: &Path) -> Result<(), StoreError> {
        std::fs::create_dir_all(dir).map_err(|e| StoreError::Persist(dir.to_path_buf(), e))?;
        let file = IndexFileRef {
            format_version: FORMAT_VERSION,
            model: &self.model,
            dimensions: self.dimensions,
            items: &self.items,
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .map_err(|e| StoreError::Persist(dir.to_path_buf(), e))?;
        serde_json::to_writer(&mut tmp, &file)
            .map_err(|e| StoreError::Persist(dir.to_path_buf(), e.into()))?;
        tmp.flush()
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| StoreError::Persist(dir.to_path_buf(), e))?;
        let target = index_file(dir);
        tmp.persist(&target)
            .map_err(|e| StoreError::Persist(target.clone(), e.error))?;
        tracing::info!(entries = self.len(), path = %target.display(), "vector index persisted");
        Ok(())
    }

    /// Loads an index written by [`VectorStore::persist`]. Fails with [`StoreError::Corrupt`]
    /// when the file is unreadable or was built with a different model or dimension.
    #[tracing::instrument(skip_all, fields(dir = %dir.display()))]
    pub fn restore(dir: &Path, model: &str, dimensions: usize) -> Result<Self, StoreError> {
        let path = index_file(dir);
        let corrupt = |reason: String| StoreError::Corrupt {
            path: path.clone(),
            reason,
        };
        let bytes = std::fs::read(&path).map_err(|e| corrupt(format!("cannot read: {e}")))?;
        let file: IndexFile =
            serde_json::from_slice(&bytes).map_err(|e| corrupt(format!("cannot parse: {e}")))?;
        if file.format_version != FORMAT_VERSION {
            return Err(corrupt(format!("unsupported format version {}", file.format_version)));
        }
        if file.model != model {
            return Err(corrupt(format!(
                "built with embedding model {:?}, active model is {:?}",
                file.model, model
            )));
        }
        if file.dimensions != dimensions {
            return Err(corrupt(format!(
                "index dimension {} does not match embedder dimension {}",
                file.dimensions, dimensions
            )));
        }
        if let Some(bad) = file.items.iter().find(|ic| ic.embedding.len() != dimensions) {
            return Err(corrupt(format!(
                "stored vector of length {} in a {}-dimensional index",
                bad.embedding.len(),
                dimensions
            )));
        }
        tracing::info!(entries = file.items.len(), "vector index restored");
        Ok(Self {
            model: file.model,
            dimensions: file.dimensions,
            items: file.items,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Number of indexed chunks.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

fn index_file(dir: &Path) -> PathBuf {
    dir.join(INDEX_FILENAME)
}

fn normalize(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm <= 0.0 {
        return v.to_vec();
    }
    v.iter().map(|x| x / norm).collect()
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("persisted index at {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },
    #[error("query has dimension {actual}, index has {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("k must be at least 1")]
    InvalidTopK,
    #[error("failed to persist index to {0}: {1}")]
    Persist(PathBuf, std::io::Error),
}
