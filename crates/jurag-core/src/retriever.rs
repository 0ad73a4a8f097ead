//! Top-k retrieval: embed the question with the index's embedder, then search.

use crate::config::DEFAULT_TOP_K;
use crate::embedding::{Embedder, EmbeddingError};
use crate::store::{ScoredChunk, StoreError, VectorStore};

#[derive(Debug, Clone, Copy)]
pub struct Retriever {
    k: usize,
}

impl Default for Retriever {
    fn default() -> Self {
        Self { k: DEFAULT_TOP_K }
    }
}

impl Retriever {
    pub fn new(k: usize) -> Self {
        Self { k }
    }

    /// Returns at most `k` chunks, most relevant first.
    #[tracing::instrument(skip_all, fields(k = self.k))]
    pub async fn retrieve(
        &self,
        question: &str,
        embedder: &dyn Embedder,
        store: &VectorStore,
    ) -> Result<Vec<ScoredChunk>, RetrievalError> {
        let query = embedder.embed(question).await?;
        let hits = store.search(&query, self.k)?;
        tracing::debug!(
            hits = hits.len(),
            top_score = hits.first().map(|h| h.score),
            "retrieved context"
        );
        Ok(hits)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("embedding: {0}")]
    Embedding(#[from] EmbeddingError),
    #[error("search: {0}")]
    Search(#[from] StoreError),
}
