//! Embedding provider seam. The index is built and queried through this trait so the
//! same model produces both sides of every similarity comparison.

use async_trait::async_trait;

/// Maps text to a fixed-dimension vector. Deterministic for a given model.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier, recorded in the persisted index.
    fn model(&self) -> &str;

    /// Length of every vector this embedder returns.
    fn dimensions(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// One vector per input, same order. Equivalent to calling [`Embedder::embed`] on each.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

/// Checks a vector returned by a backend before it enters the index or a search.
pub fn check_vector(vector: &[f32], dimensions: usize) -> Result<(), EmbeddingError> {
    if vector.len() != dimensions {
        return Err(EmbeddingError::UnexpectedDimension {
            expected: dimensions,
            actual: vector.len(),
        });
    }
    if vector.iter().any(|x| !x.is_finite()) {
        return Err(EmbeddingError::NonFinite);
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("embedding backend failed ({provider}): {message}")]
    Backend { provider: String, message: String },
    #[error("embedding backend returned no vector")]
    EmptyResponse,
    #[error("embedding backend returned {actual} vectors for {expected} inputs")]
    CountMismatch { expected: usize, actual: usize },
    #[error("expected {expected}-dimensional embedding, got {actual}")]
    UnexpectedDimension { expected: usize, actual: usize },
    #[error("embedding contains NaN or infinite values")]
    NonFinite,
}
