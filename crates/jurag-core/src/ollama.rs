//! Ollama client for embeddings and completion. Wraps ollama-rs with a simple API.

use async_trait::async_trait;
use ollama_rs::generation::completion::request::GenerationRequest;
use ollama_rs::generation::embeddings::request::{EmbeddingsInput, GenerateEmbeddingsRequest};
use ollama_rs::Ollama;
use thiserror::Error;

use crate::embedding::{check_vector, Embedder, EmbeddingError};
use crate::llm::{LanguageModel, LlmError};

/// Ollama's packaging of all-MiniLM-L6-v2.
pub const DEFAULT_EMBED_MODEL: &str = "all-minilm";
pub const DEFAULT_EMBED_DIMENSIONS: usize = 384;
pub const DEFAULT_COMPLETION_MODEL: &str = "llama3.2";
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

const PROVIDER: &str = "ollama";

/// Thin wrapper around Ollama for embedding and completion.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    inner: Ollama,
    embed_model: String,
    dimensions: usize,
    completion_model: String,
}

impl OllamaClient {
    /// Create from URL string, e.g. `http://localhost:11434`.
    pub fn from_url(url: &str) -> Result<Self, OllamaError> {
        let inner = Ollama::try_new(url).map_err(OllamaError::ParseUrl)?;
        Ok(Self {
            inner,
            embed_model: DEFAULT_EMBED_MODEL.to_string(),
            dimensions: DEFAULT_EMBED_DIMENSIONS,
            completion_model: DEFAULT_COMPLETION_MODEL.to_string(),
        })
    }

    /// Set the embedding model and the vector size it produces (e.g. `nomic-embed-text`, 768).
    pub fn with_embed_model(mut self, model: impl Into<String>, dimensions: usize) -> Self {
        self.embed_model = model.into();
        self.dimensions = dimensions;
        self
    }

    /// Set the model used by [`LanguageModel::complete`].
    pub fn with_completion_model(mut self, model: impl Into<String>) -> Self {
        self.completion_model = model.into();
        self
    }

    async fn request_embeddings(&self, input: EmbeddingsInput) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let req = GenerateEmbeddingsRequest::new(self.embed_model.clone(), input);
        let res = self
            .inner
            .generate_embeddings(req)
            .await
            .map_err(|e| backend_error(OllamaError::Request(e)))?;
        Ok(res.embeddings)
    }
}

fn backend_error(e: OllamaError) -> EmbeddingError {
    EmbeddingError::Backend {
        provider: PROVIDER.to_string(),
        message: e.to_string(),
    }
}

#[async_trait]
impl Embedder for OllamaClient {
    fn model(&self) -> &str {
        &self.embed_model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Embed a single string. Returns the embedding vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let embedding = self
            .request_embeddings(EmbeddingsInput::Single(text.to_string()))
            .await?
            .into_iter()
            .next()
            .ok_or(EmbeddingError::EmptyResponse)?;
        check_vector(&embedding, self.dimensions)?;
        Ok(embedding)
    }

    /// Embed multiple strings in one call. Returns one embedding per input.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        tracing::debug!(batch_size = texts.len(), model = %self.embed_model, "embedding batch");
        let embeddings = self
            .request_embeddings(EmbeddingsInput::Multiple(texts.to_vec()))
            .await?;
        if embeddings.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: texts.len(),
                actual: embeddings.len(),
            });
        }
        for e in &embeddings {
            check_vector(e, self.dimensions)?;
        }
        Ok(embeddings)
    }
}

#[async_trait]
impl LanguageModel for OllamaClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let req = GenerationRequest::new(self.completion_model.clone(), prompt.to_string());
        let res = self
            .inner
            .generate(req)
            .await
            .map_err(|e| LlmError::Request(OllamaError::Request(e).to_string()))?;
        Ok(res.response)
    }
}

#[derive(Debug, Error)]
pub enum OllamaError {
    #[error("invalid Ollama URL: {0}")]
    ParseUrl(#[from] url::ParseError),
    #[error("Ollama request failed: {0}")]
    Request(#[from] ollama_rs::error::OllamaError),
}
