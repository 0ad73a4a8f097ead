//! All backend logic independent of how the app is run.
//!
//! PDFs live in a folder the user chooses. JuRAG stores only config and the persisted
//! index in its own app data directory (see [app_data]).

pub mod answer;
pub mod app_data;
pub mod chunks;
pub mod config;
pub mod embedding;
pub mod llm;
pub mod loader;
pub mod ollama;
pub mod pipeline;
pub mod retriever;
pub mod store;

pub use answer::{Answer, SynthesisError, Synthesizer};
pub use app_data::app_data_dir;
pub use chunks::{split_documents, Chunk};
pub use config::{
    load_config, save_config, set_pdf_dir, Config, ConfigError, LlmProvider, PipelineSettings,
};
pub use embedding::{Embedder, EmbeddingError};
pub use llm::{GroqClient, LanguageModel, LlmError};
pub use loader::{load_pdfs, Corpus, IngestionError, SourceDocument, SourceRef};
pub use ollama::{OllamaClient, OllamaError};
pub use pipeline::{InitReport, Pipeline, PipelineError};
pub use retriever::{RetrievalError, Retriever};
pub use store::{ScoredChunk, StoreError, VectorStore};
