//! Pipeline: load → chunk → embed → store on first run, restore on later runs, then
//! retrieve → answer per question.
//!
//! A [`Pipeline`] is either uninitialized or ready. `initialize` is the only transition.

use std::sync::Arc;

use crate::answer::{Answer, SynthesisError, Synthesizer};
use crate::chunks::split_documents;
use crate::config::{ConfigError, PipelineSettings};
use crate::embedding::{Embedder, EmbeddingError};
use crate::llm::LanguageModel;
use crate::loader::{load_pdfs, IngestionError};
use crate::retriever::{RetrievalError, Retriever};
use crate::store::{StoreError, VectorStore};

/// What `initialize` did to reach the ready state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitReport {
    /// A persisted index was reused; nothing was embedded.
    Restored { chunks: usize },
    /// Documents were ingested and a fresh index was built and persisted.
    Built {
        pages: usize,
        chunks: usize,
        skipped_files: usize,
    },
    /// The pipeline was already ready.
    AlreadyReady { chunks: usize },
}

enum State {
    Uninitialized,
    Ready {
        store: VectorStore,
        retriever: Retriever,
        synthesizer: Synthesizer,
    },
}

/// Caller-owned question-answering pipeline over one PDF directory and one index path.
pub struct Pipeline {
    settings: PipelineSettings,
    embedder: Arc<dyn Embedder>,
    llm: Arc<dyn LanguageModel>,
    state: State,
}

impl Pipeline {
    pub fn new(
        settings: PipelineSettings,
        embedder: Arc<dyn Embedder>,
        llm: Arc<dyn LanguageModel>,
    ) -> Self {
        Self {
            settings,
            embedder,
            llm,
            state: State::Uninitialized,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, State::Ready { .. })
    }

    /// Number of chunks in the live index, if ready.
    pub fn indexed_chunks(&self) -> Option<usize> {
        match &self.state {
            State::Ready { store, .. } => Some(store.len()),
            State::Uninitialized => None,
        }
    }

    /// Restores the persisted index if there is one, otherwise ingests the PDF directory,
    /// builds the index and persists it. Calling it again once ready does nothing.
    #[tracing::instrument(skip_all, fields(pdf_dir = %self.settings.pdf_dir.display(), index_path = %self.settings.index_path.display()))]
    pub async fn initialize(&mut self) -> Result<InitReport, PipelineError> {
        if let State::Ready { store, .. } = &self.state {
            return Ok(InitReport::AlreadyReady {
                chunks: store.len(),
            });
        }
        self.settings.validate()?;

        let (store, report) = if VectorStore::exists(&self.settings.index_path) {
            let store = VectorStore::restore(
                &self.settings.index_path,
                self.embedder.model(),
                self.embedder.dimensions(),
            )?;
            let report = InitReport::Restored {
                chunks: store.len(),
            };
            (store, report)
        } else {
            self.build_index().await?
        };
        self.become_ready(store);
        Ok(report)
    }

    /// Ingests the PDF directory again and replaces the persisted index, ignoring any
    /// index already on disk. The old index stays in place (and live, if this pipeline
    /// was ready) until the new one has been built and persisted.
    #[tracing::instrument(skip_all, fields(pdf_dir = %self.settings.pdf_dir.display(), index_path = %self.settings.index_path.display()))]
    pub async fn rebuild(&mut self) -> Result<InitReport, PipelineError> {
        self.settings.validate()?;
        let (store, report) = self.build_index().await?;
        self.become_ready(store);
        Ok(report)
    }

    fn become_ready(&mut self, store: VectorStore) {
        tracing::info!(chunks = store.len(), "pipeline ready");
        self.state = State::Ready {
            store,
            retriever: Retriever::new(self.settings.top_k),
            synthesizer: Synthesizer::new(self.settings.max_context_chars),
        };
    }

    async fn build_index(&self) -> Result<(VectorStore, InitReport), PipelineError> {
        let pdf_dir = self.settings.pdf_dir.clone();
        let corpus = tokio::task::spawn_blocking(move || load_pdfs(&pdf_dir))
            .await
            .map_err(|e| IngestionError::Task(e.to_string()))??;
        tracing::info!(pages = corpus.documents.len(), "PDFs loaded");

        let chunks = split_documents(
            &corpus.documents,
            self.settings.chunk_size,
            self.settings.overlap,
        )?;
        tracing::info!(chunks = chunks.len(), "chunks generated");
        // Never persist an empty index.
        if chunks.is_empty() {
            return Err(IngestionError::EmptyCorpus {
                dir: self.settings.pdf_dir.clone(),
                skipped: corpus.skipped.len(),
            }
            .into());
        }

        let chunk_count = chunks.len();
        let store = VectorStore::build(chunks, self.embedder.as_ref()).await?;
        store.persist(&self.settings.index_path)?;

        let report = InitReport::Built {
            pages: corpus.documents.len(),
            chunks: chunk_count,
            skipped_files: corpus.skipped.len(),
        };
        Ok((store, report))
    }

    /// Answers a question from the indexed documents. Requires a prior `initialize`.
    #[tracing::instrument(skip_all)]
    pub async fn ask(&self, question: &str) -> Result<Answer, PipelineError> {
        let State::Ready {
            store,
            retriever,
            synthesizer,
        } = &self.state
        else {
            return Err(PipelineError::NotReady);
        };
        if question.trim().is_empty() {
            return Err(PipelineError::EmptyQuestion);
        }
        let hits = retriever
            .retrieve(question, self.embedder.as_ref(), store)
            .await?;
        let answer = synthesizer
            .answer(question, &hits, self.llm.as_ref())
            .await?;
        tracing::info!(sources = answer.sources.len(), "question answered");
        Ok(answer)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("pipeline is not initialized; call initialize first")]
    NotReady,
    #[error("question is empty")]
    EmptyQuestion,
    #[error("ingestion error: {0}")]
    Ingestion(#[from] IngestionError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),
    #[error("index error: {0}")]
    Store(#[from] StoreError),
    #[error("synthesis error: {0}")]
    Synthesis(#[from] SynthesisError),
}

impl From<RetrievalError> for PipelineError {
    fn from(e: RetrievalError) -> Self {
        match e {
            RetrievalError::Embedding(e) => Self::Embedding(e),
            RetrievalError::Search(e) => Self::Store(e),
        }
    }
}
