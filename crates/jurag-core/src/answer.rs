//! Grounded answers: stuff the retrieved chunks into one prompt, ask the language model,
//! and attribute the answer to the pages the context came from.

use std::collections::HashSet;
use std::fmt::Write as _;

use serde::Serialize;

use crate::config::DEFAULT_MAX_CONTEXT_CHARS;
use crate::llm::{LanguageModel, LlmError};
use crate::loader::SourceRef;
use crate::store::ScoredChunk;

/// Returned without calling the model when the index had nothing to offer.
pub const NO_CONTEXT_ANSWER: &str = "No relevant context found in the indexed documents.";

const INSTRUCTIONS: &str = "Answer the question using only the context below. \
If the context does not contain the answer, say that you don't know; do not make one up.";

/// An answer and the pages it was grounded on, in rank order without duplicates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<SourceRef>,
}

/// The chunks that made it into a prompt, possibly with the last one cut short.
struct Context<'a> {
    parts: Vec<(&'a ScoredChunk, String)>,
}

#[derive(Debug, Clone, Copy)]
pub struct Synthesizer {
    max_context_chars: usize,
}

impl Default for Synthesizer {
    fn default() -> Self {
        Self {
            max_context_chars: DEFAULT_MAX_CONTEXT_CHARS,
        }
    }
}

impl Synthesizer {
    pub fn new(max_context_chars: usize) -> Self {
        Self { max_context_chars }
    }

    /// Builds the grounding prompt, calls the model once and attributes the result.
    #[tracing::instrument(skip_all, fields(retrieved = retrieved.len()))]
    pub async fn answer(
        &self,
        question: &str,
        retrieved: &[ScoredChunk],
        llm: &dyn LanguageModel,
    ) -> Result<Answer, SynthesisError> {
        if retrieved.is_empty() {
            tracing::info!("no context retrieved, skipping language model");
            return Ok(Answer {
                text: NO_CONTEXT_ANSWER.to_string(),
                sources: Vec::new(),
            });
        }
        let context = self.select_context(retrieved);
        let prompt = render_prompt(question, &context);
        let text = llm.complete(&prompt).await?;
        let text = text.trim();
        if text.is_empty() {
            return Err(SynthesisError::EmptyAnswer);
        }
        Ok(Answer {
            text: text.to_string(),
            sources: unique_sources(context.parts.iter().map(|(hit, _)| *hit)),
        })
    }

    /// The prompt [`Synthesizer::answer`] would send.
    pub fn build_prompt(&self, question: &str, retrieved: &[ScoredChunk]) -> String {
        render_prompt(question, &self.select_context(retrieved))
    }

    /// Takes chunks in rank order until the character budget is spent. The chunk that
    /// crosses the budget is truncated and the rest are dropped; the top chunk always goes in.
    fn select_context<'a>(&self, retrieved: &'a [ScoredChunk]) -> Context<'a> {
        let mut remaining = self.max_context_chars;
        let mut parts = Vec::new();
        for hit in retrieved {
            let len = hit.chunk.text.chars().count();
            if len <= remaining {
                parts.push((hit, hit.chunk.text.clone()));
                remaining -= len;
                continue;
            }
            if remaining > 0 || parts.is_empty() {
                let cut: String = hit.chunk.text.chars().take(remaining.max(1)).collect();
                parts.push((hit, cut));
            }
            tracing::debug!(
                kept = parts.len(),
                dropped = retrieved.len() - parts.len(),
                "context budget reached"
            );
            break;
        }
        Context { parts }
    }
}

fn render_prompt(question: &str, context: &Context<'_>) -> String {
    let mut prompt = String::new();
    prompt.push_str(INSTRUCTIONS);
    prompt.push_str("\n\nContext:\n");
    for (i, (hit, text)) in context.parts.iter().enumerate() {
        let _ = write!(prompt, "\n[{}] {}\n{}\n", i + 1, hit.chunk.source, text);
    }
    let _ = write!(prompt, "\nQuestion: {}\nAnswer:", question.trim());
    prompt
}

/// `(source_path, page_number)` pairs in first-seen order.
fn unique_sources<'a>(hits: impl Iterator<Item = &'a ScoredChunk>) -> Vec<SourceRef> {
    let mut seen = HashSet::new();
    let mut sources = Vec::new();
    for hit in hits {
        if seen.insert(hit.chunk.source.clone()) {
            sources.push(hit.chunk.source.clone());
        }
    }
    sources
}

#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    #[error("language model failed: {0}")]
    Llm(#[from] LlmError),
    #[error("language model returned an empty answer")]
    EmptyAnswer,
}
