//! Splits page text into overlapping chunks for embedding and search.
//! Prefers paragraph boundaries; falls back to line breaks, then spaces, then characters.
//!
//! Sizes are counted in characters, not bytes.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::config::{validate_chunking, ConfigError};
use crate::loader::{SourceDocument, SourceRef};

/// Coarsest first. The empty separator splits into single characters.
pub const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// A chunk of text from one page, with source reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub source: SourceRef,
    /// Index of this chunk within its page (0, 1, 2, …).
    pub index: usize,
}

/// Chunk all documents. Chunks come out in document order, then reading order.
/// Fails if `chunk_size == 0` or `overlap >= chunk_size`.
pub fn split_documents(
    docs: &[SourceDocument],
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<Chunk>, ConfigError> {
    validate_chunking(chunk_size, overlap)?;
    let splitter = Splitter {
        chunk_size,
        overlap,
    };
    let chunks: Vec<Chunk> = docs
        .iter()
        .flat_map(|d| chunk_document(d, &splitter))
        .collect();
    tracing::debug!(documents = docs.len(), chunks = chunks.len(), chunk_size, overlap, "split documents");
    Ok(chunks)
}

fn chunk_document(doc: &SourceDocument, splitter: &Splitter) -> Vec<Chunk> {
    if doc.text.trim().is_empty() {
        return Vec::new();
    }
    splitter
        .split(&doc.text)
        .into_iter()
        .enumerate()
        .map(|(index, text)| Chunk {
            text,
            source: doc.source.clone(),
            index,
        })
        .collect()
}

struct Splitter {
    chunk_size: usize,
    overlap: usize,
}

impl Splitter {
    fn split(&self, text: &str) -> Vec<String> {
        self.split_with(text, &SEPARATORS)
    }

    /// Splits on the coarsest separator present in `text`, merges small pieces back up to
    /// `chunk_size`, and recurses with finer separators into pieces that are still too long.
    fn split_with(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let pos = separators
            .iter()
            .position(|s| s.is_empty() || text.contains(s))
            .unwrap_or(separators.len().saturating_sub(1));
        let separator = separators.get(pos).copied().unwrap_or("");
        let finer = separators.get(pos + 1..).unwrap_or(&[]);

        let mut chunks = Vec::new();
        let mut pending: Vec<&str> = Vec::new();
        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) < self.chunk_size {
                pending.push(piece);
                continue;
            }
            if !pending.is_empty() {
                chunks.extend(self.merge(&pending));
                pending.clear();
            }
            if finer.is_empty() {
                push_trimmed(&mut chunks, piece);
            } else {
                chunks.extend(self.split_with(piece, finer));
            }
        }
        if !pending.is_empty() {
            chunks.extend(self.merge(&pending));
        }
        chunks
    }

    /// Greedily packs consecutive pieces (each shorter than `chunk_size`) into chunks.
    /// After each emitted chunk, at most `overlap` characters of trailing pieces carry over.
    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut window: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0;
        for &piece in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size && !window.is_empty() {
                push_trimmed(&mut chunks, &join(&window));
                while total > self.overlap || (total > 0 && total + len > self.chunk_size) {
                    match window.pop_front() {
                        Some((_, l)) => total -= l,
                        None => break,
                    }
                }
            }
            window.push_back((piece, len));
            total += len;
        }
        if !window.is_empty() {
            push_trimmed(&mut chunks, &join(&window));
        }
        chunks
    }
}

/// Splits `text` so that each separator starts the piece that follows it.
/// The empty separator yields one piece per character.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }
    let mut pieces = Vec::new();
    let mut start = 0;
    for (pos, _) in text.match_indices(separator) {
        if pos > start {
            pieces.push(&text[start..pos]);
        }
        start = pos;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

fn join(window: &VecDeque<(&str, usize)>) -> String {
    window.iter().map(|(s, _)| *s).collect()
}

fn push_trimmed(chunks: &mut Vec<String>, text: &str) {
    let t = text.trim();
    if !t.is_empty() {
        chunks.push(t.to_string());
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
