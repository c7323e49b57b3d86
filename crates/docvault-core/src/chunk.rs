//! Recursive, overlapping text splitter.
//!
//! Splits extracted document text into segments of at most `chunk_size`
//! characters. Splitting prefers the coarsest separator that still
//! respects the bound, cascading through paragraph breaks, line breaks,
//! sentence ends, and spaces before falling back to a hard character
//! split.
//!
//! # Algorithm
//!
//! 1. Text no longer than `chunk_size` is returned as a single chunk.
//! 2. Otherwise pick the first separator that occurs in the text and split
//!    on it, keeping each separator attached to the piece before it.
//! 3. Pieces that fit are merged greedily into chunks. When a chunk is
//!    emitted, its trailing pieces (up to `chunk_overlap` characters) seed
//!    the next chunk.
//! 4. Pieces that are still too long are split recursively with the
//!    remaining separators; with none left they are cut into windows of
//!    `chunk_size` characters stepping by `chunk_size - chunk_overlap`.
//!
//! Lengths are counted in `char`s, never bytes, so multi-byte text is
//! never cut inside a code point.
//!
//! # Example
//!
//! ```rust
//! use docvault_core::chunk::TextSplitter;
//!
//! let splitter = TextSplitter::builder().chunk_size(40).chunk_overlap(10).build().unwrap();
//! let chunks = splitter.split("First paragraph here.\n\nSecond paragraph follows it.");
//! assert_eq!(chunks.len(), 2);
//! ```

use std::collections::VecDeque;

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::embedding::Embedding;
use crate::error::{Result, VaultError};
use crate::models::{Chunk, ChunkMetadata, NewChunk};

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Separators tried in order, coarsest first.
pub const DEFAULT_SEPARATORS: &[&str] = &["\n\n", "\n", ". ", " "];

/// Splits text into bounded, overlapping chunks.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl TextSplitter {
    pub fn builder() -> TextSplitterBuilder {
        TextSplitterBuilder::default()
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split `text` into chunk texts, in document order.
    ///
    /// Returns an empty `Vec` for empty or whitespace-only text.
    pub fn split(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        if char_len(text) <= self.chunk_size {
            return vec![text.to_string()];
        }

        self.split_recursive(text, &self.separators)
            .into_iter()
            .filter(|c| !c.trim().is_empty())
            .collect()
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let position = separators.iter().position(|s| text.contains(s.as_str()));
        let Some(idx) = position else {
            return self.hard_split(text);
        };
        let remaining = &separators[idx + 1..];

        let mut chunks = Vec::new();
        let mut fitting: Vec<&str> = Vec::new();

        for piece in split_keeping_separator(text, &separators[idx]) {
            if char_len(piece) <= self.chunk_size {
                fitting.push(piece);
                continue;
            }
            if !fitting.is_empty() {
                chunks.extend(self.merge(&fitting));
                fitting.clear();
            }
            chunks.extend(self.split_recursive(piece, remaining));
        }

        if !fitting.is_empty() {
            chunks.extend(self.merge(&fitting));
        }

        chunks
    }

    /// Greedily merge pieces into chunks, carrying trailing pieces forward
    /// as overlap.
    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut window: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size && !window.is_empty() {
                chunks.push(window.iter().map(|(p, _)| *p).collect::<String>());
                while total > self.chunk_overlap || (total > 0 && total + len > self.chunk_size) {
                    match window.pop_front() {
                        Some((_, popped)) => total -= popped,
                        None => break,
                    }
                }
            }
            window.push_back((piece, len));
            total += len;
        }

        if !window.is_empty() {
            chunks.push(window.iter().map(|(p, _)| *p).collect::<String>());
        }

        chunks
    }

    /// Cut text into fixed character windows with overlap.
    fn hard_split(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let step = self.chunk_size.saturating_sub(self.chunk_overlap).max(1);
        let mut chunks = Vec::new();
        let mut start = 0;

        while start < chars.len() {
            let end = (start + self.chunk_size).min(chars.len());
            chunks.push(chars[start..end].iter().collect());
            if end == chars.len() {
                break;
            }
            start += step;
        }

        chunks
    }
}

/// Builder for a validated [`TextSplitter`].
#[derive(Debug, Clone, Default)]
pub struct TextSplitterBuilder {
    splitter: TextSplitter,
}

impl TextSplitterBuilder {
    /// Maximum chunk length in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.splitter.chunk_size = size;
        self
    }

    /// Characters shared between adjacent chunks.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.splitter.chunk_overlap = overlap;
        self
    }

    /// Replace the separator cascade (coarsest first).
    pub fn separators<I, S>(mut self, separators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.splitter.separators = separators
            .into_iter()
            .map(Into::into)
            .filter(|s: &String| !s.is_empty())
            .collect();
        self
    }

    /// # Errors
    ///
    /// Returns [`VaultError::Config`] if `chunk_size` is zero or
    /// `chunk_overlap >= chunk_size`.
    pub fn build(self) -> Result<TextSplitter> {
        if self.splitter.chunk_size == 0 {
            return Err(VaultError::Config("chunk_size must be > 0".to_string()));
        }
        if self.splitter.chunk_overlap >= self.splitter.chunk_size {
            return Err(VaultError::Config(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.splitter.chunk_overlap, self.splitter.chunk_size
            )));
        }
        Ok(self.splitter)
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Split text at a separator, keeping the separator on the preceding piece.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    let mut pieces = Vec::new();
    let mut start = 0;

    while let Some(pos) = text[start..].find(separator) {
        let end = start + pos + separator.len();
        pieces.push(&text[start..end]);
        start = end;
    }

    if start < text.len() {
        pieces.push(&text[start..]);
    }

    pieces
}

/// Pair chunk texts with their embeddings and build per-chunk metadata.
pub fn prepare_chunks(
    filename: &str,
    texts: Vec<String>,
    embeddings: Vec<Embedding>,
) -> Vec<NewChunk> {
    let total = texts.len();
    texts
        .into_iter()
        .zip(embeddings)
        .map(|(text, embedding)| NewChunk {
            metadata: ChunkMetadata {
                source: filename.to_string(),
                chunk_length: char_len(&text),
                total_chunks: total,
                fallback: embedding.fallback,
                model: embedding.model,
            },
            embedding: embedding.vector,
            text,
        })
        .collect()
}

/// Assign an id, ordinal, and content hash to a pipeline chunk.
pub fn make_chunk(document_id: &str, index: i64, chunk: NewChunk, created_at: i64) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(chunk.text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: Uuid::new_v4().to_string(),
        document_id: document_id.to_string(),
        chunk_index: index,
        text: chunk.text,
        embedding: chunk.embedding,
        metadata: chunk.metadata,
        hash,
        created_at,
    }
}
