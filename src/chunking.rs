//! Document chunking strategies.
//!
//! [`TextChunker`] splits document text into units that respect a token
//! budget, using one of four strategies:
//!
//! - [`ChunkStrategy::Fast`] — non-overlapping token windows (default
//!   ingestion path)
//! - [`ChunkStrategy::Tokens`] — sliding token windows with overlap
//! - [`ChunkStrategy::Sentences`] — greedy sentence accumulation with a
//!   token-window fallback for oversized sentences
//! - [`ChunkStrategy::Paragraphs`] — greedy paragraph accumulation with a
//!   sentence fallback for oversized paragraphs
//!
//! The recursive paragraph → sentence → token fallback guarantees every
//! chunk respects the budget regardless of input structure.

use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::document::{Chunk, ChunkMetadata, Document};
use crate::error::{RagError, Result};
use crate::tokenizer::Tokenizer;

/// Chunking strategy selector.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChunkStrategy {
    /// Non-overlapping fixed-size token windows.
    #[default]
    Fast,
    /// Sliding token windows with overlap.
    Tokens,
    /// Greedy sentence accumulation within the token budget.
    Sentences,
    /// Greedy paragraph accumulation within the token budget.
    Paragraphs,
}

impl ChunkStrategy {
    /// The strategy's canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkStrategy::Fast => "fast",
            ChunkStrategy::Tokens => "tokens",
            ChunkStrategy::Sentences => "sentences",
            ChunkStrategy::Paragraphs => "paragraphs",
        }
    }
}

impl FromStr for ChunkStrategy {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "fast" => Ok(ChunkStrategy::Fast),
            "tokens" => Ok(ChunkStrategy::Tokens),
            "sentences" => Ok(ChunkStrategy::Sentences),
            "paragraphs" => Ok(ChunkStrategy::Paragraphs),
            other => Err(RagError::UnknownStrategy(other.to_string())),
        }
    }
}

/// Splits document text into token-budgeted chunks.
///
/// Chunk IDs are generated as `{document_id}_chunk_{index}`. Each chunk
/// inherits the parent document's metadata plus `chunk_index`,
/// `total_chunks`, and `token_count`.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use ragpipe::chunking::{ChunkStrategy, TextChunker};
/// use ragpipe::tokenizer::WordTokenizer;
///
/// let chunker = TextChunker::new(Arc::new(WordTokenizer::new()), 512, 50)?;
/// let chunks = chunker.chunk_document(&document, ChunkStrategy::Fast);
/// ```
pub struct TextChunker {
    tokenizer: Arc<dyn Tokenizer>,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextChunker {
    /// Create a new `TextChunker`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if `chunk_size` is zero or
    /// `chunk_overlap >= chunk_size` (a non-positive window step would
    /// prevent forward progress).
    pub fn new(
        tokenizer: Arc<dyn Tokenizer>,
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> Result<Self> {
        if chunk_size == 0 {
            return Err(RagError::Config("chunk_size must be greater than zero".to_string()));
        }
        if chunk_overlap >= chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self { tokenizer, chunk_size, chunk_overlap })
    }

    /// Count the tokens in a text under the chunker's tokenizer.
    pub fn count_tokens(&self, text: &str) -> usize {
        self.tokenizer.count(text)
    }

    /// Split text into overlapping token windows.
    ///
    /// A window of `chunk_size` tokens slides forward by
    /// `chunk_size − chunk_overlap` tokens each step, so consecutive
    /// windows share exactly `chunk_overlap` tokens. Splitting stops
    /// after the window that reaches the end of the token sequence.
    pub fn split_by_tokens(&self, text: &str) -> Vec<String> {
        let tokens = self.tokenizer.encode(text);
        let mut chunks = Vec::new();
        let mut start = 0;

        while start < tokens.len() {
            let end = (start + self.chunk_size).min(tokens.len());
            chunks.push(self.tokenizer.decode(&tokens[start..end]));
            if end == tokens.len() {
                break;
            }
            start += self.chunk_size - self.chunk_overlap;
        }

        chunks
    }

    /// Split text into non-overlapping fixed-size token windows.
    ///
    /// This is an exact partition: re-tokenizing and concatenating the
    /// chunks reproduces the original token sequence.
    pub fn split_by_tokens_fast(&self, text: &str) -> Vec<String> {
        let tokens = self.tokenizer.encode(text);
        tokens.chunks(self.chunk_size).map(|window| self.tokenizer.decode(window)).collect()
    }

    /// Split text by sentences, greedily packing them into the token budget.
    ///
    /// A single sentence that exceeds the budget falls back to
    /// [`split_by_tokens`](TextChunker::split_by_tokens): all but the last
    /// produced window become finished chunks and accumulation continues
    /// from the last one.
    pub fn split_by_sentences(&self, text: &str) -> Vec<String> {
        self.accumulate(split_sentences(text), " ", |s| self.split_by_tokens(s))
    }

    /// Split text by paragraphs, greedily packing them into the token budget.
    ///
    /// A single paragraph that exceeds the budget falls back to
    /// [`split_by_sentences`](TextChunker::split_by_sentences).
    pub fn split_by_paragraphs(&self, text: &str) -> Vec<String> {
        let paragraphs: Vec<String> = text
            .split("\n\n")
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();
        self.accumulate(paragraphs, "\n\n", |p| self.split_by_sentences(p))
    }

    /// Greedy accumulation of units into budget-respecting chunks, with a
    /// fallback splitter for units that exceed the budget on their own.
    fn accumulate<F>(&self, units: Vec<String>, joiner: &str, fallback: F) -> Vec<String>
    where
        F: Fn(&str) -> Vec<String>,
    {
        let mut chunks = Vec::new();
        let mut current = String::new();

        for unit in units {
            let candidate = if current.is_empty() {
                unit.clone()
            } else {
                format!("{current}{joiner}{unit}")
            };

            if self.count_tokens(&candidate) <= self.chunk_size {
                current = candidate;
                continue;
            }

            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current).trim().to_string());
            }

            if self.count_tokens(&unit) <= self.chunk_size {
                current = unit;
            } else {
                let mut pieces = fallback(&unit);
                current = pieces.pop().unwrap_or_default();
                chunks.extend(pieces);
            }
        }

        if !current.is_empty() {
            chunks.push(current.trim().to_string());
        }

        chunks
    }

    /// Split a document and wrap the pieces into [`Chunk`]s.
    ///
    /// Produced chunks have deterministic IDs, contiguous `chunk_index`
    /// values `0..N-1`, `total_chunks == N`, a `token_count`, and the
    /// document's metadata inherited into `extra`. Returns an empty `Vec`
    /// for a document whose text produces no units.
    pub fn chunk_document(&self, document: &Document, strategy: ChunkStrategy) -> Vec<Chunk> {
        let units = match strategy {
            ChunkStrategy::Fast => self.split_by_tokens_fast(&document.text),
            ChunkStrategy::Tokens => self.split_by_tokens(&document.text),
            ChunkStrategy::Sentences => self.split_by_sentences(&document.text),
            ChunkStrategy::Paragraphs => self.split_by_paragraphs(&document.text),
        };

        let total_chunks = units.len();
        units
            .into_iter()
            .enumerate()
            .map(|(chunk_index, content)| {
                let token_count = self.count_tokens(&content);
                Chunk {
                    id: format!("{}_chunk_{chunk_index}", document.id),
                    content,
                    embedding: Vec::new(),
                    metadata: ChunkMetadata {
                        parent_document_id: document.id.clone(),
                        parent_document_title: document.title.clone(),
                        chunk_index,
                        total_chunks,
                        token_count,
                        extra: document.metadata.clone(),
                    },
                }
            })
            .collect()
    }

    /// Split a document, dispatching on a strategy name.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::UnknownStrategy`] for unrecognized names.
    pub fn chunk_document_by_name(&self, document: &Document, strategy: &str) -> Result<Vec<Chunk>> {
        Ok(self.chunk_document(document, strategy.parse()?))
    }
}

/// Split text at sentence-ending punctuation followed by whitespace.
///
/// The punctuation stays attached to its sentence; the whitespace run
/// separating sentences is consumed.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') && chars.peek().is_some_and(|n| n.is_whitespace()) {
            while chars.peek().is_some_and(|n| n.is_whitespace()) {
                chars.next();
            }
            sentences.push(std::mem::take(&mut current));
        }
    }

    if !current.trim().is_empty() {
        sentences.push(current);
    }

    sentences
}
