//! Tokenizer seam for the chunker.
//!
//! Chunk sizes are token budgets, so the chunker needs an encode/decode
//! round trip. [`WordTokenizer`] is the built-in deterministic
//! implementation; [`HfTokenizer`] wraps a HuggingFace `tokenizer.json`
//! model behind the `hf-tokenizer` feature.

use std::collections::HashMap;
use std::sync::RwLock;

#[cfg(feature = "hf-tokenizer")]
use crate::error::{RagError, Result};

/// Encodes text into token ids and decodes them back.
///
/// A [`crate::chunking::TextChunker`] holds exactly one tokenizer for its
/// lifetime, so token counts and window boundaries are stable across an
/// ingestion run.
pub trait Tokenizer: Send + Sync {
    /// Encode text into a sequence of token ids.
    fn encode(&self, text: &str) -> Vec<u32>;

    /// Decode a sequence of token ids back into text.
    fn decode(&self, tokens: &[u32]) -> String;

    /// Count the tokens in a text.
    fn count(&self, text: &str) -> usize {
        self.encode(text).len()
    }
}

#[derive(Default)]
struct Vocab {
    ids: HashMap<String, u32>,
    words: Vec<String>,
}

/// Whitespace word tokenizer with a per-instance vocabulary.
///
/// Ids are assigned in first-seen order, so encoding is deterministic for
/// a given instance and decode is exact at the word level. Decoding joins
/// words with single spaces: round-tripping normalizes whitespace but
/// preserves the word sequence.
#[derive(Default)]
pub struct WordTokenizer {
    vocab: RwLock<Vocab>,
}

impl WordTokenizer {
    /// Create a tokenizer with an empty vocabulary.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Tokenizer for WordTokenizer {
    fn encode(&self, text: &str) -> Vec<u32> {
        let mut vocab = self.vocab.write().unwrap_or_else(|e| e.into_inner());
        text.split_whitespace()
            .map(|word| {
                if let Some(&id) = vocab.ids.get(word) {
                    id
                } else {
                    let id = vocab.words.len() as u32;
                    vocab.ids.insert(word.to_string(), id);
                    vocab.words.push(word.to_string());
                    id
                }
            })
            .collect()
    }

    fn decode(&self, tokens: &[u32]) -> String {
        let vocab = self.vocab.read().unwrap_or_else(|e| e.into_inner());
        let words: Vec<&str> =
            tokens.iter().filter_map(|&id| vocab.words.get(id as usize).map(String::as_str)).collect();
        words.join(" ")
    }
}

/// Tokenizer backed by a HuggingFace `tokenizer.json` model.
///
/// Special tokens are not added during encoding so that decoding a window
/// reproduces the original text span.
#[cfg(feature = "hf-tokenizer")]
pub struct HfTokenizer {
    inner: tokenizers::Tokenizer,
}

#[cfg(feature = "hf-tokenizer")]
impl HfTokenizer {
    /// Load a tokenizer from a `tokenizer.json` file.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let inner = tokenizers::Tokenizer::from_file(path)
            .map_err(|e| RagError::Tokenizer(format!("failed to load tokenizer: {e}")))?;
        Ok(Self { inner })
    }

    /// Load a tokenizer from the contents of a `tokenizer.json`.
    pub fn from_json(json: &str) -> Result<Self> {
        let inner = tokenizers::Tokenizer::from_bytes(json.as_bytes())
            .map_err(|e| RagError::Tokenizer(format!("failed to parse tokenizer: {e}")))?;
        Ok(Self { inner })
    }
}

#[cfg(feature = "hf-tokenizer")]
impl Tokenizer for HfTokenizer {
    fn encode(&self, text: &str) -> Vec<u32> {
        match self.inner.encode(text, false) {
            Ok(encoding) => encoding.get_ids().to_vec(),
            Err(e) => {
                tracing::warn!(error = %e, "tokenizer encode failed");
                Vec::new()
            }
        }
    }

    fn decode(&self, tokens: &[u32]) -> String {
        match self.inner.decode(tokens, true) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "tokenizer decode failed");
                String::new()
            }
        }
    }
}
