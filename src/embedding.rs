//! Embedding provider trait and vector similarity helpers.

use async_trait::async_trait;
use tracing::debug;

use crate::error::{RagError, Result};

/// A provider that generates L2-normalized vector embeddings from text.
///
/// Embedding is a pure function of text and model version. All vectors
/// written to a given vector index must come from a provider with the
/// same dimensionality; mixing dimensions is an invariant violation the
/// store rejects at write time.
///
/// # Example
///
/// ```rust,ignore
/// use ragpipe::embedding::{EmbeddingProvider, HashEmbedder};
///
/// let provider = HashEmbedder::new(384)?;
/// let embedding = provider.embed("hello world").await?;
/// assert_eq!(embedding.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ModelNotReady`] if the backing model has not
    /// finished loading, or [`RagError::Embedding`] on other failures.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs,
    /// `batch_size` texts at a time.
    ///
    /// Batching bounds peak memory; it does not introduce concurrency.
    /// Returns an empty sequence for an empty input. The default
    /// implementation calls [`embed`](EmbeddingProvider::embed) for each
    /// text; backends with native batch endpoints should override it.
    async fn embed_batch(&self, texts: &[&str], batch_size: usize) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let batch_size = batch_size.max(1);
        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(batch_size) {
            debug!(batch_len = batch.len(), "embedding batch");
            for text in batch {
                embeddings.push(self.embed(text).await?);
            }
        }
        Ok(embeddings)
    }

    /// The dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;

    /// The name of the underlying model.
    fn model_name(&self) -> &str;
}

/// Compute cosine similarity between two vectors, in [-1, 1].
///
/// Returns `0.0` if either vector has zero norm — a degenerate guard,
/// not a mathematically exact cosine value.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Rank candidate vectors by cosine similarity to a query vector.
///
/// Full pairwise comparison, stable descending sort (equal scores keep
/// insertion order), truncated to `k`. Returns `(candidate_index, score)`
/// pairs.
pub fn top_k_by_similarity(
    query: &[f32],
    candidates: &[Vec<f32>],
    k: usize,
) -> Vec<(usize, f32)> {
    let mut scored: Vec<(usize, f32)> = candidates
        .iter()
        .enumerate()
        .map(|(index, candidate)| (index, cosine_similarity(query, candidate)))
        .collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(k);
    scored
}

/// Deterministic feature-hashing embedder.
///
/// Each whitespace token is lowercased, hashed with FNV-1a, and
/// accumulated into a signed bucket of the output vector, which is then
/// L2-normalized. The result is a fixed-dimension bag-of-words embedding
/// that is a pure function of the text — no model residency, always
/// ready. Useful for development, tests, and air-gapped deployments;
/// production setups typically swap in a remote provider.
pub struct HashEmbedder {
    dimensions: usize,
    model: String,
}

impl HashEmbedder {
    /// Create an embedder producing vectors of the given dimension.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if `dimensions` is zero.
    pub fn new(dimensions: usize) -> Result<Self> {
        if dimensions == 0 {
            return Err(RagError::Config("embedding dimensions must be greater than zero".to_string()));
        }
        Ok(Self { dimensions, model: format!("feature-hash-{dimensions}") })
    }

    fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in text.split_whitespace() {
            let hash = fnv1a(token.to_lowercase().as_bytes());
            let bucket = (hash % self.dimensions as u64) as usize;
            let sign = if hash & (1 << 63) == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

/// FNV-1a, 64-bit. Stable across platforms and releases, unlike
/// `DefaultHasher`.
fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for &byte in bytes {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
