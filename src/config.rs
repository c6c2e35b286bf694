//! Configuration for the ingestion and retrieval pipeline.

use serde::{Deserialize, Serialize};

use crate::chunking::ChunkStrategy;
use crate::error::{RagError, Result};

/// Configuration parameters for the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Maximum chunk size in tokens.
    pub chunk_size: usize,
    /// Number of overlapping tokens between consecutive chunks
    /// (`tokens` strategy only).
    pub chunk_overlap: usize,
    /// Chunking strategy used at ingestion time.
    pub strategy: ChunkStrategy,
    /// Number of results returned from retrieval.
    pub top_k: usize,
    /// Number of candidates overfetched for the reranking pass.
    pub rerank_overfetch: usize,
    /// Number of texts embedded per batch during ingestion.
    pub embed_batch_size: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 512,
            chunk_overlap: 50,
            strategy: ChunkStrategy::Fast,
            top_k: 5,
            rerank_overfetch: 10,
            embed_batch_size: 64,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the maximum chunk size in tokens.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in tokens.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the ingestion chunking strategy.
    pub fn strategy(mut self, strategy: ChunkStrategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    /// Set the number of results returned from retrieval.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the number of candidates overfetched when reranking.
    pub fn rerank_overfetch(mut self, k: usize) -> Self {
        self.config.rerank_overfetch = k;
        self
    }

    /// Set the embedding batch size.
    pub fn embed_batch_size(mut self, size: usize) -> Self {
        self.config.embed_batch_size = size;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if:
    /// - `chunk_overlap >= chunk_size` (a non-positive window step would
    ///   prevent the sliding window from advancing)
    /// - `top_k == 0`
    /// - `embed_batch_size == 0`
    pub fn build(self) -> Result<RagConfig> {
        if self.config.chunk_overlap >= self.config.chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.config.chunk_overlap, self.config.chunk_size
            )));
        }
        if self.config.top_k == 0 {
            return Err(RagError::Config("top_k must be greater than zero".to_string()));
        }
        if self.config.embed_batch_size == 0 {
            return Err(RagError::Config("embed_batch_size must be greater than zero".to_string()));
        }
        Ok(self.config)
    }
}
