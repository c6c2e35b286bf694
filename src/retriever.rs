//! Two-stage retrieval: vector search plus an optional reranking pass.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::document::{MetadataFilter, QueryResult};
use crate::embedding::{cosine_similarity, EmbeddingProvider};
use crate::error::Result;
use crate::vectorstore::{IndexStats, VectorStore};

/// Retrieval methods reported by [`Retriever::stats`].
const SUPPORTED_METHODS: [&str; 4] =
    ["semantic_search", "embedding_search", "reranking", "filtered_search"];

/// Statistics about the retrieval system.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrieverStats {
    /// Statistics of the underlying vector index.
    pub index: IndexStats,
    /// Name of the embedding model used for queries and reranking.
    pub embedding_model: String,
    /// Dimensionality of the embedding model.
    pub embedding_dimension: usize,
    /// The retrieval methods this retriever supports.
    pub supported_methods: Vec<String>,
}

/// Turns a question into a ranked list of chunks.
///
/// First-stage ranking comes from the vector index. The optional second
/// stage overfetches candidates, recomputes similarity against a freshly
/// embedded query vector, and re-sorts — guaranteeing one consistent
/// similarity definition across the final ranking even when the index's
/// internal embedding path normalizes differently. Reranking is
/// best-effort: any failure falls back to the first-stage result.
pub struct Retriever {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl Retriever {
    /// Create a retriever over a vector store and an embedding provider.
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { store, embedder }
    }

    /// Retrieve the `top_k` most relevant chunks for a query.
    ///
    /// An empty result is not an error; it means nothing matched.
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<QueryResult>> {
        let results = self.store.search_by_text(query, top_k, filter).await?;
        debug!(result_count = results.len(), "retrieved chunks");
        Ok(results)
    }

    /// Retrieve using a precomputed query embedding.
    pub async fn retrieve_by_embedding(
        &self,
        query_embedding: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<QueryResult>> {
        let results = self.store.search_by_embedding(query_embedding, top_k, filter).await?;
        debug!(result_count = results.len(), "retrieved chunks by embedding");
        Ok(results)
    }

    /// Retrieve with a second reranking pass.
    ///
    /// Fetches `max(top_k, overfetch_k)` candidates, recomputes each
    /// candidate's similarity against a freshly embedded query vector
    /// (reusing the stored embedding when the index returned one),
    /// sorts by descending `rerank_similarity` — ties keep their
    /// first-stage rank — and truncates to `top_k`.
    ///
    /// Reranking is never fatal: on any failure the first-stage ranking
    /// is returned, truncated to `top_k`.
    pub async fn retrieve_with_rerank(
        &self,
        query: &str,
        top_k: usize,
        overfetch_k: usize,
    ) -> Result<Vec<QueryResult>> {
        let initial = self.retrieve(query, top_k.max(overfetch_k), None).await?;
        if initial.is_empty() {
            return Ok(initial);
        }

        match self.rerank(query, initial.clone()).await {
            Ok(mut reranked) => {
                reranked.truncate(top_k);
                debug!(result_count = reranked.len(), "reranked chunks");
                Ok(reranked)
            }
            Err(e) => {
                warn!(error = %e, "reranking failed, falling back to first-stage ranking");
                let mut fallback = initial;
                fallback.truncate(top_k);
                Ok(fallback)
            }
        }
    }

    async fn rerank(&self, query: &str, mut candidates: Vec<QueryResult>) -> Result<Vec<QueryResult>> {
        let query_embedding = self.embedder.embed(query).await?;

        for candidate in &mut candidates {
            let similarity = match &candidate.embedding {
                Some(stored) => cosine_similarity(&query_embedding, stored),
                None => {
                    let embedded = self.embedder.embed(&candidate.content).await?;
                    cosine_similarity(&query_embedding, &embedded)
                }
            };
            candidate.rerank_similarity = Some(similarity);
        }

        // Stable sort: candidates arrive in first-stage rank order, so
        // equal rerank scores keep that order.
        candidates.sort_by(|a, b| {
            b.rerank_similarity
                .partial_cmp(&a.rerank_similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(candidates)
    }

    /// Retrieve restricted to chunks whose metadata has `key == value`.
    pub async fn retrieve_by_metadata(
        &self,
        query: &str,
        key: &str,
        value: &str,
        top_k: usize,
    ) -> Result<Vec<QueryResult>> {
        let filter = MetadataFilter::new().with(key, value);
        self.retrieve(query, top_k, Some(&filter)).await
    }

    /// Statistics about the retrieval system.
    pub async fn stats(&self) -> Result<RetrieverStats> {
        Ok(RetrieverStats {
            index: self.store.stats().await?,
            embedding_model: self.embedder.model_name().to_string(),
            embedding_dimension: self.embedder.dimensions(),
            supported_methods: SUPPORTED_METHODS.iter().map(|m| m.to_string()).collect(),
        })
    }
}
