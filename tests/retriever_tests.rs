//! Retriever behavior: two-stage reranking, best-effort fallback, and
//! metadata-filtered retrieval.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use ragpipe::document::{Chunk, ChunkMetadata};
use ragpipe::embedding::{EmbeddingProvider, HashEmbedder};
use ragpipe::error::{RagError, Result};
use ragpipe::localstore::LocalVectorStore;
use ragpipe::retriever::Retriever;
use ragpipe::vectorstore::VectorStore;

const DIM: usize = 32;

/// An embedding provider whose every call fails, for exercising the
/// rerank fallback path.
struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(RagError::Embedding {
            provider: "failing".to_string(),
            message: "always down".to_string(),
        })
    }

    fn dimensions(&self) -> usize {
        DIM
    }

    fn model_name(&self) -> &str {
        "failing"
    }
}

fn chunk(id: &str, content: &str, source: &str) -> Chunk {
    Chunk {
        id: id.to_string(),
        content: content.to_string(),
        embedding: Vec::new(),
        metadata: ChunkMetadata {
            parent_document_id: "doc_1".to_string(),
            parent_document_title: "Handbook".to_string(),
            chunk_index: 0,
            total_chunks: 1,
            token_count: 4,
            extra: HashMap::from([("source".to_string(), source.to_string())]),
        },
    }
}

async fn seeded_store(embedder: Arc<HashEmbedder>) -> Arc<LocalVectorStore> {
    let store = Arc::new(LocalVectorStore::in_memory("docs", embedder.clone()));
    let entries = [
        ("c0", "student visa application requirements", "visas"),
        ("c1", "student visa processing times", "visas"),
        ("c2", "bridging visa work conditions", "visas"),
        ("c3", "citizenship test preparation guide", "citizenship"),
        ("c4", "permanent residency points calculator", "residency"),
    ];
    let mut chunks = Vec::new();
    for (id, content, source) in entries {
        let mut c = chunk(id, content, source);
        c.embedding = embedder.embed(content).await.unwrap();
        chunks.push(c);
    }
    store.add(&chunks).await.unwrap();
    store
}

#[tokio::test]
async fn empty_index_retrieves_nothing() {
    let embedder = Arc::new(HashEmbedder::new(DIM).unwrap());
    let store = Arc::new(LocalVectorStore::in_memory("docs", embedder.clone()));
    let retriever = Retriever::new(store, embedder);

    assert!(retriever.retrieve("anything", 5, None).await.unwrap().is_empty());
    assert!(retriever.retrieve_with_rerank("anything", 5, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn retrieve_respects_top_k() {
    let embedder = Arc::new(HashEmbedder::new(DIM).unwrap());
    let store = seeded_store(embedder.clone()).await;
    let retriever = Retriever::new(store, embedder);

    let results = retriever.retrieve("student visa", 2, None).await.unwrap();
    assert_eq!(results.len(), 2);
    for result in &results {
        assert!(result.rerank_similarity.is_none());
    }
}

#[tokio::test]
async fn rerank_scores_and_orders_within_overfetch_set() {
    let embedder = Arc::new(HashEmbedder::new(DIM).unwrap());
    let store = seeded_store(embedder.clone()).await;
    let retriever = Retriever::new(store, embedder);

    let overfetched = retriever.retrieve("student visa requirements", 5, None).await.unwrap();
    let reranked = retriever.retrieve_with_rerank("student visa requirements", 2, 5).await.unwrap();

    assert_eq!(reranked.len(), 2);
    let candidate_ids: Vec<_> = overfetched.iter().map(|r| r.chunk_id.clone()).collect();
    for pair in reranked.windows(2) {
        assert!(pair[0].rerank_similarity.unwrap() >= pair[1].rerank_similarity.unwrap());
    }
    for result in &reranked {
        assert!(result.rerank_similarity.is_some());
        assert!(candidate_ids.contains(&result.chunk_id));
    }
    // Both stages score with the same embedder here, so reranking must
    // reproduce the first-stage order.
    assert_eq!(reranked[0].chunk_id, overfetched[0].chunk_id);
    assert_eq!(reranked[1].chunk_id, overfetched[1].chunk_id);
}

#[tokio::test]
async fn rerank_failure_falls_back_to_first_stage_ranking() {
    let embedder = Arc::new(HashEmbedder::new(DIM).unwrap());
    let store = seeded_store(embedder.clone()).await;
    // Store searches embed with the working provider; reranking uses the
    // broken one.
    let retriever = Retriever::new(store.clone(), Arc::new(FailingEmbedder));

    let first_stage = store.search_by_text("student visa", 2, None).await.unwrap();
    let results = retriever.retrieve_with_rerank("student visa", 2, 5).await.unwrap();

    assert_eq!(results.len(), 2);
    for (got, expected) in results.iter().zip(&first_stage) {
        assert_eq!(got.chunk_id, expected.chunk_id);
        assert!(got.rerank_similarity.is_none());
    }
}

#[tokio::test]
async fn metadata_retrieval_only_returns_matching_chunks() {
    let embedder = Arc::new(HashEmbedder::new(DIM).unwrap());
    let store = seeded_store(embedder.clone()).await;
    let retriever = Retriever::new(store, embedder);

    let results = retriever.retrieve_by_metadata("visa", "source", "visas", 10).await.unwrap();
    assert_eq!(results.len(), 3);
    for result in &results {
        assert_eq!(result.metadata.get("source").as_deref(), Some("visas"));
    }

    let none = retriever.retrieve_by_metadata("visa", "source", "none", 10).await.unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn stats_reports_model_and_methods() {
    let embedder = Arc::new(HashEmbedder::new(DIM).unwrap());
    let store = seeded_store(embedder.clone()).await;
    let retriever = Retriever::new(store, embedder);

    let stats = retriever.stats().await.unwrap();
    assert_eq!(stats.index.total_chunks, 5);
    assert_eq!(stats.embedding_model, format!("feature-hash-{DIM}"));
    assert_eq!(stats.embedding_dimension, DIM);
    for method in ["semantic_search", "embedding_search", "reranking", "filtered_search"] {
        assert!(stats.supported_methods.iter().any(|m| m == method));
    }
}
