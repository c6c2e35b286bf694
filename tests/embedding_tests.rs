//! Embedding provider contract: batching semantics and normalization.

use proptest::prelude::*;
use ragpipe::embedding::{EmbeddingProvider, HashEmbedder};
use ragpipe::error::RagError;

#[tokio::test]
async fn empty_batch_yields_empty_output() {
    let embedder = HashEmbedder::new(64).unwrap();
    assert!(embedder.embed_batch(&[], 8).await.unwrap().is_empty());
}

#[tokio::test]
async fn batching_matches_single_embeds() {
    let embedder = HashEmbedder::new(64).unwrap();
    let texts = [
        "student visa requirements",
        "processing times",
        "health cover",
        "enrollment conditions",
        "work limits",
    ];

    // Batch size smaller than, equal to, and larger than the input.
    for batch_size in [2, 5, 16] {
        let batched = embedder.embed_batch(&texts, batch_size).await.unwrap();
        assert_eq!(batched.len(), texts.len());
        for (text, embedding) in texts.iter().zip(&batched) {
            assert_eq!(embedding, &embedder.embed(text).await.unwrap());
        }
    }

    // A zero batch size is clamped rather than rejected.
    let clamped = embedder.embed_batch(&texts, 0).await.unwrap();
    assert_eq!(clamped.len(), texts.len());
}

#[tokio::test]
async fn zero_dimensions_is_a_config_error() {
    assert!(matches!(HashEmbedder::new(0), Err(RagError::Config(_))));
}

proptest! {
    /// Embeddings have the requested dimension and are unit-length,
    /// except when the accumulated vector is zero (whitespace-only text,
    /// or opposite-signed tokens cancelling in a shared bucket).
    #[test]
    fn embeddings_are_normalized(text in "[a-z ]{0,80}", dimensions in 1usize..128) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let embedding = rt.block_on(async {
            HashEmbedder::new(dimensions).unwrap().embed(&text).await.unwrap()
        });

        prop_assert_eq!(embedding.len(), dimensions);
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if text.split_whitespace().next().is_none() {
            prop_assert_eq!(norm, 0.0);
        } else {
            prop_assert!(norm == 0.0 || (norm - 1.0).abs() < 1e-5);
        }
    }
}
