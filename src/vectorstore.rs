//! Vector store trait for persisting and searching embedded chunks.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::document::{Chunk, MetadataFilter, QueryResult};
use crate::error::Result;

/// Statistics about a vector store collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexStats {
    /// Number of chunks currently stored.
    pub total_chunks: usize,
    /// The collection's name.
    pub collection_name: String,
    /// Where the collection lives (a directory path, or `:memory:`).
    pub location: String,
}

/// A store mapping chunk id → (content, embedding, metadata) with
/// nearest-neighbor search.
///
/// Each store instance manages one logical collection. Implementations
/// must tolerate concurrent reads during writes (single-writer-
/// multiple-reader is the minimum contract). Every returned
/// [`QueryResult`] satisfies `similarity = 1 − distance`; a distance
/// above 2 (non-cosine metric misconfiguration) yields a negative
/// similarity that is passed through, never clamped.
///
/// # Example
///
/// ```rust,ignore
/// use ragpipe::localstore::LocalVectorStore;
/// use ragpipe::vectorstore::VectorStore;
///
/// let store = LocalVectorStore::in_memory("docs", embedder);
/// store.add(&chunks).await?;
/// let results = store.search_by_text("eligibility criteria", 5, None).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Bulk-insert chunks.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::RagError::IndexWrite`] for an empty input
    /// or when the insert is rejected (for example on an embedding
    /// dimension mismatch).
    async fn add(&self, chunks: &[Chunk]) -> Result<()>;

    /// Nearest-neighbor search with a precomputed query embedding.
    ///
    /// Results are ordered by increasing distance (decreasing
    /// similarity) and restricted to chunks matching `filter` when one
    /// is given.
    async fn search_by_embedding(
        &self,
        query: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<QueryResult>>;

    /// Nearest-neighbor search from query text.
    ///
    /// The store embeds the query with its own bound embedding provider;
    /// semantically equivalent to
    /// [`search_by_embedding`](VectorStore::search_by_embedding) after
    /// embedding.
    async fn search_by_text(
        &self,
        query: &str,
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<QueryResult>>;

    /// Fetch a chunk by id, or `None` if absent.
    async fn get(&self, id: &str) -> Result<Option<Chunk>>;

    /// Delete a chunk by id. Deleting an absent id is not an error.
    async fn delete(&self, id: &str) -> Result<()>;

    /// Delete the entire collection and its persisted state.
    async fn delete_collection(&self) -> Result<()>;

    /// Reset the collection: delete, then recreate empty.
    async fn reset(&self) -> Result<()>;

    /// Collection statistics.
    async fn stats(&self) -> Result<IndexStats>;
}
