//! Local vector store with optional JSON snapshot persistence.
//!
//! [`LocalVectorStore`] keeps one collection in a `HashMap` behind a
//! `tokio::sync::RwLock` and scores searches with cosine distance. When
//! opened on a directory it loads a versioned JSON snapshot at startup
//! and rewrites it after every mutation.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::document::{Chunk, MetadataFilter, QueryResult};
use crate::embedding::{cosine_similarity, EmbeddingProvider};
use crate::error::{RagError, Result};
use crate::vectorstore::{IndexStats, VectorStore};

const BACKEND: &str = "local";
const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone)]
enum StoreLocation {
    Memory,
    Disk(PathBuf),
}

#[derive(Serialize)]
struct SnapshotOut<'a> {
    version: u32,
    model: &'a str,
    chunks: &'a HashMap<String, Chunk>,
}

#[derive(Deserialize)]
struct SnapshotIn {
    version: u32,
    model: String,
    chunks: HashMap<String, Chunk>,
}

/// A single-collection vector store using cosine distance.
///
/// The store binds an [`EmbeddingProvider`] so it can serve
/// [`search_by_text`](VectorStore::search_by_text) itself, and it
/// rejects writes whose embedding dimensionality differs from that
/// provider's.
pub struct LocalVectorStore {
    collection: String,
    location: StoreLocation,
    embedder: Arc<dyn EmbeddingProvider>,
    chunks: RwLock<HashMap<String, Chunk>>,
}

impl LocalVectorStore {
    /// Create an empty in-memory store (no persistence).
    pub fn in_memory(collection: impl Into<String>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            collection: collection.into(),
            location: StoreLocation::Memory,
            embedder,
            chunks: RwLock::new(HashMap::new()),
        }
    }

    /// Open a store persisted under `dir`, loading an existing snapshot
    /// if one is present.
    ///
    /// A snapshot that fails to parse is discarded with a warning and
    /// the collection starts empty; a snapshot written under a different
    /// embedding model is also discarded, since its vectors are not
    /// comparable to freshly embedded queries.
    pub async fn open(
        dir: impl Into<PathBuf>,
        collection: impl Into<String>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        let dir = dir.into();
        let collection = collection.into();

        tokio::fs::create_dir_all(&dir).await.map_err(|e| RagError::VectorStore {
            backend: BACKEND.into(),
            message: format!("failed to create {}: {e}", dir.display()),
        })?;

        let path = dir.join(format!("{collection}.json"));
        let mut chunks = HashMap::new();
        if path.exists() {
            let data = tokio::fs::read_to_string(&path).await.map_err(|e| {
                RagError::VectorStore {
                    backend: BACKEND.into(),
                    message: format!("failed to read snapshot: {e}"),
                }
            })?;
            match serde_json::from_str::<SnapshotIn>(&data) {
                Ok(snapshot) if snapshot.model == embedder.model_name() => {
                    info!(
                        collection = %collection,
                        chunk_count = snapshot.chunks.len(),
                        version = snapshot.version,
                        "loaded existing collection"
                    );
                    chunks = snapshot.chunks;
                }
                Ok(snapshot) => {
                    warn!(
                        collection = %collection,
                        snapshot_model = %snapshot.model,
                        current_model = embedder.model_name(),
                        "snapshot was written under a different embedding model, starting empty"
                    );
                }
                Err(e) => {
                    warn!(collection = %collection, error = %e, "snapshot unreadable, starting empty");
                }
            }
        } else {
            info!(collection = %collection, "created new collection");
        }

        Ok(Self {
            collection,
            location: StoreLocation::Disk(dir),
            embedder,
            chunks: RwLock::new(chunks),
        })
    }

    fn snapshot_path(&self) -> Option<PathBuf> {
        match &self.location {
            StoreLocation::Memory => None,
            StoreLocation::Disk(dir) => Some(dir.join(format!("{}.json", self.collection))),
        }
    }

    async fn persist(&self, chunks: &HashMap<String, Chunk>) -> Result<()> {
        let Some(path) = self.snapshot_path() else {
            return Ok(());
        };
        let snapshot =
            SnapshotOut { version: SNAPSHOT_VERSION, model: self.embedder.model_name(), chunks };
        let data = serde_json::to_string(&snapshot).map_err(|e| RagError::VectorStore {
            backend: BACKEND.into(),
            message: format!("failed to serialize snapshot: {e}"),
        })?;
        tokio::fs::write(&path, data).await.map_err(|e| RagError::VectorStore {
            backend: BACKEND.into(),
            message: format!("failed to write snapshot: {e}"),
        })?;
        debug!(collection = %self.collection, chunk_count = chunks.len(), "persisted snapshot");
        Ok(())
    }
}

#[async_trait]
impl VectorStore for LocalVectorStore {
    async fn add(&self, chunks: &[Chunk]) -> Result<()> {
        if chunks.is_empty() {
            return Err(RagError::IndexWrite {
                backend: BACKEND.into(),
                message: "no chunks to add".into(),
            });
        }

        let expected = self.embedder.dimensions();
        for chunk in chunks {
            if chunk.embedding.len() != expected {
                return Err(RagError::IndexWrite {
                    backend: BACKEND.into(),
                    message: format!(
                        "chunk '{}' has embedding dimension {} but the collection expects {expected}",
                        chunk.id,
                        chunk.embedding.len()
                    ),
                });
            }
        }

        let mut store = self.chunks.write().await;
        for chunk in chunks {
            store.insert(chunk.id.clone(), chunk.clone());
        }
        self.persist(&store).await?;
        info!(collection = %self.collection, added = chunks.len(), total = store.len(), "added chunks");
        Ok(())
    }

    async fn search_by_embedding(
        &self,
        query: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<QueryResult>> {
        let store = self.chunks.read().await;

        let mut results: Vec<QueryResult> = store
            .values()
            .filter(|chunk| filter.map_or(true, |f| f.matches(&chunk.metadata)))
            .map(|chunk| {
                let distance = 1.0 - cosine_similarity(&chunk.embedding, query);
                QueryResult {
                    chunk_id: chunk.id.clone(),
                    content: chunk.content.clone(),
                    metadata: chunk.metadata.clone(),
                    distance,
                    similarity: 1.0 - distance,
                    rerank_similarity: None,
                    embedding: Some(chunk.embedding.clone()),
                }
            })
            .collect();

        // Chunk-id tie-break keeps equal-distance orderings deterministic.
        results.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });
        results.truncate(top_k);

        debug!(collection = %self.collection, result_count = results.len(), "search completed");
        Ok(results)
    }

    async fn search_by_text(
        &self,
        query: &str,
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<QueryResult>> {
        let query_embedding = self.embedder.embed(query).await?;
        self.search_by_embedding(&query_embedding, top_k, filter).await
    }

    async fn get(&self, id: &str) -> Result<Option<Chunk>> {
        let store = self.chunks.read().await;
        Ok(store.get(id).cloned())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut store = self.chunks.write().await;
        if store.remove(id).is_some() {
            self.persist(&store).await?;
            info!(collection = %self.collection, chunk_id = id, "deleted chunk");
        } else {
            debug!(collection = %self.collection, chunk_id = id, "delete of absent chunk");
        }
        Ok(())
    }

    async fn delete_collection(&self) -> Result<()> {
        let mut store = self.chunks.write().await;
        store.clear();
        if let Some(path) = self.snapshot_path() {
            if path.exists() {
                tokio::fs::remove_file(&path).await.map_err(|e| RagError::VectorStore {
                    backend: BACKEND.into(),
                    message: format!("failed to remove snapshot: {e}"),
                })?;
            }
        }
        info!(collection = %self.collection, "deleted collection");
        Ok(())
    }

    async fn reset(&self) -> Result<()> {
        let mut store = self.chunks.write().await;
        store.clear();
        self.persist(&store).await?;
        info!(collection = %self.collection, "reset collection");
        Ok(())
    }

    async fn stats(&self) -> Result<IndexStats> {
        let store = self.chunks.read().await;
        Ok(IndexStats {
            total_chunks: store.len(),
            collection_name: self.collection.clone(),
            location: match &self.location {
                StoreLocation::Memory => ":memory:".to_string(),
                StoreLocation::Disk(dir) => dir.display().to_string(),
            },
        })
    }
}
