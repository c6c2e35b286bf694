//! Data types for documents, chunks, and search results.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A source document containing extracted text and metadata.
///
/// Documents are created at ingestion time from uploaded files and are
/// immutable once chunked. Only their chunks are persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier for the document.
    pub id: String,
    /// Human-readable title, usually derived from the filename.
    pub title: String,
    /// The extracted plain-text content of the document.
    pub text: String,
    /// Key-value metadata associated with the document
    /// (`source`, `section`, `type`, `upload_date`, `file_size`, ...).
    pub metadata: HashMap<String, String>,
}

/// Metadata attached to a [`Chunk`].
///
/// The fields every chunk carries are explicit; metadata inherited from
/// the parent document lives in the flattened `extra` map.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkMetadata {
    /// The ID of the parent [`Document`].
    pub parent_document_id: String,
    /// The title of the parent [`Document`].
    pub parent_document_title: String,
    /// Zero-based position of this chunk within its document.
    pub chunk_index: usize,
    /// Total number of chunks produced from the document in the same
    /// ingestion run.
    pub total_chunks: usize,
    /// Number of tokens in the chunk content under the ingestion tokenizer.
    pub token_count: usize,
    /// Metadata inherited from the parent document.
    #[serde(flatten)]
    pub extra: HashMap<String, String>,
}

impl ChunkMetadata {
    /// Look up a metadata value by key.
    ///
    /// Resolves the explicit fields by their names first, then falls back
    /// to the inherited `extra` map, so filter predicates work over both.
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "parent_document_id" => Some(self.parent_document_id.clone()),
            "parent_document_title" => Some(self.parent_document_title.clone()),
            "chunk_index" => Some(self.chunk_index.to_string()),
            "total_chunks" => Some(self.total_chunks.to_string()),
            "token_count" => Some(self.token_count.to_string()),
            _ => self.extra.get(key).cloned(),
        }
    }
}

/// A bounded-size segment of a [`Document`] with its vector embedding.
///
/// Chunks are the unit of storage, retrieval, and scoring. They are
/// created once per ingestion run and immutable thereafter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Deterministic identifier: `<document_id>_chunk_<index>`.
    pub id: String,
    /// The text content of the chunk.
    pub content: String,
    /// The vector embedding for this chunk's content. Empty until the
    /// pipeline attaches one.
    pub embedding: Vec<f32>,
    /// Chunk metadata, including fields inherited from the parent document.
    pub metadata: ChunkMetadata,
}

/// A retrieved chunk paired with its distance and similarity scores.
///
/// `similarity = 1 − distance` under the index's cosine distance metric
/// (range [0, 2]). A negative similarity means the underlying metric
/// returned a distance above 2 — a misconfiguration that is deliberately
/// passed through rather than clamped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    /// The ID of the matched chunk.
    pub chunk_id: String,
    /// The text content of the matched chunk.
    pub content: String,
    /// The matched chunk's metadata.
    pub metadata: ChunkMetadata,
    /// Distance under the index's native metric (lower is closer).
    pub distance: f32,
    /// `1 − distance`.
    pub similarity: f32,
    /// Recomputed similarity from the reranking pass, when one ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rerank_similarity: Option<f32>,
    /// The stored embedding, when the index returns it. Lets the
    /// reranking pass reuse the vector instead of re-embedding.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// An exact-match conjunction over chunk metadata keys.
///
/// A chunk matches when every key in the filter resolves to exactly the
/// filter's value. An empty filter matches everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MetadataFilter(HashMap<String, String>);

impl MetadataFilter {
    /// Create an empty filter (matches all chunks).
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a key-value equality condition.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Whether the filter has no conditions.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether the given metadata satisfies every condition.
    pub fn matches(&self, metadata: &ChunkMetadata) -> bool {
        self.0.iter().all(|(key, value)| metadata.get(key).as_deref() == Some(value.as_str()))
    }
}

impl From<HashMap<String, String>> for MetadataFilter {
    fn from(conditions: HashMap<String, String>) -> Self {
        Self(conditions)
    }
}

impl FromIterator<(String, String)> for MetadataFilter {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
