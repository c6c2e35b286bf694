//! # ragpipe
//!
//! Document ingestion and retrieval pipeline for retrieval-augmented
//! generation.
//!
//! ## Overview
//!
//! `ragpipe` answers natural-language questions against a private
//! document corpus by retrieving semantically relevant passages and
//! handing them to a generation collaborator. The crate covers the
//! algorithmic core:
//!
//! - [`TextChunker`] — deterministic chunk segmentation with overlap and
//!   multi-strategy (paragraph → sentence → token) fallback
//! - [`EmbeddingProvider`] — fixed-dimension, L2-normalized embeddings
//! - [`VectorStore`] / [`LocalVectorStore`] — chunk persistence and
//!   nearest-neighbor search with metadata filtering
//! - [`Retriever`] — two-stage retrieval with best-effort reranking
//! - [`RagPipeline`] — ingest and query orchestration with structured
//!   outcomes and typed streaming events
//!
//! The HTTP surface, file parsing, and concrete LLM clients are external
//! collaborators; the crate defines only the contracts they plug into.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ragpipe::{HashEmbedder, LocalVectorStore, RagConfig, RagPipeline};
//!
//! let embedder = Arc::new(HashEmbedder::new(384)?);
//! let store = Arc::new(LocalVectorStore::open("./data", "docs", embedder.clone()).await?);
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(embedder)
//!     .vector_store(store)
//!     .generator(Arc::new(my_generator))
//!     .build()?;
//!
//! pipeline.ingest("doc_1", "Handbook", &text, metadata, "handbook.txt").await;
//! let outcome = pipeline.query("What is the processing time?", None, true).await;
//! ```
//!
//! ## Features
//!
//! - `openai` — OpenAI-compatible HTTP embedding provider (`reqwest`)
//! - `hf-tokenizer` — chunking under a HuggingFace `tokenizer.json`
//!   model (`tokenizers`)

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod localstore;
#[cfg(feature = "openai")]
pub mod openai;
pub mod pipeline;
pub mod retriever;
pub mod tokenizer;
pub mod vectorstore;

pub use chunking::{ChunkStrategy, TextChunker};
pub use config::{RagConfig, RagConfigBuilder};
pub use document::{Chunk, ChunkMetadata, Document, MetadataFilter, QueryResult};
pub use embedding::{cosine_similarity, top_k_by_similarity, EmbeddingProvider, HashEmbedder};
pub use error::{RagError, Result};
pub use generation::{Completion, ContextEntry, Generator, Usage};
pub use localstore::LocalVectorStore;
#[cfg(feature = "openai")]
pub use openai::RemoteEmbeddingProvider;
pub use pipeline::{
    IngestOutcome, QueryEvent, QueryMetadata, QueryOutcome, RagPipeline, RagPipelineBuilder,
    SourceRef, SystemStats,
};
pub use retriever::{Retriever, RetrieverStats};
pub use tokenizer::{Tokenizer, WordTokenizer};
pub use vectorstore::{IndexStats, VectorStore};

#[cfg(feature = "hf-tokenizer")]
pub use tokenizer::HfTokenizer;
