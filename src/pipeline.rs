//! Pipeline orchestrator.
//!
//! [`RagPipeline`] sequences the two workflows of the system:
//!
//! - **Ingest**: raw text → chunks → embeddings → index. A failure at
//!   any stage aborts the document with no partial index writes.
//! - **Query**: question → retrieval → \[rerank\] → generation. Zero
//!   retrieved chunks short-circuits to an error result without
//!   invoking generation.
//!
//! Both entry points return structured outcomes with an explicit status;
//! no error escapes the orchestrator as a fault. The streaming variant
//! produces typed [`QueryEvent`]s over a channel: zero or more content
//! increments, then exactly one terminal sources or error event.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ragpipe::pipeline::RagPipeline;
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(embedder.clone())
//!     .vector_store(Arc::new(LocalVectorStore::in_memory("docs", embedder)))
//!     .generator(Arc::new(my_generator))
//!     .build()?;
//!
//! let outcome = pipeline.ingest("doc_1", "Title", text, metadata, "upload.txt").await;
//! let answer = pipeline.query("What are the eligibility criteria?", None, true).await;
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::chunking::TextChunker;
use crate::config::RagConfig;
use crate::document::{Document, QueryResult};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generation::{ContextEntry, Generator, Usage};
use crate::retriever::{Retriever, RetrieverStats};
use crate::tokenizer::{Tokenizer, WordTokenizer};
use crate::vectorstore::{IndexStats, VectorStore};

/// Maximum length of a source's content preview, in characters.
const PREVIEW_CHARS: usize = 200;

/// The error message reported when retrieval yields no chunks.
const NO_RESULTS: &str = "No relevant documents found";

/// Result of an ingestion run, tagged by status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum IngestOutcome {
    /// The document was chunked, embedded, and indexed.
    Success {
        /// The ingested document's id.
        document_id: String,
        /// The ingested document's title.
        title: String,
        /// Number of chunks written to the index.
        chunks_created: usize,
        /// The uploaded file's name.
        filename: String,
        /// The document metadata as stored (including the upload stamp).
        metadata: HashMap<String, String>,
    },
    /// A stage failed; nothing was written for this document.
    Error {
        /// Description of the failure.
        error: String,
        /// The uploaded file's name.
        filename: String,
    },
}

/// A citation-relevant reduction of a retrieved chunk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceRef {
    /// The chunk id.
    pub id: String,
    /// Title of the parent document.
    pub title: String,
    /// Source attribution.
    pub source: String,
    /// Section within the source.
    pub section: String,
    /// First-stage similarity score.
    pub similarity: f32,
    /// Truncated content preview (omitted in streaming sources).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_preview: Option<String>,
}

/// Query-level metadata attached to a successful answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryMetadata {
    /// `semantic_search` or `reranking`.
    pub retrieval_method: String,
    /// Number of chunks handed to generation.
    pub documents_retrieved: usize,
    /// The generation model.
    pub model: String,
    /// Token usage reported by the generation backend.
    pub usage: Usage,
}

/// Result of a query, tagged by status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum QueryOutcome {
    /// An answer was generated from retrieved context.
    Success {
        /// The original question.
        question: String,
        /// The generated answer.
        answer: String,
        /// Ranked citation references.
        sources: Vec<SourceRef>,
        /// Retrieval and generation metadata.
        metadata: QueryMetadata,
    },
    /// Retrieval or generation failed.
    Error {
        /// Description of the failure.
        error: String,
        /// The original question.
        question: String,
    },
}

/// One event in a streaming query's ordered production.
///
/// A stream consists of zero or more `Content` events followed by
/// exactly one terminal event: `Sources` on success, `Error` otherwise.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum QueryEvent {
    /// An incremental piece of the generated answer.
    Content(String),
    /// Terminal event: the ranked sources for the completed answer.
    Sources(Vec<SourceRef>),
    /// Terminal event: the query failed.
    Error(String),
}

/// Comprehensive system statistics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SystemStats {
    /// Vector index statistics.
    pub index: IndexStats,
    /// Retrieval statistics.
    pub retrieval: RetrieverStats,
    /// The active pipeline configuration.
    pub config: RagConfig,
}

/// The pipeline orchestrator.
///
/// Owns every component as an explicitly constructed, injectable
/// instance — there are no ambient globals. Construct one via
/// [`RagPipeline::builder()`].
pub struct RagPipeline {
    config: RagConfig,
    chunker: TextChunker,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    retriever: Retriever,
    generator: Arc<dyn Generator>,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// The pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// The retriever, for callers that want raw ranked chunks.
    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Ingest one document: chunk → embed → index.
    ///
    /// Always returns a structured [`IngestOutcome`]; a failure at any
    /// stage aborts the document with no partial index writes and is
    /// reported as [`IngestOutcome::Error`].
    pub async fn ingest(
        &self,
        document_id: &str,
        title: &str,
        raw_text: &str,
        metadata: HashMap<String, String>,
        filename: &str,
    ) -> IngestOutcome {
        match self.ingest_inner(document_id, title, raw_text, metadata, filename).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(filename, error = %e, "ingestion failed");
                IngestOutcome::Error { error: e.to_string(), filename: filename.to_string() }
            }
        }
    }

    async fn ingest_inner(
        &self,
        document_id: &str,
        title: &str,
        raw_text: &str,
        mut metadata: HashMap<String, String>,
        filename: &str,
    ) -> Result<IngestOutcome> {
        metadata.entry("upload_date".to_string()).or_insert_with(|| Utc::now().to_rfc3339());

        let document = Document {
            id: document_id.to_string(),
            title: title.to_string(),
            text: raw_text.to_string(),
            metadata,
        };

        let mut chunks = self.chunker.chunk_document(&document, self.config.strategy);
        if chunks.is_empty() {
            return Err(RagError::Pipeline(format!(
                "document '{document_id}' produced no chunks"
            )));
        }

        let texts: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        let embeddings =
            self.embedder.embed_batch(&texts, self.config.embed_batch_size).await.map_err(|e| {
                error!(document.id = %document.id, error = %e, "embedding failed during ingestion");
                e
            })?;

        for (chunk, embedding) in chunks.iter_mut().zip(embeddings) {
            chunk.embedding = embedding;
        }

        // One bulk write per document: either all chunks land or none do.
        self.store.add(&chunks).await?;

        info!(document.id = %document.id, chunk_count = chunks.len(), "ingested document");

        Ok(IngestOutcome::Success {
            document_id: document.id,
            title: document.title,
            chunks_created: chunks.len(),
            filename: filename.to_string(),
            metadata: document.metadata,
        })
    }

    /// Answer a question from the indexed corpus.
    ///
    /// `top_k` defaults to the configured value. With `use_reranking`
    /// the retrieval stage overfetches and re-scores candidates before
    /// truncation. Always returns a structured [`QueryOutcome`].
    pub async fn query(
        &self,
        question: &str,
        top_k: Option<usize>,
        use_reranking: bool,
    ) -> QueryOutcome {
        let top_k = top_k.unwrap_or(self.config.top_k);

        let retrieved = if use_reranking {
            self.retriever
                .retrieve_with_rerank(question, top_k, self.config.rerank_overfetch.max(top_k))
                .await
        } else {
            self.retriever.retrieve(question, top_k, None).await
        };

        let retrieved = match retrieved {
            Ok(results) => results,
            Err(e) => {
                error!(error = %e, "retrieval failed");
                return QueryOutcome::Error { error: e.to_string(), question: question.to_string() };
            }
        };

        if retrieved.is_empty() {
            return QueryOutcome::Error {
                error: NO_RESULTS.to_string(),
                question: question.to_string(),
            };
        }

        let context: Vec<ContextEntry> = retrieved.iter().map(ContextEntry::from_result).collect();

        match self.generator.generate(question, &context).await {
            Ok(completion) => {
                info!(
                    result_count = retrieved.len(),
                    reranked = use_reranking,
                    "query completed"
                );
                QueryOutcome::Success {
                    question: question.to_string(),
                    answer: completion.text,
                    sources: retrieved.iter().map(|r| source_ref(r, true)).collect(),
                    metadata: QueryMetadata {
                        retrieval_method: if use_reranking {
                            "reranking".to_string()
                        } else {
                            "semantic_search".to_string()
                        },
                        documents_retrieved: retrieved.len(),
                        model: completion.model,
                        usage: completion.usage,
                    },
                }
            }
            Err(e) => {
                error!(error = %e, "generation failed");
                QueryOutcome::Error { error: e.to_string(), question: question.to_string() }
            }
        }
    }

    /// Answer a question, surfacing generation output incrementally.
    ///
    /// Sends [`QueryEvent`]s on `events`: zero or more
    /// [`QueryEvent::Content`] increments, then exactly one terminal
    /// [`QueryEvent::Sources`] or [`QueryEvent::Error`]. A dropped
    /// receiver does not interrupt the underlying retrieval or
    /// generation.
    pub async fn query_streaming(
        &self,
        question: &str,
        top_k: Option<usize>,
        events: mpsc::Sender<QueryEvent>,
    ) {
        let top_k = top_k.unwrap_or(self.config.top_k);

        let retrieved = match self.retriever.retrieve(question, top_k, None).await {
            Ok(results) => results,
            Err(e) => {
                error!(error = %e, "retrieval failed in streaming query");
                let _ = events.send(QueryEvent::Error(e.to_string())).await;
                return;
            }
        };

        if retrieved.is_empty() {
            let _ = events.send(QueryEvent::Error(NO_RESULTS.to_string())).await;
            return;
        }

        let context: Vec<ContextEntry> = retrieved.iter().map(ContextEntry::from_result).collect();

        let (tx, mut rx) = mpsc::channel::<String>(16);
        let generation = self.generator.generate_streaming(question, &context, tx);
        let forward = async {
            let mut receiver_gone = false;
            while let Some(delta) = rx.recv().await {
                // Keep draining after the receiver drops so generation
                // can run to completion without backpressure stalls.
                if !receiver_gone && events.send(QueryEvent::Content(delta)).await.is_err() {
                    receiver_gone = true;
                }
            }
        };
        let (generated, ()) = tokio::join!(generation, forward);

        match generated {
            Ok(()) => {
                let sources = retrieved.iter().map(|r| source_ref(r, false)).collect();
                let _ = events.send(QueryEvent::Sources(sources)).await;
            }
            Err(e) => {
                error!(error = %e, "generation failed in streaming query");
                let _ = events.send(QueryEvent::Error(e.to_string())).await;
            }
        }
    }

    /// Comprehensive statistics across the index, retriever, and config.
    pub async fn stats(&self) -> Result<SystemStats> {
        Ok(SystemStats {
            index: self.store.stats().await?,
            retrieval: self.retriever.stats().await?,
            config: self.config.clone(),
        })
    }
}

/// Reduce a retrieval result to its citation fields.
fn source_ref(result: &QueryResult, with_preview: bool) -> SourceRef {
    SourceRef {
        id: result.chunk_id.clone(),
        title: result.metadata.parent_document_title.clone(),
        source: result.metadata.get("source").unwrap_or_else(|| "Unknown".to_string()),
        section: result.metadata.get("section").unwrap_or_else(|| "Unknown".to_string()),
        similarity: result.similarity,
        content_preview: with_preview.then(|| preview(&result.content)),
    }
}

/// Truncate content to a preview on a char boundary.
fn preview(content: &str) -> String {
    match content.char_indices().nth(PREVIEW_CHARS) {
        Some((idx, _)) => format!("{}...", &content[..idx]),
        None => content.to_string(),
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// The embedding provider, vector store, and generator are required;
/// config defaults to [`RagConfig::default()`] and the tokenizer to a
/// [`WordTokenizer`].
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    tokenizer: Option<Arc<dyn Tokenizer>>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    store: Option<Arc<dyn VectorStore>>,
    generator: Option<Arc<dyn Generator>>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the tokenizer used for chunking.
    pub fn tokenizer(mut self, tokenizer: Arc<dyn Tokenizer>) -> Self {
        self.tokenizer = Some(tokenizer);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Set the vector store backend.
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the generation collaborator.
    pub fn generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Build the [`RagPipeline`], validating that required components
    /// are present and the configuration is consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if a required component is missing
    /// or the chunking parameters are invalid.
    pub fn build(self) -> Result<RagPipeline> {
        let config = self.config.unwrap_or_default();
        let tokenizer =
            self.tokenizer.unwrap_or_else(|| Arc::new(WordTokenizer::new()) as Arc<dyn Tokenizer>);
        let embedder = self
            .embedder
            .ok_or_else(|| RagError::Config("embedding_provider is required".to_string()))?;
        let store =
            self.store.ok_or_else(|| RagError::Config("vector_store is required".to_string()))?;
        let generator =
            self.generator.ok_or_else(|| RagError::Config("generator is required".to_string()))?;

        let chunker = TextChunker::new(tokenizer, config.chunk_size, config.chunk_overlap)?;
        let retriever = Retriever::new(Arc::clone(&store), Arc::clone(&embedder));

        Ok(RagPipeline { config, chunker, embedder, store, retriever, generator })
    }
}
