//! End-to-end orchestrator behavior: ingest outcomes, query outcomes,
//! and streaming event ordering.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use ragpipe::config::RagConfig;
use ragpipe::document::{Chunk, MetadataFilter, QueryResult};
use ragpipe::embedding::HashEmbedder;
use ragpipe::error::{RagError, Result};
use ragpipe::generation::{Completion, ContextEntry, Generator, Usage};
use ragpipe::localstore::LocalVectorStore;
use ragpipe::pipeline::{IngestOutcome, QueryEvent, QueryOutcome, RagPipeline};
use ragpipe::vectorstore::{IndexStats, VectorStore};
use tokio::sync::mpsc;

const DIM: usize = 32;

/// Scripted generator that counts invocations and replays fixed output.
struct StubGenerator {
    answer: String,
    deltas: Vec<String>,
    fail: bool,
    calls: AtomicUsize,
}

impl StubGenerator {
    fn new(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            deltas: Vec::new(),
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    fn with_deltas(answer: &str, deltas: &[&str]) -> Self {
        Self { deltas: deltas.iter().map(|d| d.to_string()).collect(), ..Self::new(answer) }
    }

    fn failing() -> Self {
        Self { fail: true, ..Self::new("") }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Generator for StubGenerator {
    async fn generate(&self, _question: &str, context: &[ContextEntry]) -> Result<Completion> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(RagError::Generation {
                model: "stub-model".to_string(),
                message: "backend unavailable".to_string(),
            });
        }
        assert!(!context.is_empty(), "generator called without context");
        Ok(Completion {
            text: self.answer.clone(),
            model: "stub-model".to_string(),
            usage: Usage { prompt_tokens: Some(10), completion_tokens: Some(5), total_tokens: Some(15) },
        })
    }

    async fn generate_streaming(
        &self,
        _question: &str,
        _context: &[ContextEntry],
        tx: mpsc::Sender<String>,
    ) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(RagError::Generation {
                model: "stub-model".to_string(),
                message: "backend unavailable".to_string(),
            });
        }
        for delta in &self.deltas {
            let _ = tx.send(delta.clone()).await;
        }
        Ok(())
    }

    fn model_name(&self) -> &str {
        "stub-model"
    }
}

/// A store whose writes always fail.
struct RejectingStore;

#[async_trait]
impl VectorStore for RejectingStore {
    async fn add(&self, _chunks: &[Chunk]) -> Result<()> {
        Err(RagError::IndexWrite {
            backend: "rejecting".to_string(),
            message: "disk full".to_string(),
        })
    }

    async fn search_by_embedding(
        &self,
        _query: &[f32],
        _top_k: usize,
        _filter: Option<&MetadataFilter>,
    ) -> Result<Vec<QueryResult>> {
        Ok(Vec::new())
    }

    async fn search_by_text(
        &self,
        _query: &str,
        _top_k: usize,
        _filter: Option<&MetadataFilter>,
    ) -> Result<Vec<QueryResult>> {
        Ok(Vec::new())
    }

    async fn get(&self, _id: &str) -> Result<Option<Chunk>> {
        Ok(None)
    }

    async fn delete(&self, _id: &str) -> Result<()> {
        Ok(())
    }

    async fn delete_collection(&self) -> Result<()> {
        Ok(())
    }

    async fn reset(&self) -> Result<()> {
        Ok(())
    }

    async fn stats(&self) -> Result<IndexStats> {
        Ok(IndexStats {
            total_chunks: 0,
            collection_name: "rejecting".to_string(),
            location: ":memory:".to_string(),
        })
    }
}

fn config() -> RagConfig {
    RagConfig::builder()
        .chunk_size(16)
        .chunk_overlap(4)
        .top_k(3)
        .build()
        .unwrap()
}

fn pipeline_with(generator: Arc<StubGenerator>) -> RagPipeline {
    let embedder = Arc::new(HashEmbedder::new(DIM).unwrap());
    let store = Arc::new(LocalVectorStore::in_memory("docs", embedder.clone()));
    RagPipeline::builder()
        .config(config())
        .embedding_provider(embedder)
        .vector_store(store)
        .generator(generator)
        .build()
        .unwrap()
}

fn metadata() -> HashMap<String, String> {
    HashMap::from([
        ("source".to_string(), "Student Handbook".to_string()),
        ("section".to_string(), "2.4".to_string()),
    ])
}

const HANDBOOK: &str = "Student visa holders must maintain full-time enrollment. \
    Work is limited to forty-eight hours per fortnight during session. \
    Visa processing typically takes four to six weeks from lodgement. \
    Applicants must hold overseas health cover for the full stay.";

async fn ingested_pipeline(generator: Arc<StubGenerator>) -> RagPipeline {
    let pipeline = pipeline_with(generator);
    let outcome = pipeline.ingest("doc_1", "Handbook", HANDBOOK, metadata(), "handbook.txt").await;
    assert!(matches!(outcome, IngestOutcome::Success { .. }));
    pipeline
}

#[tokio::test]
async fn ingest_reports_chunks_and_stamps_upload_date() {
    let pipeline = pipeline_with(Arc::new(StubGenerator::new("ok")));

    let outcome = pipeline.ingest("doc_1", "Handbook", HANDBOOK, metadata(), "handbook.txt").await;
    match outcome {
        IngestOutcome::Success { document_id, title, chunks_created, filename, metadata } => {
            assert_eq!(document_id, "doc_1");
            assert_eq!(title, "Handbook");
            assert!(chunks_created > 1);
            assert_eq!(filename, "handbook.txt");
            assert_eq!(metadata.get("source").map(String::as_str), Some("Student Handbook"));
            assert!(metadata.contains_key("upload_date"));

            let stats = pipeline.stats().await.unwrap();
            assert_eq!(stats.index.total_chunks, chunks_created);
        }
        IngestOutcome::Error { error, .. } => panic!("ingest failed: {error}"),
    }
}

#[tokio::test]
async fn ingest_keeps_caller_supplied_upload_date() {
    let pipeline = pipeline_with(Arc::new(StubGenerator::new("ok")));
    let mut meta = metadata();
    meta.insert("upload_date".to_string(), "2024-01-01T00:00:00Z".to_string());

    match pipeline.ingest("doc_1", "Handbook", HANDBOOK, meta, "handbook.txt").await {
        IngestOutcome::Success { metadata, .. } => {
            assert_eq!(metadata.get("upload_date").map(String::as_str), Some("2024-01-01T00:00:00Z"));
        }
        IngestOutcome::Error { error, .. } => panic!("ingest failed: {error}"),
    }
}

#[tokio::test]
async fn ingest_of_empty_text_is_an_error_outcome() {
    let pipeline = pipeline_with(Arc::new(StubGenerator::new("ok")));

    let outcome = pipeline.ingest("doc_1", "Empty", "   ", metadata(), "empty.txt").await;
    match outcome {
        IngestOutcome::Error { filename, .. } => assert_eq!(filename, "empty.txt"),
        IngestOutcome::Success { .. } => panic!("empty document should not ingest"),
    }
    assert_eq!(pipeline.stats().await.unwrap().index.total_chunks, 0);
}

#[tokio::test]
async fn ingest_index_failure_is_an_error_outcome() {
    let embedder = Arc::new(HashEmbedder::new(DIM).unwrap());
    let pipeline = RagPipeline::builder()
        .config(config())
        .embedding_provider(embedder)
        .vector_store(Arc::new(RejectingStore))
        .generator(Arc::new(StubGenerator::new("ok")))
        .build()
        .unwrap();

    let outcome = pipeline.ingest("doc_1", "Handbook", HANDBOOK, metadata(), "handbook.txt").await;
    match outcome {
        IngestOutcome::Error { error, filename } => {
            assert_eq!(filename, "handbook.txt");
            assert!(error.contains("disk full"), "unexpected error: {error}");
        }
        IngestOutcome::Success { .. } => panic!("write failure should surface as an error outcome"),
    }
}

#[tokio::test]
async fn query_on_empty_index_skips_generation() {
    let generator = Arc::new(StubGenerator::new("should not run"));
    let pipeline = pipeline_with(generator.clone());

    match pipeline.query("What are the work limits?", None, false).await {
        QueryOutcome::Error { error, question } => {
            assert_eq!(error, "No relevant documents found");
            assert_eq!(question, "What are the work limits?");
        }
        QueryOutcome::Success { .. } => panic!("query on an empty index should fail"),
    }
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn query_answers_with_sources_and_metadata() {
    let generator = Arc::new(StubGenerator::new("Forty-eight hours per fortnight."));
    let pipeline = ingested_pipeline(generator.clone()).await;

    match pipeline.query("What are the work limits?", None, false).await {
        QueryOutcome::Success { question, answer, sources, metadata } => {
            assert_eq!(question, "What are the work limits?");
            assert_eq!(answer, "Forty-eight hours per fortnight.");
            assert!(!sources.is_empty());
            assert!(sources.len() <= 3);
            for source in &sources {
                assert_eq!(source.title, "Handbook");
                assert_eq!(source.source, "Student Handbook");
                assert_eq!(source.section, "2.4");
                assert!(source.content_preview.is_some());
            }
            assert_eq!(metadata.retrieval_method, "semantic_search");
            assert_eq!(metadata.documents_retrieved, sources.len());
            assert_eq!(metadata.model, "stub-model");
            assert_eq!(metadata.usage.total_tokens, Some(15));
        }
        QueryOutcome::Error { error, .. } => panic!("query failed: {error}"),
    }
    assert_eq!(generator.calls(), 1);
}

#[tokio::test]
async fn reranked_query_reports_its_retrieval_method() {
    let generator = Arc::new(StubGenerator::new("ok"));
    let pipeline = ingested_pipeline(generator).await;

    match pipeline.query("visa processing time", Some(2), true).await {
        QueryOutcome::Success { sources, metadata, .. } => {
            assert_eq!(metadata.retrieval_method, "reranking");
            assert!(sources.len() <= 2);
        }
        QueryOutcome::Error { error, .. } => panic!("query failed: {error}"),
    }
}

#[tokio::test]
async fn query_generation_failure_is_an_error_outcome() {
    let pipeline = ingested_pipeline(Arc::new(StubGenerator::failing())).await;

    match pipeline.query("processing time", None, false).await {
        QueryOutcome::Error { error, .. } => {
            assert!(error.contains("backend unavailable"), "unexpected error: {error}");
        }
        QueryOutcome::Success { .. } => panic!("generation failure should surface"),
    }
}

#[tokio::test]
async fn streaming_query_emits_content_then_one_sources_event() {
    let generator = Arc::new(StubGenerator::with_deltas("", &["Forty-eight ", "hours ", "per fortnight."]));
    let pipeline = ingested_pipeline(generator).await;

    let (tx, mut rx) = mpsc::channel(32);
    pipeline.query_streaming("What are the work limits?", None, tx).await;

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }

    assert!(events.len() >= 2);
    let (content, terminal) = events.split_at(events.len() - 1);
    let mut answer = String::new();
    for event in content {
        match event {
            QueryEvent::Content(delta) => answer.push_str(delta),
            other => panic!("non-content event before terminal: {other:?}"),
        }
    }
    assert_eq!(answer, "Forty-eight hours per fortnight.");
    match &terminal[0] {
        QueryEvent::Sources(sources) => {
            assert!(!sources.is_empty());
            for source in sources {
                assert!(source.content_preview.is_none());
            }
        }
        other => panic!("expected terminal sources event, got {other:?}"),
    }
}

#[tokio::test]
async fn streaming_query_on_empty_index_emits_single_error_event() {
    let generator = Arc::new(StubGenerator::with_deltas("", &["unused"]));
    let pipeline = pipeline_with(generator.clone());

    let (tx, mut rx) = mpsc::channel(32);
    pipeline.query_streaming("anything", None, tx).await;

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    assert_eq!(events, vec![QueryEvent::Error("No relevant documents found".to_string())]);
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn streaming_generation_failure_terminates_with_error_event() {
    let pipeline = ingested_pipeline(Arc::new(StubGenerator::failing())).await;

    let (tx, mut rx) = mpsc::channel(32);
    pipeline.query_streaming("processing time", None, tx).await;

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], QueryEvent::Error(e) if e.contains("backend unavailable")));
}

#[tokio::test]
async fn stats_combine_index_retrieval_and_config() {
    let pipeline = ingested_pipeline(Arc::new(StubGenerator::new("ok"))).await;

    let stats = pipeline.stats().await.unwrap();
    assert!(stats.index.total_chunks > 0);
    assert_eq!(stats.index.total_chunks, stats.retrieval.index.total_chunks);
    assert_eq!(stats.retrieval.embedding_dimension, DIM);
    assert_eq!(stats.config, config());
}
