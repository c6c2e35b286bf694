//! Error types for the `ragpipe` crate.

use thiserror::Error;

/// Errors that can occur in the ingestion and retrieval pipeline.
#[derive(Debug, Error)]
pub enum RagError {
    /// An unrecognized chunking strategy name was requested.
    #[error("unknown chunking strategy: {0}")]
    UnknownStrategy(String),

    /// The embedding backend has not finished loading its model.
    ///
    /// Fatal to the calling operation; the pipeline does not retry.
    #[error("embedding model not ready: {model}")]
    ModelNotReady {
        /// The model that is still loading.
        model: String,
    },

    /// An error occurred during embedding generation.
    #[error("embedding error ({provider}): {message}")]
    Embedding {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred while encoding or decoding tokens.
    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    /// A bulk insert into the vector index failed or was rejected.
    ///
    /// Ingestion aborts for the affected document; the orchestrator
    /// reports this as a structured error result.
    #[error("index write failure ({backend}): {message}")]
    IndexWrite {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred in the vector store backend.
    #[error("vector store error ({backend}): {message}")]
    VectorStore {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred in the generation collaborator.
    #[error("generation error ({model}): {message}")]
    Generation {
        /// The generation model that produced the error.
        model: String,
        /// A description of the failure.
        message: String,
    },

    /// A configuration validation error.
    #[error("configuration error: {0}")]
    Config(String),

    /// An error in the pipeline orchestration.
    #[error("pipeline error: {0}")]
    Pipeline(String),
}

/// A convenience result type for pipeline operations.
pub type Result<T> = std::result::Result<T, RagError>;
