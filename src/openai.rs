//! OpenAI-compatible embedding provider over HTTP.
//!
//! This module is only available when the `openai` feature is enabled.
//! The base URL is configurable, so any endpoint speaking the
//! `/v1/embeddings` protocol works (OpenAI, the Hugging Face router,
//! vLLM, ...).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

/// The default embeddings API base URL.
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// The default embedding model.
const DEFAULT_MODEL: &str = "text-embedding-3-small";

/// The default dimensionality for `text-embedding-3-small`.
const DEFAULT_DIMENSIONS: usize = 1536;

/// An [`EmbeddingProvider`] backed by an OpenAI-style embeddings API.
///
/// # Configuration
///
/// - `model` – defaults to `text-embedding-3-small`.
/// - `base_url` – defaults to the OpenAI endpoint; point it at any
///   compatible router.
/// - `dimensions` – must match the model; defaults to 1536.
///
/// # Example
///
/// ```rust,ignore
/// use ragpipe::openai::RemoteEmbeddingProvider;
///
/// let provider = RemoteEmbeddingProvider::new("hf_...")?
///     .with_base_url("https://router.huggingface.co/v1")
///     .with_model("sentence-transformers/all-MiniLM-L6-v2")
///     .with_dimensions(384);
/// let embedding = provider.embed("hello world").await?;
/// ```
pub struct RemoteEmbeddingProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    dimensions: usize,
}

impl RemoteEmbeddingProvider {
    /// Create a new provider with the given API key.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Embedding`] if the key is empty.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(RagError::Embedding {
                provider: "openai".into(),
                message: "API key must not be empty".into(),
            });
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: OPENAI_BASE_URL.into(),
            model: DEFAULT_MODEL.into(),
            dimensions: DEFAULT_DIMENSIONS,
        })
    }

    /// Set the API base URL (without the `/embeddings` suffix).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the expected output dimensionality.
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = dimensions;
        self
    }

    async fn request(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let request_body = EmbeddingRequest { model: &self.model, input: texts.to_vec() };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                error!(provider = "openai", error = %e, "request failed");
                RagError::Embedding {
                    provider: "openai".into(),
                    message: format!("request failed: {e}"),
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);

            // Routers answer 503 while the model is still loading.
            if status == reqwest::StatusCode::SERVICE_UNAVAILABLE {
                return Err(RagError::ModelNotReady { model: self.model.clone() });
            }

            error!(provider = "openai", %status, "API error");
            return Err(RagError::Embedding {
                provider: "openai".into(),
                message: format!("API returned {status}: {detail}"),
            });
        }

        let embedding_response: EmbeddingResponse = response.json().await.map_err(|e| {
            error!(provider = "openai", error = %e, "failed to parse response");
            RagError::Embedding {
                provider: "openai".into(),
                message: format!("failed to parse response: {e}"),
            }
        })?;

        // Normalize so cosine similarity reduces to a dot product,
        // regardless of what the backend returns.
        Ok(embedding_response
            .data
            .into_iter()
            .map(|d| {
                let mut v = d.embedding;
                let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
                if norm > 0.0 {
                    for value in &mut v {
                        *value /= norm;
                    }
                }
                v
            })
            .collect())
    }
}

// ── API request/response types ─────────────────────────────────────

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

// ── EmbeddingProvider implementation ───────────────────────────────

#[async_trait]
impl EmbeddingProvider for RemoteEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(provider = "openai", text_len = text.len(), "embedding single text");

        let results = self.request(&[text]).await?;
        results.into_iter().next().ok_or_else(|| RagError::Embedding {
            provider: "openai".into(),
            message: "API returned empty response".into(),
        })
    }

    async fn embed_batch(&self, texts: &[&str], batch_size: usize) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let batch_size = batch_size.max(1);
        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(batch_size) {
            debug!(provider = "openai", batch_len = batch.len(), model = %self.model, "embedding batch");
            embeddings.extend(self.request(batch).await?);
        }
        Ok(embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
