//! Generation collaborator contract.
//!
//! The pipeline does not define an LLM client; it defines the text
//! contract one must satisfy: a formatted prompt built from the question
//! plus ordered context entries, answered either as a single completion
//! with usage metadata or as an incremental text stream.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::document::QueryResult;
use crate::error::Result;

/// One retrieved passage, reduced to the fields the prompt needs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContextEntry {
    /// Source attribution (document or corpus name).
    pub source: String,
    /// Section within the source.
    pub section: String,
    /// The passage text.
    pub content: String,
}

impl ContextEntry {
    /// Build a context entry from a ranked retrieval result.
    pub fn from_result(result: &QueryResult) -> Self {
        Self {
            source: result.metadata.get("source").unwrap_or_else(|| "Unknown".to_string()),
            section: result.metadata.get("section").unwrap_or_else(|| "Unknown".to_string()),
            content: result.content.clone(),
        }
    }
}

/// Token usage reported by the generation backend, when available.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Usage {
    /// Tokens consumed by the prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<u64>,
    /// Tokens produced in the completion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<u64>,
    /// Total tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
}

/// A single text completion with usage metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Completion {
    /// The generated answer text.
    pub text: String,
    /// The model that produced it.
    pub model: String,
    /// Token usage, when the backend reports it.
    pub usage: Usage,
}

/// Format the prompt handed to the generation collaborator.
///
/// Context entries are numbered with their source and section headers,
/// followed by the question and answering instructions.
pub fn format_rag_prompt(question: &str, context: &[ContextEntry]) -> String {
    let mut prompt = String::from("Relevant documents:\n\n");

    for (i, entry) in context.iter().enumerate() {
        prompt.push_str(&format!(
            "Document {} - {}, Section {}:\n{}\n\n",
            i + 1,
            entry.source,
            entry.section,
            entry.content
        ));
    }

    prompt.push_str(&format!(
        "Based on the above documents, please answer the following question:\n\n\
         Question: {question}\n\n\
         Instructions:\n\
         - Provide a clear, accurate answer based on the provided documents\n\
         - If the answer is not found in the documents, state that clearly\n\
         - Include relevant citations to specific documents and sections\n\
         - Be concise but comprehensive\n\n\
         Answer:"
    ));

    prompt
}

/// A generation backend that turns retrieved context into prose.
///
/// Implementations wrap a concrete LLM client; the pipeline only relies
/// on this contract.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate a complete answer for the question given ordered context.
    async fn generate(&self, question: &str, context: &[ContextEntry]) -> Result<Completion>;

    /// Generate an answer incrementally, sending text deltas on `tx`.
    ///
    /// The default implementation generates the full answer and sends it
    /// as one delta. A dropped receiver is not an error: generation runs
    /// to completion server-side regardless of whether anyone is still
    /// listening.
    async fn generate_streaming(
        &self,
        question: &str,
        context: &[ContextEntry],
        tx: mpsc::Sender<String>,
    ) -> Result<()> {
        let completion = self.generate(question, context).await?;
        let _ = tx.send(completion.text).await;
        Ok(())
    }

    /// The name of the generation model.
    fn model_name(&self) -> &str;
}
