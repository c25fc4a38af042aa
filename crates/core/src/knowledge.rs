//! Retriever trait: ranked lookup over the curated medical knowledge base.
//!
//! The index itself is built offline; at chat time the retriever only
//! answers "which passages are closest to this query".

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RetrievalError;

/// A passage of reference text returned by retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snippet {
    /// The passage text handed to the model as grounding.
    pub text: String,

    /// Where the passage came from (file name, page, etc.)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Similarity score reported by the index (higher = closer)
    #[serde(default)]
    pub score: f32,
}

impl Snippet {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: None,
            score: 0.0,
        }
    }
}

/// The core Retriever trait.
///
/// Implementations: embedding + vector index (in-memory JSON, Pinecone).
#[async_trait]
pub trait Retriever: Send + Sync {
    /// The backend name (e.g., "memory", "pinecone").
    fn name(&self) -> &str;

    /// Return up to `k` snippets, most relevant first.
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Snippet>, RetrievalError>;
}
