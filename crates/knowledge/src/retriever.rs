//! Query-time retrieval: embed the query, then ask the index for neighbours.

use async_trait::async_trait;
use dermassist_core::error::RetrievalError;
use dermassist_core::knowledge::{Retriever, Snippet};
use dermassist_core::provider::{EmbeddingRequest, Provider};
use std::sync::Arc;
use tracing::debug;

use crate::index::VectorIndex;

/// A [`Retriever`] composed of an embedding provider and a vector index.
pub struct EmbeddingRetriever {
    embedder: Arc<dyn Provider>,
    model: String,
    index: Arc<dyn VectorIndex>,
}

impl EmbeddingRetriever {
    pub fn new(
        embedder: Arc<dyn Provider>,
        model: impl Into<String>,
        index: Arc<dyn VectorIndex>,
    ) -> Self {
        Self {
            embedder,
            model: model.into(),
            index,
        }
    }
}

/// Embed a single text with `embedder`.
pub(crate) async fn embed_one(
    embedder: &dyn Provider,
    model: &str,
    text: &str,
) -> Result<Vec<f32>, RetrievalError> {
    let response = embedder
        .embed(EmbeddingRequest {
            model: model.to_string(),
            inputs: vec![text.to_string()],
        })
        .await
        .map_err(|e| RetrievalError::EmbeddingFailed(e.to_string()))?;

    response
        .embeddings
        .into_iter()
        .next()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| RetrievalError::EmbeddingFailed("provider returned no embedding".into()))
}

#[async_trait]
impl Retriever for EmbeddingRetriever {
    fn name(&self) -> &str {
        self.index.name()
    }

    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Snippet>, RetrievalError> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let vector = embed_one(self.embedder.as_ref(), &self.model, query).await?;
        let mut snippets = self.index.query(&vector, k).await?;
        snippets.truncate(k);

        debug!(
            index = %self.index.name(),
            query_len = query.len(),
            snippets = snippets.len(),
            "Retrieved knowledge snippets"
        );

        Ok(snippets)
    }
}
