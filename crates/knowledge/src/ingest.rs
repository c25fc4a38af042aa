//! Offline ingestion: split reference documents into overlapping chunks,
//! embed them, and write them to a vector index.

use dermassist_core::error::RetrievalError;
use dermassist_core::provider::{EmbeddingRequest, Provider};
use std::path::Path;
use std::sync::Arc;
use text_splitter::{ChunkConfig, TextSplitter};
use tracing::info;

use crate::index::{IndexEntry, VectorIndex, chunk_id};

const EMBED_BATCH: usize = 32;

/// Split `text` into chunks of at most `chunk_size` characters, with
/// `overlap` characters shared between neighbours.
pub fn chunk_document(
    text: &str,
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<String>, RetrievalError> {
    let config = ChunkConfig::new(chunk_size)
        .with_overlap(overlap)
        .map_err(|e| RetrievalError::Unavailable(format!("Invalid chunking settings: {e}")))?;
    let splitter = TextSplitter::new(config);

    Ok(splitter
        .chunks(text)
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(String::from)
        .collect())
}

/// Fills a [`VectorIndex`] from documents.
pub struct Ingestor {
    embedder: Arc<dyn Provider>,
    model: String,
    index: Arc<dyn VectorIndex>,
    chunk_size: usize,
    overlap: usize,
}

impl Ingestor {
    pub fn new(
        embedder: Arc<dyn Provider>,
        model: impl Into<String>,
        index: Arc<dyn VectorIndex>,
    ) -> Self {
        Self {
            embedder,
            model: model.into(),
            index,
            chunk_size: 500,
            overlap: 20,
        }
    }

    pub fn with_chunking(mut self, chunk_size: usize, overlap: usize) -> Self {
        self.chunk_size = chunk_size;
        self.overlap = overlap;
        self
    }

    /// Chunk, embed and store one document. Returns the number of chunks written.
    ///
    /// Chunk ids are `<source>#<n>`. Re-ingesting a document overwrites its
    /// chunks and then deletes any left over from a longer earlier version.
    pub async fn ingest_text(&self, source: &str, text: &str) -> Result<usize, RetrievalError> {
        let chunks = chunk_document(text, self.chunk_size, self.overlap)?;
        let mut written = 0;

        for (batch_no, batch) in chunks.chunks(EMBED_BATCH).enumerate() {
            let response = self
                .embedder
                .embed(EmbeddingRequest {
                    model: self.model.clone(),
                    inputs: batch.to_vec(),
                })
                .await
                .map_err(|e| RetrievalError::EmbeddingFailed(e.to_string()))?;

            if response.embeddings.len() != batch.len() {
                return Err(RetrievalError::EmbeddingFailed(format!(
                    "expected {} embeddings, got {}",
                    batch.len(),
                    response.embeddings.len()
                )));
            }

            let entries = batch
                .iter()
                .zip(response.embeddings)
                .enumerate()
                .map(|(i, (text, embedding))| IndexEntry {
                    id: chunk_id(source, batch_no * EMBED_BATCH + i),
                    text: text.clone(),
                    source: Some(source.to_string()),
                    embedding,
                })
                .collect();

            written += self.index.upsert(entries).await?;
        }

        let pruned = self.index.prune_source(source, chunks.len()).await?;
        info!(source, chunks = written, pruned, "Ingested document");
        Ok(written)
    }

    /// Ingest a UTF-8 text or markdown file.
    pub async fn ingest_file(&self, path: &Path) -> Result<usize, RetrievalError> {
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            RetrievalError::Unavailable(format!("Failed to read {}: {e}", path.display()))
        })?;
        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.ingest_text(&source, &text).await
    }
}
