//! File-backed vector index with JSON-lines storage with in-process search.
//!
//! Each line is a JSON-encoded [`IndexEntry`]. Entries are loaded into memory
//! on open and searched by brute-force cosine similarity, which is plenty for
//! a curated knowledge base of a few thousand chunks.
//!
//! Storage location: `~/.dermassist/knowledge_index.json` by default.

use async_trait::async_trait;
use dermassist_core::error::RetrievalError;
use dermassist_core::knowledge::Snippet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::index::{IndexEntry, VectorIndex, chunk_number};
use crate::vector::nearest;

/// A vector index persisted as JSONL (one entry per line).
pub struct JsonIndex {
    path: Option<PathBuf>,
    entries: Arc<RwLock<Vec<IndexEntry>>>,
}

impl JsonIndex {
    /// Open the index at `path`.
    ///
    /// A missing file yields an empty index (the file is created on first
    /// upsert). Corrupted lines are skipped with a warning.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = Self::load_from_disk(&path);
        debug!(path = %path.display(), count = entries.len(), "Knowledge index loaded");
        Self {
            path: Some(path),
            entries: Arc::new(RwLock::new(entries)),
        }
    }

    /// An index that lives only in memory.
    pub fn in_memory(entries: Vec<IndexEntry>) -> Self {
        Self {
            path: None,
            entries: Arc::new(RwLock::new(entries)),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    fn load_from_disk(path: &Path) -> Vec<IndexEntry> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => {
                warn!(path = %path.display(), "Knowledge index not found, starting empty");
                return Vec::new();
            }
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<IndexEntry>(line) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "Skipping corrupted index entry");
                    None
                }
            })
            .collect()
    }

    /// Write all entries to disk as JSONL.
    fn flush(&self, entries: &[IndexEntry]) -> Result<(), RetrievalError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                RetrievalError::Unavailable(format!("Failed to create index directory: {e}"))
            })?;
        }

        let mut content = String::new();
        for entry in entries {
            let line = serde_json::to_string(entry).map_err(|e| {
                RetrievalError::Unavailable(format!("Failed to serialize index entry: {e}"))
            })?;
            content.push_str(&line);
            content.push('\n');
        }

        std::fs::write(path, content)
            .map_err(|e| RetrievalError::Unavailable(format!("Failed to write index file: {e}")))
    }
}

#[async_trait]
impl VectorIndex for JsonIndex {
    fn name(&self) -> &str {
        "memory"
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<Snippet>, RetrievalError> {
        let entries = self.entries.read().await;

        if let Some(first) = entries.first() {
            if first.embedding.len() != vector.len() {
                return Err(RetrievalError::DimensionMismatch {
                    expected: first.embedding.len(),
                    actual: vector.len(),
                });
            }
        }

        Ok(nearest(&entries, vector, top_k)
            .into_iter()
            .map(|(score, entry)| entry.to_snippet(score))
            .collect())
    }

    async fn upsert(&self, new_entries: Vec<IndexEntry>) -> Result<usize, RetrievalError> {
        let mut entries = self.entries.write().await;

        // Written to disk before it is served.
        let mut updated = entries.clone();
        let written = new_entries.len();
        for entry in new_entries {
            match updated.iter_mut().find(|e| e.id == entry.id) {
                Some(existing) => *existing = entry,
                None => updated.push(entry),
            }
        }

        self.flush(&updated)?;
        *entries = updated;
        Ok(written)
    }

    async fn prune_source(&self, source: &str, keep: usize) -> Result<usize, RetrievalError> {
        let mut entries = self.entries.write().await;

        let updated: Vec<IndexEntry> = entries
            .iter()
            .filter(|e| !matches!(chunk_number(&e.id, source), Some(n) if n >= keep))
            .cloned()
            .collect();
        let removed = entries.len() - updated.len();
        if removed == 0 {
            return Ok(0);
        }

        self.flush(&updated)?;
        *entries = updated;
        Ok(removed)
    }
}
