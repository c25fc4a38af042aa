//! The vector index abstraction shared by the local and hosted backends.

use async_trait::async_trait;
use dermassist_core::error::RetrievalError;
use dermassist_core::knowledge::Snippet;
use serde::{Deserialize, Serialize};

/// One embedded chunk of reference text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub embedding: Vec<f32>,
}

impl IndexEntry {
    /// The entry as a retrieval result with the given score.
    pub fn to_snippet(&self, score: f32) -> Snippet {
        Snippet {
            text: self.text.clone(),
            source: self.source.clone(),
            score,
        }
    }
}

/// Id of the `n`th chunk of `source`.
pub fn chunk_id(source: &str, n: usize) -> String {
    format!("{source}#{n}")
}

/// The chunk number of `id` if it belongs to `source`.
pub fn chunk_number(id: &str, source: &str) -> Option<usize> {
    id.strip_prefix(source)?.strip_prefix('#')?.parse().ok()
}

/// Nearest-neighbour storage for embedded chunks.
///
/// Implementations: [`JsonIndex`](crate::JsonIndex) (local file),
/// [`PineconeIndex`](crate::PineconeIndex) (hosted).
#[async_trait]
pub trait VectorIndex: Send + Sync {
    fn name(&self) -> &str;

    /// Up to `top_k` entries closest to `vector`, best first.
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<Snippet>, RetrievalError>;

    /// Insert or replace entries by id. Returns how many were written.
    async fn upsert(&self, entries: Vec<IndexEntry>) -> Result<usize, RetrievalError>;

    /// Delete the chunks of `source` numbered `keep` and above, left over
    /// from a longer earlier version. Returns how many were deleted.
    async fn prune_source(&self, source: &str, keep: usize) -> Result<usize, RetrievalError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_numbers_belong_to_their_source() {
        assert_eq!(chunk_number(&chunk_id("acne.md", 7), "acne.md"), Some(7));
        assert_eq!(chunk_number("acne.md#x", "acne.md"), None);
        assert_eq!(chunk_number("acne.md.bak#1", "acne.md"), None);
        assert_eq!(chunk_number("rosacea.md#1", "acne.md"), None);
    }
}
