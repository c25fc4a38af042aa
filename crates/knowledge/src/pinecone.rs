//! Hosted vector index backed by Pinecone's data-plane REST API.
//!
//! Chunk text lives in match metadata under `text` (and `source`), which is
//! the layout the offline ingestion writes.

use async_trait::async_trait;
use dermassist_core::error::RetrievalError;
use dermassist_core::knowledge::Snippet;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::index::{IndexEntry, VectorIndex, chunk_number};

const API_VERSION: &str = "2024-07";
const UPSERT_BATCH: usize = 100;

pub struct PineconeIndex {
    host: String,
    api_key: String,
    namespace: Option<String>,
    client: reqwest::Client,
}

impl PineconeIndex {
    /// `host` is the index host shown in the Pinecone console.
    pub fn new(host: impl Into<String>, api_key: impl Into<String>) -> Self {
        let host = host.into();
        let host = if host.starts_with("http://") || host.starts_with("https://") {
            host
        } else {
            format!("https://{host}")
        };

        Self {
            host: host.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            namespace: None,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    pub fn with_namespace(mut self, namespace: Option<String>) -> Self {
        self.namespace = namespace.filter(|n| !n.is_empty());
        self
    }

    async fn post<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, RetrievalError> {
        let url = format!("{}{path}", self.host);
        let response = self
            .client
            .post(&url)
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .json(body)
            .send()
            .await
            .map_err(|e| RetrievalError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %error_body, "Pinecone returned error");
            return Err(RetrievalError::QueryFailed(format!(
                "Pinecone {path} failed with status {status}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| RetrievalError::QueryFailed(format!("Failed to parse Pinecone response: {e}")))
    }

    /// Every vector id starting with `prefix`, following pagination.
    async fn list_ids(&self, prefix: &str) -> Result<Vec<String>, RetrievalError> {
        let url = format!("{}/vectors/list", self.host);
        let mut ids = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let mut query = vec![("prefix", prefix.to_string())];
            if let Some(namespace) = &self.namespace {
                query.push(("namespace", namespace.clone()));
            }
            if let Some(token) = &token {
                query.push(("paginationToken", token.clone()));
            }

            let response = self
                .client
                .get(&url)
                .header("Api-Key", &self.api_key)
                .header("X-Pinecone-API-Version", API_VERSION)
                .query(&query)
                .send()
                .await
                .map_err(|e| RetrievalError::Unavailable(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(RetrievalError::QueryFailed(format!(
                    "Pinecone /vectors/list failed with status {status}"
                )));
            }

            let page: ListResponse = response.json().await.map_err(|e| {
                RetrievalError::QueryFailed(format!("Failed to parse Pinecone response: {e}"))
            })?;
            ids.extend(page.vectors.into_iter().map(|v| v.id));

            match page.pagination.and_then(|p| p.next) {
                Some(next) => token = Some(next),
                None => return Ok(ids),
            }
        }
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    fn name(&self) -> &str {
        "pinecone"
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<Snippet>, RetrievalError> {
        let request = QueryRequest {
            vector,
            top_k,
            include_metadata: true,
            namespace: self.namespace.as_deref(),
        };

        let response: QueryResponse = self.post("/query", &request).await?;
        debug!(matches = response.matches.len(), "Pinecone query complete");

        Ok(response.into_snippets())
    }

    async fn upsert(&self, entries: Vec<IndexEntry>) -> Result<usize, RetrievalError> {
        let mut written = 0;
        for batch in entries.chunks(UPSERT_BATCH) {
            let request = UpsertRequest {
                vectors: batch
                    .iter()
                    .map(|e| UpsertVector {
                        id: &e.id,
                        values: &e.embedding,
                        metadata: MatchMetadata {
                            text: Some(e.text.clone()),
                            source: e.source.clone(),
                        },
                    })
                    .collect(),
                namespace: self.namespace.as_deref(),
            };
            let response: UpsertResponse = self.post("/vectors/upsert", &request).await?;
            written += response.upserted_count;
        }
        Ok(written)
    }

    async fn prune_source(&self, source: &str, keep: usize) -> Result<usize, RetrievalError> {
        let stale = stale_ids(self.list_ids(&format!("{source}#")).await?, source, keep);

        for batch in stale.chunks(UPSERT_BATCH) {
            let request = DeleteRequest {
                ids: batch,
                namespace: self.namespace.as_deref(),
            };
            let _: serde_json::Value = self.post("/vectors/delete", &request).await?;
        }

        debug!(source, deleted = stale.len(), "Pruned stale Pinecone chunks");
        Ok(stale.len())
    }
}

/// Chunks of `source` numbered `keep` and above.
fn stale_ids(ids: Vec<String>, source: &str, keep: usize) -> Vec<String> {
    ids.into_iter()
        .filter(|id| matches!(chunk_number(id, source), Some(n) if n >= keep))
        .collect()
}

// --- Pinecone API types (internal) ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<Match>,
}

#[derive(Debug, Deserialize)]
struct Match {
    #[allow(dead_code)]
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<MatchMetadata>,
}

#[derive(Debug, Serialize, Deserialize)]
struct MatchMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source: Option<String>,
}

impl QueryResponse {
    /// Matches without text carry nothing to ground on and are dropped.
    fn into_snippets(self) -> Vec<Snippet> {
        self.matches
            .into_iter()
            .filter_map(|m| {
                let metadata = m.metadata?;
                let text = metadata.text.filter(|t| !t.trim().is_empty())?;
                Some(Snippet {
                    text,
                    source: metadata.source,
                    score: m.score,
                })
            })
            .collect()
    }
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: Vec<UpsertVector<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Serialize)]
struct UpsertVector<'a> {
    id: &'a str,
    values: &'a [f32],
    metadata: MatchMetadata,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: usize,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    vectors: Vec<ListedVector>,
    #[serde(default)]
    pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
struct ListedVector {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Pagination {
    #[serde(default)]
    next: Option<String>,
}

#[derive(Serialize)]
struct DeleteRequest<'a> {
    ids: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_gets_scheme_and_loses_trailing_slash() {
        let index = PineconeIndex::new("derma-ai-abc.svc.pinecone.io/", "pc-key");
        assert_eq!(index.host, "https://derma-ai-abc.svc.pinecone.io");
    }

    #[test]
    fn blank_namespace_is_ignored() {
        let index = PineconeIndex::new("https://h", "k").with_namespace(Some(String::new()));
        assert!(index.namespace.is_none());
    }

    #[test]
    fn query_request_uses_camel_case() {
        let request = QueryRequest {
            vector: &[0.1, 0.2],
            top_k: 3,
            include_metadata: true,
            namespace: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["topK"], 3);
        assert_eq!(json["includeMetadata"], true);
        assert!(json.get("namespace").is_none());
    }

    #[test]
    fn matches_convert_to_snippets_in_order() {
        let data = r#"{
            "matches": [
                {"id": "c1", "score": 0.91, "metadata": {"text": "Acne is common.", "source": "derm.pdf"}},
                {"id": "c2", "score": 0.80},
                {"id": "c3", "score": 0.75, "metadata": {"text": "Eczema itches."}}
            ],
            "namespace": ""
        }"#;
        let parsed: QueryResponse = serde_json::from_str(data).unwrap();
        let snippets = parsed.into_snippets();
        assert_eq!(snippets.len(), 2);
        assert_eq!(snippets[0].text, "Acne is common.");
        assert_eq!(snippets[0].source.as_deref(), Some("derm.pdf"));
        assert_eq!(snippets[1].text, "Eczema itches.");
    }

    #[test]
    fn listed_ids_beyond_keep_are_stale() {
        let data = r#"{
            "vectors": [{"id": "acne.md#0"}, {"id": "acne.md#1"}, {"id": "acne.md#12"}, {"id": "acne.md.old#3"}],
            "pagination": {"next": "tok"},
            "namespace": ""
        }"#;
        let page: ListResponse = serde_json::from_str(data).unwrap();
        assert_eq!(page.pagination.and_then(|p| p.next).as_deref(), Some("tok"));

        let ids = page.vectors.into_iter().map(|v| v.id).collect();
        assert_eq!(stale_ids(ids, "acne.md", 1), vec!["acne.md#1", "acne.md#12"]);
    }

    #[test]
    fn parse_upsert_response() {
        let parsed: UpsertResponse = serde_json::from_str(r#"{"upsertedCount": 42}"#).unwrap();
        assert_eq!(parsed.upserted_count, 42);
    }
}
