//! Wiring the configured components together.
//!
//! Shared by the HTTP server and the CLI so both run the exact same
//! classifier, retriever and assistant.

use dermassist_assistant::Assistant;
use dermassist_classifier::RemoteClassifier;
use dermassist_config::AppConfig;
use dermassist_core::classification::Classifier;
use dermassist_core::error::Error;
use dermassist_core::knowledge::Retriever;
use dermassist_knowledge::{EmbeddingRetriever, JsonIndex, PineconeIndex, VectorIndex};
use dermassist_providers::router::{ProviderRouter, build_from_config};
use std::sync::Arc;
use tracing::{info, warn};

/// The classifier named by `[classifier]`.
pub fn build_classifier(config: &AppConfig) -> Arc<dyn Classifier> {
    Arc::new(RemoteClassifier::from_config(&config.classifier))
}

/// The vector index named by `[retrieval]`.
pub fn build_index(config: &AppConfig) -> Result<Arc<dyn VectorIndex>, Error> {
    let retrieval = &config.retrieval;
    match retrieval.backend.as_str() {
        "pinecone" => {
            let host = retrieval.pinecone_host.clone().ok_or_else(|| Error::Config {
                message: "retrieval.pinecone_host is required for the pinecone backend".into(),
            })?;
            let api_key = retrieval.pinecone_api_key.clone().ok_or_else(|| Error::Config {
                message: "PINECONE_API_KEY (or retrieval.pinecone_api_key) is not set".into(),
            })?;
            info!(index = %retrieval.index_name, "Using Pinecone knowledge index");
            Ok(Arc::new(
                PineconeIndex::new(host, api_key).with_namespace(retrieval.pinecone_namespace.clone()),
            ))
        }
        _ => Ok(Arc::new(JsonIndex::open(&retrieval.index_path))),
    }
}

/// An embedding retriever over the configured index.
pub fn build_retriever(
    config: &AppConfig,
    providers: &ProviderRouter,
) -> Result<Arc<dyn Retriever>, Error> {
    let embedder = providers
        .get(&config.retrieval.embedding_provider)
        .ok_or_else(|| Error::Config {
            message: format!(
                "embedding provider '{}' is not configured",
                config.retrieval.embedding_provider
            ),
        })?;
    let index = build_index(config)?;
    Ok(Arc::new(EmbeddingRetriever::new(
        embedder,
        config.retrieval.embedding_model.clone(),
        index,
    )))
}

/// The full chat assistant: generation provider, retriever and directive.
pub fn build_assistant(config: &AppConfig) -> Result<Assistant, Error> {
    if !config.has_api_key() {
        warn!("No API key configured; generation requests will likely be rejected");
    }

    let providers = build_from_config(config);
    let provider = providers.default().ok_or_else(|| Error::Config {
        message: format!("provider '{}' is not configured", config.default_provider),
    })?;
    let retriever = build_retriever(config, &providers)?;

    Assistant::from_config(config, provider, retriever)
}
