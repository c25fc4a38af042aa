//! Configuration loading, validation, and management for DermAssist.
//!
//! Loads configuration from `~/.dermassist/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.dermassist/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the generation provider (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Generation provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Generation model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Generation temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Max tokens per answer
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// HTTP gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Image classifier configuration
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Knowledge retrieval configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Conversation orchestration configuration
    #[serde(default)]
    pub assistant: AssistantConfig,
}

fn default_provider() -> String {
    "groq".into()
}
fn default_model() -> String {
    "llama-3.3-70b-versatile".into()
}
fn default_temperature() -> f32 {
    0.3
}
fn default_max_tokens() -> u32 {
    1024
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("providers", &self.providers)
            .field("gateway", &self.gateway)
            .field("classifier", &self.classifier)
            .field("retrieval", &self.retrieval)
            .field("assistant", &self.assistant)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Allowed CORS origins. Empty = any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Maximum request body size (image uploads included)
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_port() -> u16 {
    10000
}
fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            cors_origins: vec![],
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// TensorFlow-Serving style predict endpoint
    #[serde(default = "default_classifier_endpoint")]
    pub endpoint: String,

    /// Square input resolution expected by the model
    #[serde(default = "default_image_size")]
    pub image_size: u32,

    #[serde(default = "default_classifier_timeout")]
    pub timeout_secs: u64,
}

fn default_classifier_endpoint() -> String {
    "http://localhost:8501/v1/models/derma_mobilenet:predict".into()
}
fn default_image_size() -> u32 {
    224
}
fn default_classifier_timeout() -> u64 {
    30
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            endpoint: default_classifier_endpoint(),
            image_size: default_image_size(),
            timeout_secs: default_classifier_timeout(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Index backend: "memory" (JSON file) or "pinecone"
    #[serde(default = "default_retrieval_backend")]
    pub backend: String,

    /// Number of snippets handed to generation
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// JSON index file for the "memory" backend
    #[serde(default = "default_index_path")]
    pub index_path: String,

    #[serde(default = "default_index_name")]
    pub index_name: String,

    /// Pinecone index host, e.g. `https://derma-ai-xxxx.svc.pinecone.io`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinecone_host: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinecone_api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinecone_namespace: Option<String>,

    /// Provider (from `[providers]` or a well-known name) used for embeddings
    #[serde(default = "default_embedding_provider")]
    pub embedding_provider: String,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Ingestion chunk size in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

fn default_retrieval_backend() -> String {
    "memory".into()
}
fn default_top_k() -> usize {
    3
}
fn default_index_path() -> String {
    AppConfig::config_dir()
        .join("knowledge_index.json")
        .to_string_lossy()
        .into_owned()
}
fn default_index_name() -> String {
    "derma-ai".into()
}
fn default_embedding_provider() -> String {
    "ollama".into()
}
fn default_embedding_model() -> String {
    "all-minilm".into()
}
fn default_chunk_size() -> usize {
    500
}
fn default_chunk_overlap() -> usize {
    20
}

impl std::fmt::Debug for RetrievalConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalConfig")
            .field("backend", &self.backend)
            .field("top_k", &self.top_k)
            .field("index_path", &self.index_path)
            .field("index_name", &self.index_name)
            .field("pinecone_host", &self.pinecone_host)
            .field("pinecone_api_key", &redact(&self.pinecone_api_key))
            .field("pinecone_namespace", &self.pinecone_namespace)
            .field("embedding_provider", &self.embedding_provider)
            .field("embedding_model", &self.embedding_model)
            .field("chunk_size", &self.chunk_size)
            .field("chunk_overlap", &self.chunk_overlap)
            .finish()
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            backend: default_retrieval_backend(),
            top_k: default_top_k(),
            index_path: default_index_path(),
            index_name: default_index_name(),
            pinecone_host: None,
            pinecone_api_key: None,
            pinecone_namespace: None,
            embedding_provider: default_embedding_provider(),
            embedding_model: default_embedding_model(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// Upper bound on retrieval + generation for one chat turn
    #[serde(default = "default_generation_timeout")]
    pub generation_timeout_secs: u64,

    /// Live sessions kept before the least recently active is evicted
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Replace the built-in behavior directive with this file's contents
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directive_path: Option<String>,
}

fn default_generation_timeout() -> u64 {
    60
}
fn default_max_sessions() -> usize {
    1_000
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            generation_timeout_secs: default_generation_timeout(),
            max_sessions: default_max_sessions(),
            directive_path: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.dermassist/config.toml).
    ///
    /// Environment variables take priority over the file:
    /// - `DERMASSIST_API_KEY`, then `GROQ_API_KEY`, then `OPENAI_API_KEY`
    /// - `PINECONE_API_KEY`
    /// - `DERMASSIST_PROVIDER`, `DERMASSIST_MODEL`
    /// - `PORT`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through a lookup function.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(key) = lookup("DERMASSIST_API_KEY")
            .or_else(|| lookup("GROQ_API_KEY"))
            .or_else(|| lookup("OPENAI_API_KEY"))
        {
            self.api_key = Some(key);
        }

        if let Some(key) = lookup("PINECONE_API_KEY") {
            self.retrieval.pinecone_api_key = Some(key);
        }

        if let Some(provider) = lookup("DERMASSIST_PROVIDER") {
            self.default_provider = provider;
        }

        if let Some(model) = lookup("DERMASSIST_MODEL") {
            self.default_model = model;
        }

        if let Some(port) = lookup("PORT") {
            self.gateway.port = port
                .parse()
                .map_err(|_| ConfigError::ValidationError(format!("PORT '{port}' is not a valid port")))?;
        }

        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".dermassist")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.retrieval.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.top_k must be at least 1".into(),
            ));
        }

        if !matches!(self.retrieval.backend.as_str(), "memory" | "pinecone") {
            return Err(ConfigError::ValidationError(format!(
                "retrieval.backend must be \"memory\" or \"pinecone\", got \"{}\"",
                self.retrieval.backend
            )));
        }

        if self.retrieval.chunk_overlap >= self.retrieval.chunk_size {
            return Err(ConfigError::ValidationError(
                "retrieval.chunk_overlap must be smaller than retrieval.chunk_size".into(),
            ));
        }

        if self.classifier.image_size == 0 {
            return Err(ConfigError::ValidationError(
                "classifier.image_size must be positive".into(),
            ));
        }

        if self.assistant.generation_timeout_secs == 0 || self.assistant.max_sessions == 0 {
            return Err(ConfigError::ValidationError(
                "assistant.generation_timeout_secs and assistant.max_sessions must be positive"
                    .into(),
            ));
        }

        Ok(())
    }

    /// Check if a generation API key is available.
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
            || self
                .providers
                .get(&self.default_provider)
                .is_some_and(|p| p.api_key.is_some())
    }

    /// Generate a default config TOML string (for the `config` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            providers: HashMap::new(),
            gateway: GatewayConfig::default(),
            classifier: ClassifierConfig::default(),
            retrieval: RetrievalConfig::default(),
            assistant: AssistantConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_provider, "groq");
        assert_eq!(config.gateway.port, 10000);
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.classifier.image_size, 224);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_model, config.default_model);
        assert_eq!(parsed.retrieval.index_name, "derma-ai");
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            default_temperature: 5.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_retrieval_backend_rejected() {
        let mut config = AppConfig::default();
        config.retrieval.backend = "faiss".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("faiss"));
    }

    #[test]
    fn zero_top_k_rejected() {
        let mut config = AppConfig::default();
        config.retrieval.top_k = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.default_provider, "groq");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
default_model = "llama-3.1-8b-instant"

[retrieval]
backend = "pinecone"
pinecone_host = "https://derma-ai.svc.pinecone.io"

[assistant]
generation_timeout_secs = 15
"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.default_model, "llama-3.1-8b-instant");
        assert_eq!(config.retrieval.backend, "pinecone");
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.assistant.generation_timeout_secs, 15);
        assert_eq!(config.assistant.max_sessions, 1_000);
        assert_eq!(config.gateway.port, 10000);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "default_model = [not toml").unwrap();
        let err = AppConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn env_overrides_apply_in_priority_order() {
        let env: HashMap<&str, &str> = [
            ("GROQ_API_KEY", "gsk-groq"),
            ("OPENAI_API_KEY", "sk-openai"),
            ("PINECONE_API_KEY", "pc-key"),
            ("DERMASSIST_MODEL", "mixtral"),
            ("PORT", "8080"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config
            .apply_env(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.api_key.as_deref(), Some("gsk-groq"));
        assert_eq!(config.retrieval.pinecone_api_key.as_deref(), Some("pc-key"));
        assert_eq!(config.default_model, "mixtral");
        assert_eq!(config.gateway.port, 8080);
        assert!(config.has_api_key());
    }

    #[test]
    fn invalid_port_env_rejected() {
        let mut config = AppConfig::default();
        let err = config
            .apply_env(|k| (k == "PORT").then(|| "not-a-port".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("not-a-port"));
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let mut config = AppConfig {
            api_key: Some("gsk-secret".into()),
            ..AppConfig::default()
        };
        config.retrieval.pinecone_api_key = Some("pc-secret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("gsk-secret"));
        assert!(!debug.contains("pc-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("llama-3.3-70b-versatile"));
        assert!(toml_str.contains("10000"));
    }
}
