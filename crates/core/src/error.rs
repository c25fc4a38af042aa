//! Error types for the DermAssist domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum.

use thiserror::Error;

/// The top-level error type for all DermAssist operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Input errors ---
    #[error("Invalid input: {0}")]
    Input(String),

    // --- Classifier errors ---
    #[error("Classifier error: {0}")]
    Classifier(#[from] ClassifierError),

    // --- Retrieval errors ---
    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Pipeline deadline ---
    #[error("Chat pipeline timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum RetrievalError {
    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),

    #[error("Index query failed: {0}")]
    QueryFailed(String),

    #[error("Index unavailable: {0}")]
    Unavailable(String),

    #[error("Embedding dimension mismatch: index has {expected}, query has {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

#[derive(Debug, Clone, Error)]
pub enum ClassifierError {
    #[error("Image could not be decoded: {0}")]
    InvalidImage(String),

    #[error("Model inference failed: {0}")]
    Inference(String),

    #[error("Unexpected model output: {0}")]
    MalformedOutput(String),

    #[error("Classifier unavailable: {0}")]
    Unavailable(String),
}

impl ClassifierError {
    /// Whether the failure was caused by the submitted bytes rather than the model.
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::InvalidImage(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn retrieval_error_converts_into_top_level() {
        let err: Error = RetrievalError::DimensionMismatch {
            expected: 384,
            actual: 768,
        }
        .into();
        assert!(matches!(err, Error::Retrieval(_)));
        assert!(err.to_string().contains("384"));
    }

    #[test]
    fn only_invalid_image_is_an_input_error() {
        assert!(ClassifierError::InvalidImage("truncated png".into()).is_input_error());
        assert!(!ClassifierError::Inference("oom".into()).is_input_error());
        assert!(!ClassifierError::MalformedOutput("3 scores".into()).is_input_error());
    }
}
