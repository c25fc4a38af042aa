//! Request handlers for `/predict` and `/chat`.

use axum::{
    extract::{Multipart, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    response::Json,
};
use dermassist_assistant::FALLBACK_REPLY;
use dermassist_core::classification::ClassificationResult;
use dermassist_core::error::Error;
use dermassist_core::message::SessionId;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::{SESSION_HEADER, SharedState};

// ── DTOs ──────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

#[derive(Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
    /// The caller's latest classification, re-sent on every turn.
    #[serde(default)]
    pub prediction: Option<ClassificationResult>,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Serialize)]
pub struct ChatResponse {
    pub reply: String,
    pub session_id: SessionId,
}

// ── Handlers ──────────────────────────────────────────────────────────────

/// `POST /predict`: multipart upload in field `image` (or `file`).
pub async fn predict_handler(
    State(state): State<SharedState>,
    mut multipart: Multipart,
) -> Result<Json<ClassificationResult>, ApiError> {
    let mut image: Option<(Option<String>, Vec<u8>)> = None;
    let mut file: Option<(Option<String>, Vec<u8>)> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        api_error(
            StatusCode::BAD_REQUEST,
            format!("Failed to read upload: {}", e.body_text()),
        )
    })? {
        let name = field.name().unwrap_or("").to_string();
        if name != "image" && name != "file" {
            continue;
        }

        let filename = field.file_name().map(str::to_string);
        let bytes = field.bytes().await.map_err(|e| {
            api_error(
                StatusCode::BAD_REQUEST,
                format!("Failed to read upload: {}", e.body_text()),
            )
        })?;

        let slot = if name == "image" { &mut image } else { &mut file };
        slot.get_or_insert((filename, bytes.to_vec()));
    }

    let (filename, bytes) = image
        .or(file)
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "No image file provided"))?;

    if filename.as_deref() == Some("") || bytes.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "No image selected"));
    }

    info!(
        filename = filename.as_deref().unwrap_or(""),
        bytes = bytes.len(),
        "Prediction request"
    );

    match state.classifier.classify(&bytes).await {
        Ok(result) => {
            info!(
                label = %result.label(),
                confidence = result.confidence(),
                "Prediction complete"
            );
            Ok(Json(result))
        }
        Err(e) if e.is_input_error() => {
            warn!(error = %e, "Rejected undecodable image");
            Err(api_error(StatusCode::BAD_REQUEST, "Invalid image file"))
        }
        Err(e) => {
            error!(classifier = %state.classifier.name(), error = %e, "Prediction failed");
            Err(api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Prediction failed",
            ))
        }
    }
}

/// `POST /chat`: one turn in the caller's session.
///
/// The session id comes from the body, then the `X-Session-Id` header; a
/// fresh one is issued when neither is present.
pub async fn chat_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(payload) = payload.map_err(|rejection| {
        warn!(error = %rejection.body_text(), "Malformed chat request");
        api_error(StatusCode::BAD_REQUEST, "Invalid request body")
    })?;

    let message = payload
        .message
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "No message provided"))?;

    let session_id = payload
        .session_id
        .as_deref()
        .and_then(SessionId::parse)
        .or_else(|| {
            headers
                .get(SESSION_HEADER)
                .and_then(|v| v.to_str().ok())
                .and_then(SessionId::parse)
        })
        .unwrap_or_default();

    info!(
        session = %session_id,
        message_len = message.len(),
        classified = payload.prediction.is_some(),
        "Chat request"
    );

    match state
        .assistant
        .handle_chat(&session_id, &message, payload.prediction)
        .await
    {
        Ok(outcome) => Ok(Json(ChatResponse {
            reply: outcome.reply,
            session_id: outcome.session_id,
        })),
        Err(Error::Input(msg)) => Err(api_error(StatusCode::BAD_REQUEST, msg)),
        Err(e) => {
            error!(session = %session_id, error = %e, "Chat turn failed");
            Ok(Json(ChatResponse {
                reply: FALLBACK_REPLY.to_string(),
                session_id,
            }))
        }
    }
}

// ── Test support ──────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod test_support {
    use crate::{AppState, SharedState};
    use async_trait::async_trait;
    use dermassist_assistant::{Assistant, Generator};
    use dermassist_core::classification::{ClassificationResult, Classifier, DiseaseLabel};
    use dermassist_core::error::{ClassifierError, ProviderError, RetrievalError};
    use dermassist_core::knowledge::{Retriever, Snippet};
    use dermassist_core::message::Message;
    use dermassist_core::provider::{Provider, ProviderRequest, ProviderResponse};
    use std::sync::Arc;

    /// Returns a fixed classification, or an error for the magic payloads.
    pub struct MockClassifier;

    #[async_trait]
    impl Classifier for MockClassifier {
        fn name(&self) -> &str {
            "mock"
        }

        async fn classify(&self, image: &[u8]) -> Result<ClassificationResult, ClassifierError> {
            match image {
                b"garbage" => Err(ClassifierError::InvalidImage("unknown format".into())),
                b"crash" => Err(ClassifierError::Inference("tensor shape mismatch".into())),
                _ => Ok(ClassificationResult::new(
                    DiseaseLabel::Acne,
                    0.87,
                    "Common inflammatory skin condition",
                )
                .unwrap()),
            }
        }
    }

    /// Answers with a fixed text, or fails when `text` is `None`.
    pub struct FixedProvider(pub Option<&'static str>);

    #[async_trait]
    impl Provider for FixedProvider {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            match self.0 {
                Some(text) => Ok(ProviderResponse {
                    message: Message::assistant(text),
                    usage: None,
                    model: "mock-model".into(),
                }),
                None => Err(ProviderError::ApiError {
                    status_code: 503,
                    message: "overloaded".into(),
                }),
            }
        }
    }

    pub struct NoSnippets;

    #[async_trait]
    impl Retriever for NoSnippets {
        fn name(&self) -> &str {
            "none"
        }

        async fn retrieve(&self, _query: &str, _k: usize) -> Result<Vec<Snippet>, RetrievalError> {
            Ok(vec![])
        }
    }

    pub fn state_with(answer: Option<&'static str>) -> SharedState {
        let generator = Generator::new(Arc::new(FixedProvider(answer)), "mock-model");
        Arc::new(AppState {
            classifier: Arc::new(MockClassifier),
            assistant: Arc::new(Assistant::new(Arc::new(NoSnippets), generator)),
        })
    }

    pub fn test_state() -> SharedState {
        state_with(Some("Hello! How can I help with your skin today?"))
    }

    /// A multipart body with one file field.
    pub fn multipart_body(field: &str, filename: &str, bytes: &[u8]) -> (String, Vec<u8>) {
        let boundary = "dermassist-test-boundary";
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
        (format!("multipart/form-data; boundary={boundary}"), body)
    }
}
