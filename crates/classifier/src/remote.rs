//! Classifier backed by a model server over HTTP.
//!
//! Speaks the TensorFlow Serving REST predict API:
//!
//! ```text
//! POST /v1/models/<name>:predict
//! {"instances": [<height × width × 3 tensor>]}
//!
//! 200 {"predictions": [[p_acne, p_ak, p_bcc, p_eczema, p_rosacea]]}
//! ```
//!
//! Any server that accepts that shape (TF Serving, a KServe v1 endpoint,
//! a small ONNX wrapper) can host the model.

use async_trait::async_trait;
use dermassist_config::ClassifierConfig;
use dermassist_core::classification::{ClassificationResult, Classifier};
use dermassist_core::error::ClassifierError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::preprocess::preprocess;

pub struct RemoteClassifier {
    endpoint: String,
    image_size: u32,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct PredictRequest {
    instances: Vec<Vec<Vec<[f32; 3]>>>,
}

#[derive(Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Option<Vec<Vec<f64>>>,
    #[serde(default)]
    error: Option<String>,
}

impl RemoteClassifier {
    pub fn new(endpoint: impl Into<String>, image_size: u32, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            endpoint: endpoint.into(),
            image_size,
            client,
        }
    }

    pub fn from_config(config: &ClassifierConfig) -> Self {
        Self::new(
            config.endpoint.clone(),
            config.image_size,
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Turn a predict response body into a classification.
fn parse_predictions(body: &str) -> Result<ClassificationResult, ClassifierError> {
    let parsed: PredictResponse = serde_json::from_str(body)
        .map_err(|e| ClassifierError::MalformedOutput(format!("invalid response body: {e}")))?;

    if let Some(error) = parsed.error {
        return Err(ClassifierError::Inference(error));
    }

    let scores = parsed
        .predictions
        .and_then(|p| p.into_iter().next())
        .ok_or_else(|| ClassifierError::MalformedOutput("response has no predictions".into()))?;

    ClassificationResult::from_scores(&scores)
}

#[async_trait]
impl Classifier for RemoteClassifier {
    fn name(&self) -> &str {
        "tf-serving"
    }

    async fn classify(&self, image: &[u8]) -> Result<ClassificationResult, ClassifierError> {
        let bytes = image.to_vec();
        let size = self.image_size;
        let tensor = tokio::task::spawn_blocking(move || preprocess(&bytes, size))
            .await
            .map_err(|e| ClassifierError::Inference(format!("preprocessing task failed: {e}")))??;

        let request = PredictRequest {
            instances: vec![tensor.to_rows()],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| ClassifierError::Unavailable(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ClassifierError::Unavailable(e.to_string()))?;

        if !status.is_success() {
            warn!(status = status.as_u16(), body = %body, "Model server returned error");
            return Err(ClassifierError::Inference(format!(
                "model server returned {status}"
            )));
        }

        let result = parse_predictions(&body)?;
        debug!(
            disease = %result.label(),
            confidence = result.confidence(),
            "Image classified"
        );
        Ok(result)
    }
}
