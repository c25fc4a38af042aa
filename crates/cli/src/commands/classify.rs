//! `dermassist classify`: classify one image file and print the result.

use dermassist_core::classification::Classifier;
use std::path::Path;

pub async fn run(image: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;
    let bytes = tokio::fs::read(image)
        .await
        .map_err(|e| format!("Failed to read {}: {e}", image.display()))?;

    let classifier = dermassist_gateway::bootstrap::build_classifier(&config);
    let result = classifier.classify(&bytes).await?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
