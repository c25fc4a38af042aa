//! `dermassist ingest`: chunk, embed and index reference documents.

use dermassist_knowledge::Ingestor;
use std::path::{Path, PathBuf};

const DOCUMENT_EXTENSIONS: &[&str] = &["md", "markdown", "txt"];

pub async fn run(paths: &[PathBuf]) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;

    let files = collect_documents(paths)?;
    if files.is_empty() {
        return Err("No .md or .txt documents found in the given paths".into());
    }

    let providers = dermassist_providers::router::build_from_config(&config);
    let embedder = providers
        .get(&config.retrieval.embedding_provider)
        .ok_or_else(|| {
            format!(
                "Embedding provider '{}' is not configured",
                config.retrieval.embedding_provider
            )
        })?;
    let index = dermassist_gateway::bootstrap::build_index(&config)?;

    let ingestor = Ingestor::new(embedder, config.retrieval.embedding_model.clone(), index)
        .with_chunking(config.retrieval.chunk_size, config.retrieval.chunk_overlap);

    println!(
        "Indexing {} document(s) into {} ({} via {})",
        files.len(),
        config.retrieval.backend,
        config.retrieval.embedding_model,
        config.retrieval.embedding_provider
    );

    let mut total = 0;
    for file in &files {
        let chunks = ingestor.ingest_file(file).await?;
        println!("   {:>5} chunks  {}", chunks, file.display());
        total += chunks;
    }
    println!("   {total:>5} chunks total");

    Ok(())
}

/// Expand directories (one level) into their document files, sorted.
fn collect_documents(paths: &[PathBuf]) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut found: Vec<PathBuf> = std::fs::read_dir(path)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && is_document(p))
                .collect();
            found.sort();
            files.extend(found);
        } else if path.is_file() {
            files.push(path.clone());
        } else {
            return Err(format!("{} does not exist", path.display()).into());
        }
    }
    Ok(files)
}

fn is_document(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| DOCUMENT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}
