//! `dermassist config`: configuration management commands.

use clap::Subcommand;
use dermassist_config::AppConfig;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration (secrets redacted)
    Show,
    /// Print the config file path
    Path,
    /// Load and validate the configuration
    Validate,
    /// Print the default config file
    Default,
}

pub fn run(action: ConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigAction::Show => show(),
        ConfigAction::Path => {
            println!("{}", config_path().display());
            Ok(())
        }
        ConfigAction::Validate => validate(),
        ConfigAction::Default => {
            println!("{}", AppConfig::default_toml());
            Ok(())
        }
    }
}

fn config_path() -> std::path::PathBuf {
    AppConfig::config_dir().join("config.toml")
}

fn show() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = super::load_config()?;
    if config.api_key.is_some() {
        config.api_key = Some("***".into());
    }
    if config.retrieval.pinecone_api_key.is_some() {
        config.retrieval.pinecone_api_key = Some("***".into());
    }
    for provider in config.providers.values_mut() {
        if provider.api_key.is_some() {
            provider.api_key = Some("***".into());
        }
    }
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating {}", config_path().display());

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            println!("   Config error: {e}");
            return Err(e.into());
        }
    };
    println!("   Config parsed successfully");

    let mut warnings = Vec::new();
    if !config.has_api_key() {
        warnings.push("No API key set (set GROQ_API_KEY or DERMASSIST_API_KEY)".to_string());
    }
    if config.retrieval.backend == "memory"
        && !std::path::Path::new(&config.retrieval.index_path).exists()
    {
        warnings.push(format!(
            "Knowledge index {} does not exist yet (run `dermassist ingest`)",
            config.retrieval.index_path
        ));
    }
    if config.retrieval.backend == "pinecone" && config.retrieval.pinecone_host.is_none() {
        warnings.push("retrieval.pinecone_host is not set".to_string());
    }

    if warnings.is_empty() {
        println!("   All checks passed");
    } else {
        println!();
        for w in &warnings {
            println!("   warning: {w}");
        }
    }

    println!();
    println!("   Provider:   {}", config.default_provider);
    println!("   Model:      {}", config.default_model);
    println!("   Gateway:    {}:{}", config.gateway.host, config.gateway.port);
    println!("   Classifier: {}", config.classifier.endpoint);
    println!("   Knowledge:  {} (top {})", config.retrieval.backend, config.retrieval.top_k);

    Ok(())
}
