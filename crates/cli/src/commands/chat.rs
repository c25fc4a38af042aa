//! `dermassist chat`: single-message or interactive chat in the terminal.

use dermassist_core::classification::{ClassificationResult, Classifier};
use dermassist_core::message::SessionId;
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run(
    message: Option<String>,
    image: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;

    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables (or put it in .env):");
        eprintln!("    GROQ_API_KEY=gsk_...        (default provider)");
        eprintln!("    OPENAI_API_KEY=sk-...");
        eprintln!("    DERMASSIST_API_KEY=...      (generic)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", dermassist_config::AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let assistant = dermassist_gateway::bootstrap::build_assistant(&config)?;
    let session = SessionId::new();

    let classification: Option<ClassificationResult> = match image {
        Some(path) => {
            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
            let classifier = dermassist_gateway::bootstrap::build_classifier(&config);
            let result = classifier.classify(&bytes).await?;
            println!(
                "  Analysis:  {} ({})",
                result.label(),
                result.confidence_percent()
            );
            Some(result)
        }
        None => None,
    };

    if let Some(msg) = message {
        eprint!("  Thinking...");
        let outcome = assistant.handle_chat(&session, &msg, classification).await?;
        eprint!("\r              \r");
        println!("{}", outcome.reply);
        return Ok(());
    }

    println!();
    println!("  DermAssist: interactive mode");
    println!();
    println!("  Provider:  {}", config.default_provider);
    println!("  Model:     {}", config.default_model);
    println!("  Directive: {}", assistant.directive().version());
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or Ctrl+C to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    print!("  You > ");
    std::io::stdout().flush()?;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line == "exit" || line == "quit" {
            break;
        }
        if line.is_empty() {
            print!("  You > ");
            std::io::stdout().flush()?;
            continue;
        }

        eprint!("  ...");
        match assistant
            .handle_chat(&session, line, classification.clone())
            .await
        {
            Ok(outcome) => {
                eprint!("\r     \r");
                println!();
                for reply_line in outcome.reply.lines() {
                    println!("  Assistant > {reply_line}");
                }
                println!();
            }
            Err(e) => {
                eprint!("\r     \r");
                eprintln!("  [Error] {e}");
                println!();
            }
        }

        print!("  You > ");
        std::io::stdout().flush()?;
    }

    println!();
    println!("  Goodbye!");
    println!();

    Ok(())
}
