//! DermAssist CLI, the main entry point.
//!
//! Commands:
//! - `serve`     Start the HTTP API (`/predict`, `/chat`, `/health`)
//! - `classify`  Classify a skin image file
//! - `chat`      Talk to the assistant from the terminal
//! - `ingest`    Add reference documents to the knowledge index
//! - `config`    Inspect configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "dermassist",
    about = "DermAssist: skin image classification and grounded dermatology chat",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "DERMASSIST_LOG_JSON")]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,

        /// Override the bind address
        #[arg(long)]
        host: Option<String>,
    },

    /// Classify a skin image
    Classify {
        /// Path to the image (PNG, JPEG, WebP or BMP)
        image: PathBuf,
    },

    /// Chat with the assistant
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Classify this image first and discuss the result
        #[arg(short, long)]
        image: Option<PathBuf>,
    },

    /// Chunk, embed and index reference documents
    Ingest {
        /// Text or markdown files, or directories containing them
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config_cmd::ConfigAction,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }

    match cli.command {
        Commands::Serve { port, host } => commands::serve::run(port, host).await?,
        Commands::Classify { image } => commands::classify::run(&image).await?,
        Commands::Chat { message, image } => commands::chat::run(message, image).await?,
        Commands::Ingest { paths } => commands::ingest::run(&paths).await?,
        Commands::Config { action } => commands::config_cmd::run(action)?,
    }

    Ok(())
}
