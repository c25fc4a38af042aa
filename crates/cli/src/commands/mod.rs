pub mod chat;
pub mod classify;
pub mod config_cmd;
pub mod ingest;
pub mod serve;

use dermassist_config::AppConfig;

/// Load configuration with a readable error.
pub fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    Ok(AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?)
}
