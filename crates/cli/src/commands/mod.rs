pub mod ask;
pub mod init;
pub mod serve;
pub mod threads;

use syllabot_config::AppConfig;

pub(crate) fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    tracing::debug!(?config, "Loaded configuration");
    Ok(config)
}
