//! `syllabot init`: write the default config if none exists.

use syllabot_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("Created config directory: {}", config_dir.display());
    }

    if config_path.exists() {
        println!("Config already exists at: {}", config_path.display());
        println!("Edit it manually or delete it and re-run init.");
        return Ok(());
    }

    std::fs::write(&config_path, AppConfig::default_toml())?;
    println!("Created config.toml at: {}", config_path.display());
    println!();
    println!("Next steps:");
    println!("  1. Set OPENAI_API_KEY (or api_key in the config)");
    println!("  2. Point [retrieval].url at your Qdrant instance");
    println!("  3. Run: syllabot ask --semester 1 --subject aoa --unit 1 \"What is an algorithm?\"");

    Ok(())
}
