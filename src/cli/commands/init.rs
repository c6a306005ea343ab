//! Init and Config commands.

use std::path::Path;

use anyhow::Context;

use crate::config::Settings;

/// Run init command - create configuration file.
pub fn run_init(config_path: Option<&Path>, force: bool) -> anyhow::Result<()> {
    let config_path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(Settings::default_path);
    let existed = config_path.exists();

    let path = Settings::init_config_file(&config_path, force)?;
    if existed {
        println!("Overwrote configuration at: {}", path.display());
    } else {
        println!("Created configuration file at: {}", path.display());
    }
    println!("Credentials are read from PINECONE_API_KEY, PINECONE_ENV, PINECONE_INDEX_NAME and OPENAI_API_KEY.");
    Ok(())
}

/// Run config command - display current configuration.
pub fn run_config(config: &Settings) -> anyhow::Result<()> {
    let toml_str = config.to_toml().context("Error displaying config")?;
    println!("Current Configuration:");
    println!("{}", "=".repeat(50));
    println!("{toml_str}");
    println!("{}", "=".repeat(50));
    println!(
        "Pinecone API key: {}",
        if config.store.api_key.is_some() { "set" } else { "not set" }
    );
    println!(
        "OpenAI API key:   {}",
        if config.embedding.api_key.is_some() { "set" } else { "not set" }
    );
    Ok(())
}
