
use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};
use std::path::Path;

use super::{Config, ConfigError, EmbeddingBackend, ProviderConfig};

#[inline]
pub fn run_interactive_config(config_dir: &Path) -> Result<()> {
    eprintln!("{}", style("🔧 Second Brain Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config(config_dir)?;

    eprintln!("{}", style("Provider Configuration").bold().yellow());
    eprintln!("Configure the API used for embeddings and answer synthesis.");
    eprintln!();

    configure_provider(&mut config.provider)?;
    configure_models(&mut config)?;

    if config.embedding.backend == EmbeddingBackend::Remote {
        eprintln!();
        eprintln!("{}", style("Testing configuration...").yellow());

        if test_provider_connection(&config.provider) {
            eprintln!("{}", style("✓ Provider reachable!").green());
        } else {
            eprintln!(
                "{}",
                style("⚠ Warning: Could not reach the provider").yellow()
            );
            eprintln!("You can continue, but ingestion will fail until it is reachable.");
        }

        if let Err(e) = config.provider.api_key() {
            eprintln!("{}", style(format!("⚠ Warning: {}", e)).yellow());
        }
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config(config: &Config) {
    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Provider Settings:").bold().yellow());
    match config.provider.base_url() {
        Ok(url) => eprintln!("  Base URL: {}", style(url).cyan()),
        Err(e) => eprintln!("  Base URL: {} ({})", style("Invalid").red(), e),
    }
    eprintln!(
        "  API key variable: {} ({})",
        style(&config.provider.api_key_env).cyan(),
        if config.provider.api_key().is_ok() {
            style("set").green()
        } else {
            style("not set").red()
        }
    );
    eprintln!(
        "  Timeout: {}s",
        style(config.provider.timeout_seconds).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Embedding Settings:").bold().yellow());
    eprintln!("  Backend: {}", style(config.embedding.backend).cyan());
    eprintln!("  Model: {}", style(&config.embedding.model).cyan());
    eprintln!("  Dimension: {}", style(config.embedding.dimension).cyan());

    eprintln!();
    eprintln!("{}", style("Completion Settings:").bold().yellow());
    eprintln!("  Model: {}", style(&config.completion.model).cyan());
    eprintln!("  Max tokens: {}", style(config.completion.max_tokens).cyan());
    eprintln!(
        "  Temperature: {}",
        style(config.completion.temperature).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Chunking:").bold().yellow());
    eprintln!(
        "  Window: {} words, overlap {}",
        style(config.chunking.window_size).cyan(),
        style(config.chunking.overlap).cyan()
    );
    eprintln!("  Default top_k: {}", style(config.retrieval.top_k).cyan());

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );
}

fn load_existing_config(config_dir: &Path) -> Result<Config> {
    Config::load(config_dir).map_or_else(
        |_| {
            eprintln!(
                "{}",
                style("No usable configuration found. Using defaults.").yellow()
            );
            Ok(Config {
                base_dir: config_dir.to_path_buf(),
                ..Config::default()
            })
        },
        |config| {
            eprintln!("{}", style("Found existing configuration.").green());
            Ok(config)
        },
    )
}

fn configure_provider(provider: &mut ProviderConfig) -> Result<()> {
    let base_url: String = Input::new()
        .with_prompt("Provider base URL")
        .default(provider.base_url.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let candidate = ProviderConfig {
                base_url: input.clone(),
                ..ProviderConfig::default()
            };
            candidate.base_url()?;
            Ok(())
        })
        .interact_text()?;

    let api_key_env: String = Input::new()
        .with_prompt("Environment variable holding the API key")
        .default(provider.api_key_env.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Variable name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let timeout_seconds: u64 = Input::new()
        .with_prompt("Request timeout (seconds)")
        .default(provider.timeout_seconds)
        .validate_with(|input: &u64| -> Result<(), &str> {
            if (1..=300).contains(input) {
                Ok(())
            } else {
                Err("Timeout must be between 1 and 300 seconds")
            }
        })
        .interact_text()?;

    provider.set_base_url(base_url)?;
    provider.set_api_key_env(api_key_env)?;
    provider.set_timeout_seconds(timeout_seconds)?;

    Ok(())
}

fn configure_models(config: &mut Config) -> Result<()> {
    let backends = &["remote", "zero"];
    let default_index = match config.embedding.backend {
        EmbeddingBackend::Remote => 0,
        EmbeddingBackend::Zero => 1,
    };

    let backend_index = Select::new()
        .with_prompt("Embedding backend")
        .default(default_index)
        .items(backends)
        .interact()?;

    config.embedding.backend = if backend_index == 0 {
        EmbeddingBackend::Remote
    } else {
        EmbeddingBackend::Zero
    };

    let embedding_model: String = Input::new()
        .with_prompt("Embedding model")
        .default(config.embedding.model.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let dimension: usize = Input::new()
        .with_prompt("Embedding dimension")
        .default(config.embedding.dimension)
        .validate_with(|input: &usize| -> Result<(), &str> {
            if (1..=16384).contains(input) {
                Ok(())
            } else {
                Err("Dimension must be between 1 and 16384")
            }
        })
        .interact_text()?;

    let completion_model: String = Input::new()
        .with_prompt("Completion model")
        .default(config.completion.model.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    config.embedding.set_model(embedding_model)?;
    config.embedding.set_dimension(dimension)?;
    config.completion.set_model(completion_model)?;

    Ok(())
}

fn test_provider_connection(provider: &ProviderConfig) -> bool {
    let Ok(url) = provider.base_url() else {
        return false;
    };

    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(std::time::Duration::from_secs(5)))
        .build()
        .into();

    match agent.get(url.as_str()).call() {
        Ok(_) => true,
        // Any HTTP answer means the host is up; the root path itself is rarely routable
        Err(ureq::Error::StatusCode(_)) => true,
        Err(_) => false,
    }
}
