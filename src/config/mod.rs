// Configuration management module
// TOML settings for the provider, embedding, completion, chunking and retrieval

pub mod interactive;
pub mod settings;

#[cfg(test)]
mod tests;

pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    CompletionConfig, Config, ConfigError, EmbeddingBackend, EmbeddingConfig, ProviderConfig,
    RetrievalConfig,
};

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::default_dir()
}
