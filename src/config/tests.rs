use super::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[test]
    fn config_file_persistence() {
        let temp_dir = TempDir::new().expect("should create TempDir successfully");
        let config_path = temp_dir.path().join("config.toml");

        let original_config = Config {
            provider: ProviderConfig {
                base_url: "http://localhost:8080/v1/".to_string(),
                api_key_env: "LOCAL_KEY".to_string(),
                timeout_seconds: 10,
            },
            embedding: EmbeddingConfig {
                backend: EmbeddingBackend::Zero,
                model: "local-embedder".to_string(),
                dimension: 384,
            },
            base_dir: PathBuf::new(),
            ..Config::default()
        };

        let toml_content = toml::to_string_pretty(&original_config)
            .expect("config should convert to toml string successfully");
        fs::write(&config_path, toml_content).expect("should write to config_path successfully");

        let content =
            fs::read_to_string(&config_path).expect("should read from config_path successfully");
        let loaded_config: Config = toml::from_str(&content).expect("should parse toml correctly");

        assert_eq!(original_config, loaded_config);
    }

    #[test]
    fn invalid_toml_handling() {
        let invalid_toml = r#"
            [provider
            base_url = "http://localhost"
            timeout_seconds = "soon"
        "#;

        let result: Result<Config, toml::de::Error> = toml::from_str(invalid_toml);
        assert!(result.is_err());
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let toml_str = r#"
            [embedding]
            backend = "magic"
        "#;

        let result: Result<Config, toml::de::Error> = toml::from_str(toml_str);
        assert!(result.is_err());
    }

    #[test]
    fn empty_file_is_all_defaults() {
        let config: Config = toml::from_str("").expect("empty toml should parse");
        assert_eq!(config.provider, ProviderConfig::default());
        assert_eq!(config.embedding, EmbeddingConfig::default());
        assert_eq!(config.completion, CompletionConfig::default());
        assert_eq!(config.retrieval, RetrievalConfig::default());
    }

    #[test]
    fn error_display_messages() {
        let errors = vec![
            ConfigError::InvalidUrl("invalid-url".to_string()),
            ConfigError::InvalidTimeout(0),
            ConfigError::MissingApiKey("GROQ_API_KEY".to_string()),
            ConfigError::InvalidModel(String::new()),
            ConfigError::OverlapTooLarge(80, 40),
        ];

        for error in errors {
            let message = format!("{error}");
            assert!(!message.is_empty());
            assert!(message.len() > 10);
        }
    }
}
