//! Loading the TOML agent configuration.

use std::path::Path;

use anyhow::Context;
use yagent_agents::AgentConfig;

/// Environment variable consulted when the file has no API key.
pub const API_KEY_ENV: &str = "YANDEX_API_KEY";

/// Read, complete and validate the configuration at `path`.
pub async fn load(path: &Path) -> anyhow::Result<AgentConfig> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config = parse(&content, std::env::var(API_KEY_ENV).ok())
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(config)
}

/// Parse a configuration, filling in `fallback_api_key` when the file
/// carries none.
pub fn parse(content: &str, fallback_api_key: Option<String>) -> anyhow::Result<AgentConfig> {
    let mut config: AgentConfig = toml::from_str(content)?;
    if config.credentials.api_key.trim().is_empty() {
        if let Some(key) = fallback_api_key {
            config.credentials.api_key = key;
        }
    }
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use yagent_embeddings::CachePolicy;

    const CONFIG: &str = r#"
[credentials]
folder_id = "b1gfolder"

[classifier]
labels = ["sports", "politics"]
min_similarity = 0.75

[semantic_search]
candidate_documents = ["rust systems programming", "python data science"]
max_results = 1
cache = { kind = "lru", capacity = 64 }

[semantic_search.batch]
batch_size = 5
pause = 250

[completion]
model_name = "yandexgpt"
"#;

    #[test]
    fn test_parse_full_config() {
        let config = parse(CONFIG, Some("env-key".to_string())).unwrap();

        assert_eq!(config.credentials.api_key, "env-key");
        assert_eq!(config.credentials.folder_id, "b1gfolder");

        let classifier = config.classifier.unwrap();
        assert_eq!(classifier.labels, vec!["sports", "politics"]);
        assert_eq!(classifier.min_similarity, 0.75);

        let search = config.semantic_search.unwrap();
        assert_eq!(search.max_results, 1);
        assert_eq!(search.cache, CachePolicy::Lru { capacity: 64 });
        assert_eq!(search.batch.batch_size, 5);
        assert_eq!(search.batch.pause, std::time::Duration::from_millis(250));

        let completion = config.completion.unwrap();
        assert_eq!(completion.model_name, "yandexgpt");
        assert_eq!(completion.model_version, "latest");
    }

    #[test]
    fn test_file_key_wins_over_environment() {
        let content = "[credentials]\napi_key = \"file-key\"\nfolder_id = \"f\"\n";
        let config = parse(content, Some("env-key".to_string())).unwrap();
        assert_eq!(config.credentials.api_key, "file-key");
    }

    #[test]
    fn test_missing_key_is_rejected() {
        let error = parse("[credentials]\nfolder_id = \"f\"\n", None).unwrap_err();
        assert!(error.to_string().contains("api_key is required"));
    }

    #[test]
    fn test_invalid_agent_settings_are_rejected() {
        let content = r#"
[credentials]
api_key = "k"
folder_id = "f"

[completion]
temperature = 2.0
"#;
        let error = parse(content, None).unwrap_err();
        assert!(error.to_string().contains("temperature"));
    }

    #[tokio::test]
    async fn test_load_reports_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let error = load(&dir.path().join("absent.toml")).await.unwrap_err();
        assert!(error.to_string().contains("failed to read config"));
    }
}
