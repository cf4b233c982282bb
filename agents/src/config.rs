//! Configuration for the agents.
//!
//! Every config validates itself before an agent is built, so that no
//! remote call is ever made with a bad setting.

use serde::{Deserialize, Serialize};
use yagent_embeddings::{BatchPolicy, CachePolicy};
use yagent_operations::CompletionParams;

use crate::error::{AgentError, Result};

/// Top-level configuration file layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Cloud credentials shared by all agents.
    pub credentials: Credentials,

    /// Embedding classifier settings.
    pub classifier: Option<ClassifierConfig>,

    /// Semantic search settings.
    pub semantic_search: Option<SemanticSearchConfig>,

    /// Async completion settings.
    pub completion: Option<CompletionConfig>,
}

impl AgentConfig {
    /// Validate the credentials and every configured agent.
    pub fn validate(&self) -> Result<()> {
        self.credentials.validate()?;
        if let Some(classifier) = &self.classifier {
            classifier.validate()?;
        }
        if let Some(search) = &self.semantic_search {
            search.validate()?;
        }
        if let Some(completion) = &self.completion {
            completion.validate()?;
        }
        Ok(())
    }
}

/// Yandex Cloud credentials.
///
/// The key is passed through to the API untouched.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    /// API key.
    pub api_key: String,

    /// Cloud folder id.
    pub folder_id: String,
}

impl Credentials {
    /// Create credentials.
    pub fn new(api_key: impl Into<String>, folder_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            folder_id: folder_id.into(),
        }
    }

    /// Both fields are required.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();
        require(&mut errors, !self.api_key.trim().is_empty(), "api_key is required");
        require(&mut errors, !self.folder_id.trim().is_empty(), "folder_id is required");
        finish(errors)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("folder_id", &self.folder_id)
            .finish()
    }
}

/// Configuration for the embedding classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Labels to classify into.
    pub labels: Vec<String>,

    /// Minimum cosine similarity for a label to be selected (0.0 to 1.0).
    pub min_similarity: f32,

    /// Embedding model name or full model URI.
    pub model_uri: String,

    /// Capacity policy of the label vector store.
    pub cache: CachePolicy,

    /// Batching of first-time label embeddings.
    pub batch: BatchPolicy,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            labels: Vec::new(),
            min_similarity: 0.7,
            model_uri: "text-search-query".to_string(),
            cache: CachePolicy::default(),
            batch: BatchPolicy::default(),
        }
    }
}

impl ClassifierConfig {
    /// Check required fields and numeric ranges.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();
        require(&mut errors, !self.labels.is_empty(), "labels is required");
        require(
            &mut errors,
            (0.0..=1.0).contains(&self.min_similarity),
            "min_similarity must be between 0 and 1",
        );
        require(&mut errors, !self.model_uri.trim().is_empty(), "model_uri is required");
        require(
            &mut errors,
            cache_holds(self.cache, self.labels.len()),
            "cache capacity must hold every label",
        );
        finish(errors)
    }
}

/// Configuration for semantic search.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SemanticSearchConfig {
    /// Documents to search.
    pub candidate_documents: Vec<String>,

    /// Minimum cosine similarity for a document to match (0.0 to 1.0).
    pub min_similarity: f32,

    /// Maximum number of matches.
    pub max_results: usize,

    /// Embedding model name or full model URI.
    pub model_uri: String,

    /// Capacity policy of the document vector store.
    pub cache: CachePolicy,

    /// Batching of first-time document embeddings.
    pub batch: BatchPolicy,
}

impl Default for SemanticSearchConfig {
    fn default() -> Self {
        Self {
            candidate_documents: vec![
                "ai artificial intelligence and machine learning".to_string(),
                "radio wireless communication technology".to_string(),
                "iot internet of things and connected devices".to_string(),
            ],
            min_similarity: 0.7,
            max_results: 5,
            model_uri: "text-search-doc".to_string(),
            cache: CachePolicy::default(),
            batch: BatchPolicy::default(),
        }
    }
}

impl SemanticSearchConfig {
    /// Check required fields and numeric ranges.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();
        require(
            &mut errors,
            !self.candidate_documents.is_empty(),
            "candidate_documents is required",
        );
        require(
            &mut errors,
            (0.0..=1.0).contains(&self.min_similarity),
            "min_similarity must be between 0 and 1",
        );
        require(
            &mut errors,
            self.max_results > 0,
            "max_results must be a positive number",
        );
        require(&mut errors, !self.model_uri.trim().is_empty(), "model_uri is required");
        require(
            &mut errors,
            cache_holds(self.cache, self.candidate_documents.len()),
            "cache capacity must hold every candidate document",
        );
        finish(errors)
    }
}

/// Configuration for async completions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// Model name, e.g. `yandexgpt-lite`.
    pub model_name: String,

    /// `latest`, `rc` or `deprecated`.
    pub model_version: String,

    /// System prompt sent with every request.
    pub system_prompt: String,

    /// Sampling temperature (0.0 to 1.0).
    pub temperature: f32,

    /// Maximum number of generated tokens.
    pub max_tokens: u32,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model_name: "yandexgpt-lite".to_string(),
            model_version: "latest".to_string(),
            system_prompt: "Выдели основные мысли из статьи.".to_string(),
            temperature: 0.1,
            max_tokens: 2000,
        }
    }
}

impl CompletionConfig {
    /// Check required fields and numeric ranges.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();
        require(&mut errors, !self.model_name.trim().is_empty(), "model_name is required");
        require(
            &mut errors,
            !self.model_version.trim().is_empty(),
            "model_version is required",
        );
        require(
            &mut errors,
            !self.system_prompt.trim().is_empty(),
            "system_prompt is required",
        );
        require(
            &mut errors,
            (0.0..=1.0).contains(&self.temperature),
            "temperature must be between 0 and 1",
        );
        require(
            &mut errors,
            self.max_tokens > 0,
            "max_tokens must be a positive number",
        );
        finish(errors)
    }

    /// Sampling parameters for the provider.
    pub fn params(&self) -> CompletionParams {
        CompletionParams {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

/// Whether a store with `policy` keeps `candidates` vectors at once.
fn cache_holds(policy: CachePolicy, candidates: usize) -> bool {
    match policy {
        CachePolicy::Unbounded => true,
        CachePolicy::Lru { capacity } => capacity > 0 && capacity >= candidates,
    }
}

fn require(errors: &mut Vec<&'static str>, ok: bool, message: &'static str) {
    if !ok {
        errors.push(message);
    }
}

fn finish(errors: Vec<&'static str>) -> Result<()> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AgentError::Validation(errors.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn validation_message(result: Result<()>) -> String {
        match result {
            Err(AgentError::Validation(message)) => message,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_defaults_match_documented_values() {
        let classifier = ClassifierConfig::default();
        assert_eq!(classifier.min_similarity, 0.7);
        assert_eq!(classifier.model_uri, "text-search-query");

        let search = SemanticSearchConfig::default();
        assert_eq!(search.max_results, 5);
        assert_eq!(search.candidate_documents.len(), 3);

        let completion = CompletionConfig::default();
        assert_eq!(completion.params(), CompletionParams::default());
        assert!(completion.validate().is_ok());
    }

    #[test]
    fn test_credentials_required() {
        let message = validation_message(Credentials::default().validate());
        assert_eq!(message, "api_key is required; folder_id is required");
        assert!(Credentials::new("key", "folder").validate().is_ok());
    }

    #[test]
    fn test_classifier_ranges() {
        let config = ClassifierConfig {
            labels: vec!["sports".to_string()],
            min_similarity: 1.5,
            ..Default::default()
        };
        let message = validation_message(config.validate());
        assert_eq!(message, "min_similarity must be between 0 and 1");

        let empty = ClassifierConfig::default();
        assert!(validation_message(empty.validate()).contains("labels is required"));
    }

    #[test]
    fn test_search_max_results_positive() {
        let config = SemanticSearchConfig {
            max_results: 0,
            ..Default::default()
        };
        assert_eq!(
            validation_message(config.validate()),
            "max_results must be a positive number"
        );
    }

    #[test]
    fn test_completion_ranges() {
        let config = CompletionConfig {
            temperature: -0.1,
            max_tokens: 0,
            ..Default::default()
        };
        assert_eq!(
            validation_message(config.validate()),
            "temperature must be between 0 and 1; max_tokens must be a positive number"
        );
    }

    #[test]
    fn test_lru_cache_must_hold_every_candidate() {
        let classifier = ClassifierConfig {
            labels: vec!["a".to_string(), "b".to_string(), "c".to_string()],
            cache: CachePolicy::Lru { capacity: 2 },
            ..Default::default()
        };
        assert_eq!(
            validation_message(classifier.validate()),
            "cache capacity must hold every label"
        );

        let search = SemanticSearchConfig {
            cache: CachePolicy::Lru { capacity: 1 },
            ..Default::default()
        };
        assert_eq!(
            validation_message(search.validate()),
            "cache capacity must hold every candidate document"
        );

        let sized = SemanticSearchConfig {
            cache: CachePolicy::Lru { capacity: 3 },
            ..Default::default()
        };
        assert!(sized.validate().is_ok());
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let rendered = format!("{:?}", Credentials::new("super-secret", "folder"));
        assert!(!rendered.contains("super-secret"));
    }

    #[test]
    fn test_parse_partial_config() {
        let config: AgentConfig = serde_json::from_value(serde_json::json!({
            "credentials": { "api_key": "k", "folder_id": "f" },
            "classifier": { "labels": ["sports", "politics"], "min_similarity": 0.5 },
            "semantic_search": { "cache": { "kind": "lru", "capacity": 100 } },
        }))
        .unwrap();

        assert!(config.validate().is_ok());
        let classifier = config.classifier.unwrap();
        assert_eq!(classifier.labels, vec!["sports", "politics"]);
        assert_eq!(classifier.model_uri, "text-search-query");
        assert_eq!(
            config.semantic_search.unwrap().cache,
            CachePolicy::Lru { capacity: 100 }
        );
        assert!(config.completion.is_none());
    }
}
