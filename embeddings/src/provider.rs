//! Embedding providers.
//!
//! The matching engine only needs [`EmbeddingProvider`]; the Yandex
//! Foundation Models client is the production implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::Embedding;
use crate::error::{EmbeddingError, Result};

/// Default API host for Yandex Foundation Models.
pub const DEFAULT_BASE_URL: &str = "https://llm.api.cloud.yandex.net";

/// Request for generating an embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    /// Text to embed.
    pub text: String,

    /// Model to use (provider-specific).
    pub model: Option<String>,
}

impl EmbeddingRequest {
    /// Create a new embedding request.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            model: None,
        }
    }

    /// Set the model to use.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// Response from embedding generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    /// The generated embedding.
    pub embedding: Embedding,

    /// Model used to generate the embedding.
    pub model: String,

    /// Dimension of the embedding.
    pub dimension: usize,

    /// Token usage (if available).
    pub tokens_used: Option<u64>,
}

/// Trait for embedding providers.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Get the name of this provider.
    fn name(&self) -> &str;

    /// Get the default model for this provider.
    fn default_model(&self) -> &str;

    /// Generate an embedding for the given text.
    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse>;

    /// Check if the provider is available (API key set, etc.).
    fn is_available(&self) -> bool;
}

/// Yandex Foundation Models text embedding provider.
pub struct YandexEmbeddingProvider {
    /// API key, sent as `Api-Key`.
    api_key: Option<String>,

    /// Cloud folder the model is billed to.
    folder_id: String,

    /// API base URL.
    base_url: String,

    /// HTTP client.
    client: reqwest::Client,

    /// Default model name or full model URI.
    default_model: String,
}

impl YandexEmbeddingProvider {
    /// Create a new provider for the given folder.
    ///
    /// The API key is read from `YANDEX_API_KEY` unless set explicitly.
    pub fn new(folder_id: impl Into<String>) -> Self {
        Self {
            api_key: std::env::var("YANDEX_API_KEY").ok(),
            folder_id: folder_id.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            client: reqwest::Client::new(),
            default_model: "text-search-query".to_string(),
        }
    }

    /// Set the API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the default model, either a short name or a full URI.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Expand a model name into a model URI.
    ///
    /// Values that already contain a scheme are used as-is.
    pub fn model_uri(&self, model: &str) -> String {
        if model.contains("://") {
            model.to_string()
        } else {
            format!("emb://{}/{model}/latest", self.folder_id)
        }
    }
}

#[async_trait]
impl EmbeddingProvider for YandexEmbeddingProvider {
    fn name(&self) -> &str {
        "yandex"
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or(EmbeddingError::ProviderNotConfigured)?;

        let model_uri = self.model_uri(request.model.as_deref().unwrap_or(&self.default_model));

        debug!("Generating embedding with model: {model_uri}");

        let body = serde_json::json!({
            "modelUri": model_uri,
            "text": request.text,
        });

        let response = self
            .client
            .post(format!("{}/foundationModels/v1/textEmbedding", self.base_url))
            .header("Authorization", format!("Api-Key {api_key}"))
            .header("x-folder-id", &self.folder_id)
            .header("x-data-logging-enabled", "false")
            .json(&body)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);

            return Err(EmbeddingError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(EmbeddingError::ApiRequest(format!("{status}: {text}")));
        }

        let parsed: YandexEmbeddingResponse = serde_json::from_str(&text)
            .map_err(|e| EmbeddingError::InvalidResponse(format!("{e}: {text}")))?;

        let tokens_used = parsed.num_tokens.as_ref().and_then(token_count);
        let model = parsed.model_version.clone().unwrap_or(model_uri);

        let Some(embedding) = parsed.into_embedding() else {
            warn!("Embedding response without a vector: {text}");
            return Err(EmbeddingError::InvalidResponse(
                "no embedding in response".to_string(),
            ));
        };

        Ok(EmbeddingResponse {
            dimension: embedding.len(),
            embedding,
            model,
            tokens_used,
        })
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }
}

/// Yandex `textEmbedding` response.
///
/// The documented shape carries `embedding` at the top level; some
/// deployments wrap it as `embeddings[0].embedding`, which is accepted too.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct YandexEmbeddingResponse {
    #[serde(default)]
    embedding: Option<Vec<f32>>,
    #[serde(default)]
    embeddings: Option<Vec<YandexEmbeddingItem>>,
    #[serde(default)]
    num_tokens: Option<serde_json::Value>,
    #[serde(default)]
    model_version: Option<String>,
}

impl YandexEmbeddingResponse {
    fn into_embedding(self) -> Option<Embedding> {
        self.embedding.or_else(|| {
            self.embeddings
                .and_then(|items| items.into_iter().next())
                .map(|item| item.embedding)
        })
    }
}

#[derive(Debug, Deserialize)]
struct YandexEmbeddingItem {
    embedding: Vec<f32>,
}

/// Token counts arrive as JSON strings or numbers.
fn token_count(value: &serde_json::Value) -> Option<u64> {
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}
