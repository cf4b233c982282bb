//! YandexGPT asynchronous completion client.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{OperationError, Result};
use crate::provider::{
    CompletionParams, CompletionProvider, CompletionResult, OperationOutcome, Prompt,
};

/// Default API host for completions.
pub const DEFAULT_LLM_URL: &str = "https://llm.api.cloud.yandex.net";

/// Default API host for operation status.
pub const DEFAULT_OPERATION_URL: &str = "https://operation.api.cloud.yandex.net";

/// Client for `completionAsync` and the operations API.
pub struct YandexGptClient {
    /// API key, sent as `Api-Key`.
    api_key: Option<String>,

    /// Cloud folder the model is billed to.
    folder_id: String,

    /// Model name, e.g. `yandexgpt-lite`.
    model_name: String,

    /// Model version: `latest`, `rc` or `deprecated`.
    model_version: String,

    /// Base URL for completion requests.
    llm_url: String,

    /// Base URL for operation polling.
    operation_url: String,

    /// HTTP client.
    client: reqwest::Client,
}

impl YandexGptClient {
    /// Create a new client for the given folder.
    ///
    /// The API key is read from `YANDEX_API_KEY` unless set explicitly.
    pub fn new(folder_id: impl Into<String>) -> Self {
        Self {
            api_key: std::env::var("YANDEX_API_KEY").ok(),
            folder_id: folder_id.into(),
            model_name: "yandexgpt-lite".to_string(),
            model_version: "latest".to_string(),
            llm_url: DEFAULT_LLM_URL.to_string(),
            operation_url: DEFAULT_OPERATION_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Set the API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the model name and version.
    pub fn with_model(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.model_name = name.into();
        self.model_version = version.into();
        self
    }

    /// Point both endpoints at another host (for tests and proxies).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.llm_url = url.clone();
        self.operation_url = url;
        self
    }

    /// `gpt://<folder>/<model>/<version>`
    pub fn model_uri(&self) -> String {
        format!(
            "gpt://{}/{}/{}",
            self.folder_id, self.model_name, self.model_version
        )
    }

    fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or(OperationError::ProviderNotConfigured)
    }

    async fn read_body(response: reqwest::Response) -> Result<String> {
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(OperationError::ApiRequest(format!("{status}: {text}")));
        }
        Ok(text)
    }
}

#[async_trait]
impl CompletionProvider for YandexGptClient {
    fn name(&self) -> &str {
        "yandexgpt"
    }

    async fn submit(&self, prompt: &Prompt, params: &CompletionParams) -> Result<String> {
        let api_key = self.api_key()?;

        let body = serde_json::json!({
            "modelUri": self.model_uri(),
            "completionOptions": {
                "stream": false,
                "temperature": params.temperature,
                "maxTokens": params.max_tokens.to_string(),
            },
            "messages": [
                { "role": "system", "text": prompt.system },
                { "role": "user", "text": prompt.user },
            ],
        });

        let response = self
            .client
            .post(format!("{}/foundationModels/v1/completionAsync", self.llm_url))
            .header("Authorization", format!("Api-Key {api_key}"))
            .header("x-folder-id", &self.folder_id)
            .json(&body)
            .send()
            .await?;

        let text = Self::read_body(response).await?;
        let operation: OperationResponse = serde_json::from_str(&text)
            .map_err(|e| OperationError::InvalidResponse(format!("{e}: {text}")))?;

        let id = operation
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| OperationError::InvalidResponse(format!("no operation id: {text}")))?;

        info!("Submitted completion as operation {id}");
        Ok(id)
    }

    async fn poll(&self, operation_id: &str) -> Result<OperationOutcome> {
        let api_key = self.api_key()?;

        let response = self
            .client
            .get(format!("{}/operations/{operation_id}", self.operation_url))
            .header("Authorization", format!("Api-Key {api_key}"))
            .send()
            .await?;

        let text = Self::read_body(response).await?;
        let operation: OperationResponse = serde_json::from_str(&text)
            .map_err(|e| OperationError::InvalidResponse(format!("{e}: {text}")))?;

        if !operation.done {
            debug!("Operation {operation_id} still running");
            return Ok(OperationOutcome::Pending);
        }

        match (operation.response, operation.error) {
            (Some(result), _) => Ok(OperationOutcome::Completed(result)),
            (None, Some(error)) => Ok(OperationOutcome::Failed(error.message)),
            (None, None) => Err(OperationError::InvalidResponse(format!(
                "operation {operation_id} is done without response or error"
            ))),
        }
    }
}

/// An entry of the operations API.
#[derive(Debug, Deserialize)]
struct OperationResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    response: Option<CompletionResult>,
    #[serde(default)]
    error: Option<OperationStatusError>,
}

#[derive(Debug, Deserialize)]
struct OperationStatusError {
    #[serde(default)]
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const RESPONSE_TYPE: &str =
        "type.googleapis.com/yandex.cloud.ai.foundation_models.v1.CompletionResponse";

    fn client(server: &MockServer) -> YandexGptClient {
        YandexGptClient::new("b1gfolder")
            .with_api_key("secret")
            .with_base_url(server.uri())
    }

    #[test]
    fn test_model_uri() {
        let client = YandexGptClient::new("b1gfolder").with_model("yandexgpt", "rc");
        assert_eq!(client.model_uri(), "gpt://b1gfolder/yandexgpt/rc");
    }

    #[tokio::test]
    async fn test_submit_returns_operation_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/foundationModels/v1/completionAsync"))
            .and(header("Authorization", "Api-Key secret"))
            .and(header("x-folder-id", "b1gfolder"))
            .and(body_json(serde_json::json!({
                "modelUri": "gpt://b1gfolder/yandexgpt-lite/latest",
                "completionOptions": { "stream": false, "temperature": 0.5, "maxTokens": "100" },
                "messages": [
                    { "role": "system", "text": "Summarize." },
                    { "role": "user", "text": "Long article" },
                ],
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "d7qi6shlbvo5dsi1bpbm",
                "done": false,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let params = CompletionParams {
            temperature: 0.5,
            max_tokens: 100,
        };
        let id = client(&server)
            .submit(&Prompt::new("Summarize.", "Long article"), &params)
            .await
            .unwrap();
        assert_eq!(id, "d7qi6shlbvo5dsi1bpbm");
    }

    #[tokio::test]
    async fn test_submit_without_id_is_invalid() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "done": false })),
            )
            .mount(&server)
            .await;

        let result = client(&server)
            .submit(&Prompt::new("s", "u"), &CompletionParams::default())
            .await;
        assert!(matches!(result, Err(OperationError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_submit_http_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
            .mount(&server)
            .await;

        let result = client(&server)
            .submit(&Prompt::new("s", "u"), &CompletionParams::default())
            .await;
        assert!(matches!(result, Err(OperationError::ApiRequest(_))));
    }

    #[tokio::test]
    async fn test_poll_outcomes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/operations/running"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "running", "done": false,
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/operations/finished"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "finished",
                "done": true,
                "response": {
                    "@type": RESPONSE_TYPE,
                    "alternatives": [{
                        "message": { "role": "assistant", "text": "Done." },
                        "status": "ALTERNATIVE_STATUS_FINAL",
                    }],
                    "usage": {
                        "inputTextTokens": "10",
                        "completionTokens": "2",
                        "totalTokens": "12",
                    },
                    "modelVersion": "23.10.2024",
                },
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/operations/broken"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "broken",
                "done": true,
                "error": { "code": 3, "message": "prompt rejected" },
            })))
            .mount(&server)
            .await;

        let client = client(&server);

        assert_eq!(client.poll("running").await.unwrap(), OperationOutcome::Pending);
        assert_eq!(
            client.poll("broken").await.unwrap(),
            OperationOutcome::Failed("prompt rejected".to_string())
        );

        let OperationOutcome::Completed(result) = client.poll("finished").await.unwrap() else {
            panic!("expected completed outcome");
        };
        assert_eq!(result.text(), Some("Done."));
        assert_eq!(result.usage.and_then(|u| u.total_tokens), Some(12));
    }

    #[tokio::test]
    async fn test_poll_done_without_payload_is_invalid() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "odd", "done": true,
            })))
            .mount(&server)
            .await;

        let result = client(&server).poll("odd").await;
        assert!(matches!(result, Err(OperationError::InvalidResponse(_))));
    }
}
