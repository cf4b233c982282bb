//! Completion provider contract and the typed results it returns.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, PickFirst, serde_as};

use crate::error::Result;

/// A two-part chat prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    /// System instructions.
    pub system: String,

    /// User message.
    pub user: String,
}

impl Prompt {
    /// Create a new prompt.
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }
}

/// Sampling parameters for a completion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompletionParams {
    /// Sampling temperature, 0 to 1.
    pub temperature: f32,

    /// Upper bound on generated tokens.
    pub max_tokens: u32,
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            max_tokens: 2000,
        }
    }
}

/// Status of a remote operation as reported by one poll.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationOutcome {
    /// Still running.
    Pending,

    /// Finished with a result.
    Completed(CompletionResult),

    /// Finished with an error message.
    Failed(String),
}

impl OperationOutcome {
    /// Whether the operation has reached a final state.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Result payload of a finished completion.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionResult {
    /// Generated alternatives, best first.
    #[serde(default)]
    pub alternatives: Vec<Alternative>,

    /// Token accounting.
    #[serde(default)]
    pub usage: Option<Usage>,

    /// Version of the model that served the request.
    #[serde(default)]
    pub model_version: Option<String>,
}

impl CompletionResult {
    /// Text of the first alternative, if any.
    pub fn text(&self) -> Option<&str> {
        self.alternatives.first().map(|a| a.message.text.as_str())
    }
}

/// One generated alternative.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Alternative {
    pub message: Message,

    #[serde(default)]
    pub status: Option<String>,
}

/// A chat message.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub role: String,

    #[serde(default)]
    pub text: String,
}

/// Token counts. The API sends them as decimal strings; plain numbers are
/// accepted as well.
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    pub input_text_tokens: Option<u64>,

    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    pub completion_tokens: Option<u64>,

    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    pub total_tokens: Option<u64>,
}

/// A service that runs completions as long-running operations.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Get the name of this provider.
    fn name(&self) -> &str;

    /// Start a completion and return its operation id.
    async fn submit(&self, prompt: &Prompt, params: &CompletionParams) -> Result<String>;

    /// Check on a previously submitted operation.
    async fn poll(&self, operation_id: &str) -> Result<OperationOutcome>;
}
