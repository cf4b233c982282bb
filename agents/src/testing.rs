//! Deterministic providers for agent tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use yagent_embeddings::{
    Embedding, EmbeddingError, EmbeddingProvider, EmbeddingRequest, EmbeddingResponse,
};
use yagent_operations::{
    CompletionParams, CompletionProvider, OperationError, OperationOutcome, Prompt,
};

/// Answers embeddings from a fixed table; unknown texts fail.
pub(crate) struct TableProvider {
    vectors: HashMap<String, Embedding>,
    calls: Mutex<Vec<String>>,
}

impl TableProvider {
    pub(crate) fn new(entries: &[(&str, Vec<f32>)]) -> Self {
        Self {
            vectors: entries
                .iter()
                .map(|(text, vector)| (text.to_string(), vector.clone()))
                .collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmbeddingProvider for TableProvider {
    fn name(&self) -> &str {
        "table"
    }

    fn default_model(&self) -> &str {
        "table-model"
    }

    async fn embed(
        &self,
        request: EmbeddingRequest,
    ) -> yagent_embeddings::Result<EmbeddingResponse> {
        self.calls.lock().unwrap().push(request.text.clone());
        let embedding = self.vectors.get(&request.text).cloned().ok_or_else(|| {
            EmbeddingError::InvalidResponse(format!("no vector for {:?}", request.text))
        })?;
        Ok(EmbeddingResponse {
            dimension: embedding.len(),
            embedding,
            model: request.model.unwrap_or_else(|| "table-model".to_string()),
            tokens_used: None,
        })
    }

    fn is_available(&self) -> bool {
        true
    }
}

/// Hands out sequential operation ids and replays scripted poll outcomes.
#[derive(Default)]
pub(crate) struct ScriptedCompletions {
    pub(crate) next_id: Mutex<u32>,
    pub(crate) reject: bool,
    pub(crate) prompts: Mutex<Vec<Prompt>>,
    pub(crate) outcomes: Mutex<HashMap<String, VecDeque<OperationOutcome>>>,
}

impl ScriptedCompletions {
    pub(crate) fn script(&self, operation_id: &str, outcome: OperationOutcome) {
        self.outcomes
            .lock()
            .unwrap()
            .entry(operation_id.to_string())
            .or_default()
            .push_back(outcome);
    }

    pub(crate) fn prompts(&self) -> Vec<Prompt> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedCompletions {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn submit(
        &self,
        prompt: &Prompt,
        _params: &CompletionParams,
    ) -> yagent_operations::Result<String> {
        if self.reject {
            return Err(OperationError::ApiRequest("429: quota".to_string()));
        }
        self.prompts.lock().unwrap().push(prompt.clone());
        let mut next_id = self.next_id.lock().unwrap();
        *next_id += 1;
        Ok(format!("op-{next_id}"))
    }

    async fn poll(&self, operation_id: &str) -> yagent_operations::Result<OperationOutcome> {
        Ok(self
            .outcomes
            .lock()
            .unwrap()
            .get_mut(operation_id)
            .and_then(VecDeque::pop_front)
            .unwrap_or(OperationOutcome::Pending))
    }
}
