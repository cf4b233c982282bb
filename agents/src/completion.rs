//! Asynchronous completion agent.
//!
//! `receive` starts a completion for an event; `check` polls everything
//! pending and emits the original event enriched with the generated text
//! once its operation has completed.

use std::collections::BTreeMap;

use serde_json::json;
use tracing::{info, warn};
use yagent_operations::{
    CompletedOperation, CompletionProvider, OperationTracker, PendingOperations, Prompt,
};

use crate::config::CompletionConfig;
use crate::error::Result;
use crate::event::Event;

/// Payload key the agent writes to.
pub const PAYLOAD_KEY: &str = "completion";

/// Known events by id.
pub type EventLog = BTreeMap<String, Event>;

/// Submits completions and turns finished operations into events.
pub struct CompletionAgent<P> {
    tracker: OperationTracker<P>,
    config: CompletionConfig,
}

impl<P> CompletionAgent<P>
where
    P: CompletionProvider,
{
    /// Create an agent with nothing pending.
    pub fn new(provider: P, config: CompletionConfig) -> Result<Self> {
        Self::with_tracker(OperationTracker::new(provider), config)
    }

    /// Create an agent around a configured tracker (loaded pending set,
    /// custom clock or TTL).
    pub fn with_tracker(tracker: OperationTracker<P>, config: CompletionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { tracker, config })
    }

    pub fn config(&self) -> &CompletionConfig {
        &self.config
    }

    pub fn tracker(&self) -> &OperationTracker<P> {
        &self.tracker
    }

    /// Handle to the pending operations, e.g. to persist them.
    pub fn pending(&self) -> &PendingOperations {
        self.tracker.pending()
    }

    /// Start a completion of `user_prompt` for `event`.
    ///
    /// The event itself is not stored here; pass it to [`check`] later.
    ///
    /// [`check`]: Self::check
    pub async fn receive(&self, event: &Event, user_prompt: &str) -> Result<String> {
        let prompt = Prompt::new(self.config.system_prompt.clone(), user_prompt);
        let operation_id = self
            .tracker
            .submit(&prompt, &self.config.params(), event.id.clone())
            .await?;
        Ok(operation_id)
    }

    /// Poll every pending operation once.
    ///
    /// Only operations whose event is in `events` are polled. Each completed
    /// operation yields its event with a `completion` section; failed and
    /// expired operations yield nothing.
    pub async fn check(&self, events: &EventLog) -> Vec<Event> {
        let report = self.tracker.tick(events).await;

        if !report.expired.is_empty() {
            info!(
                "{} operations expired without a result",
                report.expired.len()
            );
        }

        report
            .completed
            .iter()
            .filter_map(|completed| {
                let Some(event) = events.get(&completed.context_id) else {
                    warn!(
                        "Event {} of operation {} disappeared",
                        completed.context_id, completed.operation_id
                    );
                    return None;
                };
                Some(event.merged(PAYLOAD_KEY, completion_section(completed)))
            })
            .collect()
    }
}

fn completion_section(completed: &CompletedOperation) -> serde_json::Value {
    let result = &completed.result;
    let usage = result.usage.unwrap_or_default();
    json!({
        "text": result.text(),
        "usage": {
            "input_text_tokens": usage.input_text_tokens,
            "completion_tokens": usage.completion_tokens,
            "total_tokens": usage.total_tokens,
        },
        "model_version": result.model_version,
    })
}
