//! Embedding label classifier.
//!
//! Embeds every configured label once, then labels incoming text with the
//! labels whose cosine similarity to the text reaches `min_similarity`.

use serde_json::{Map, Value, json};
use tracing::{error, info};
use yagent_embeddings::{EmbeddingProvider, MatchingEngine, VectorStore, select_top_matches};

use crate::config::ClassifierConfig;
use crate::error::Result;
use crate::event::Event;

/// Payload key the classifier writes to.
pub const PAYLOAD_KEY: &str = "embedding";

/// Labels events by embedding similarity.
pub struct EmbeddingClassifier<P> {
    engine: MatchingEngine<P>,
    config: ClassifierConfig,
}

impl<P> EmbeddingClassifier<P>
where
    P: EmbeddingProvider,
{
    /// Create a classifier with an empty label store.
    pub fn new(provider: P, config: ClassifierConfig) -> Result<Self> {
        config.validate()?;
        let store = VectorStore::with_policy(config.cache)?;
        Self::with_store(provider, config, store)
    }

    /// Create a classifier over previously computed label embeddings.
    pub fn with_store(provider: P, config: ClassifierConfig, store: VectorStore) -> Result<Self> {
        config.validate()?;
        let engine = MatchingEngine::with_store(provider, store)
            .with_batch_policy(config.batch)
            .with_model(config.model_uri.clone());
        Ok(Self { engine, config })
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// The label embeddings computed so far.
    pub fn store(&self) -> &VectorStore {
        self.engine.store()
    }

    pub fn into_store(self) -> VectorStore {
        self.engine.into_store()
    }

    /// Classify `text` on behalf of `event`.
    ///
    /// Returns `None` for blank text. Otherwise the emitted event carries
    /// the selected labels (best first) and the similarity of every label
    /// that could be embedded.
    pub async fn classify(&mut self, event: &Event, text: &str) -> Result<Option<Event>> {
        if text.trim().is_empty() {
            info!("Text to classify for event {} is blank, skipping", event.id);
            return Ok(None);
        }

        let scores = match self.engine.score(text, &self.config.labels).await {
            Ok(scores) => scores,
            Err(e) => {
                error!("Failed to embed text of event {}: {e}", event.id);
                return Err(e.into());
            }
        };

        let similarities: Map<String, Value> = scores
            .iter()
            .map(|(label, score)| (label.clone(), Value::from(*score)))
            .collect();

        let labels: Vec<String> = select_top_matches(scores, self.config.min_similarity, None)
            .into_iter()
            .map(|result| result.key)
            .collect();

        info!(
            "Selected {} of {} labels for event {}",
            labels.len(),
            self.config.labels.len(),
            event.id
        );

        Ok(Some(event.merged(
            PAYLOAD_KEY,
            json!({
                "labels": labels,
                "similarities": similarities,
            }),
        )))
    }
}
