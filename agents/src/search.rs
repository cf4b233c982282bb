//! Semantic search over a fixed set of candidate documents.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};
use yagent_embeddings::{EmbeddingProvider, MatchingEngine, VectorStore};

use crate::config::SemanticSearchConfig;
use crate::error::Result;
use crate::event::Event;

/// Payload key the search writes to.
pub const PAYLOAD_KEY: &str = "semantic_search";

/// Derives the result string of a matched document.
pub type ResultExtractor = Box<dyn Fn(&str) -> String + Send + Sync>;

/// The default extractor: the first whitespace-separated word.
pub fn first_word(document: &str) -> String {
    document
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_string()
}

/// One matched document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchMatch {
    pub document: String,
    pub similarity: f32,
    pub result: String,
}

/// Finds the candidate documents closest to a query.
pub struct SemanticSearch<P> {
    engine: MatchingEngine<P>,
    config: SemanticSearchConfig,
    extractor: ResultExtractor,
}

impl<P> SemanticSearch<P>
where
    P: EmbeddingProvider,
{
    /// Create a search with an empty document store.
    pub fn new(provider: P, config: SemanticSearchConfig) -> Result<Self> {
        config.validate()?;
        let store = VectorStore::with_policy(config.cache)?;
        Self::with_store(provider, config, store)
    }

    /// Create a search over previously computed document embeddings.
    pub fn with_store(
        provider: P,
        config: SemanticSearchConfig,
        store: VectorStore,
    ) -> Result<Self> {
        config.validate()?;
        let engine = MatchingEngine::with_store(provider, store)
            .with_batch_policy(config.batch)
            .with_model(config.model_uri.clone());
        Ok(Self {
            engine,
            config,
            extractor: Box::new(first_word),
        })
    }

    /// Replace the result extractor.
    pub fn with_extractor<F>(mut self, extractor: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.extractor = Box::new(extractor);
        self
    }

    pub fn config(&self) -> &SemanticSearchConfig {
        &self.config
    }

    /// The document embeddings computed so far.
    pub fn store(&self) -> &VectorStore {
        self.engine.store()
    }

    pub fn into_store(self) -> VectorStore {
        self.engine.into_store()
    }

    /// Search the candidate documents for `query` on behalf of `event`.
    ///
    /// Returns `None` for a blank query. Otherwise the emitted event carries
    /// the matches (best first, at most `max_results`) and their unique
    /// results in match order.
    pub async fn search(&mut self, event: &Event, query: &str) -> Result<Option<Event>> {
        if query.trim().is_empty() {
            info!("Query for event {} is blank, skipping", event.id);
            return Ok(None);
        }

        let ranked = self
            .engine
            .rank(
                query,
                &self.config.candidate_documents,
                self.config.min_similarity,
                Some(self.config.max_results),
            )
            .await;
        let ranked = match ranked {
            Ok(ranked) => ranked,
            Err(e) => {
                error!("Failed to embed query of event {}: {e}", event.id);
                return Err(e.into());
            }
        };

        let matches: Vec<SearchMatch> = ranked
            .into_iter()
            .map(|hit| SearchMatch {
                result: (self.extractor)(&hit.key).trim().to_string(),
                document: hit.key,
                similarity: hit.score,
            })
            .collect();

        let mut results: Vec<&str> = Vec::with_capacity(matches.len());
        for hit in &matches {
            if !results.contains(&hit.result.as_str()) {
                results.push(&hit.result);
            }
        }

        Ok(Some(event.merged(
            PAYLOAD_KEY,
            json!({
                "results": results,
                "matches": matches,
            }),
        )))
    }
}
