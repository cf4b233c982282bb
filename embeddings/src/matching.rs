//! Ranking candidate texts against a query.
//!
//! [`MatchingEngine`] glues a [`VectorStore`] to an [`EmbeddingProvider`]:
//! candidates are embedded once and then served from the store, the query
//! is embedded on every call, and the scores go through
//! [`select_top_matches`].

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::Embedding;
use crate::error::Result;
use crate::provider::{EmbeddingProvider, EmbeddingRequest};
use crate::similarity::{SimilarityResult, cosine_similarity, select_top_matches};
use crate::store::VectorStore;

/// How missing candidate embeddings are requested.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatchPolicy {
    /// Number of requests per batch.
    pub batch_size: usize,

    /// Pause between two consecutive batches.
    #[serde(with = "duration_millis")]
    pub pause: Duration,
}

impl BatchPolicy {
    /// No pauses at all, mostly useful for tests and local providers.
    pub fn unthrottled() -> Self {
        Self {
            batch_size: usize::MAX,
            pause: Duration::ZERO,
        }
    }
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            batch_size: 10,
            pause: Duration::from_secs(1),
        }
    }
}

/// Ranks candidates by cosine similarity to a query.
///
/// Callers must not run two calls on the same engine concurrently; the
/// `&mut self` receivers enforce that within one process.
pub struct MatchingEngine<P> {
    provider: P,
    store: VectorStore,
    batch: BatchPolicy,
    model: Option<String>,
}

impl<P> MatchingEngine<P>
where
    P: EmbeddingProvider,
{
    /// Create an engine with an empty unbounded store.
    pub fn new(provider: P) -> Self {
        Self::with_store(provider, VectorStore::new())
    }

    /// Create an engine on top of an existing (e.g. loaded) store.
    pub fn with_store(provider: P, store: VectorStore) -> Self {
        Self {
            provider,
            store,
            batch: BatchPolicy::default(),
            model: None,
        }
    }

    /// Set the batching policy for missing embeddings.
    pub fn with_batch_policy(mut self, batch: BatchPolicy) -> Self {
        self.batch = batch;
        self
    }

    /// Embed with this model instead of the provider default.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// The underlying provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// The vector store.
    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    /// Take the vector store back, e.g. to persist it.
    pub fn into_store(self) -> VectorStore {
        self.store
    }

    /// Rank `candidates` against `query`.
    ///
    /// Candidates whose embedding cannot be obtained are skipped for this
    /// call and retried on the next one. Failing to embed the query fails
    /// the whole call.
    pub async fn rank<S>(
        &mut self,
        query: &str,
        candidates: &[S],
        min_similarity: f32,
        max_results: Option<usize>,
    ) -> Result<Vec<SimilarityResult>>
    where
        S: AsRef<str>,
    {
        let scores = self.score(query, candidates).await?;
        let results = select_top_matches(scores, min_similarity, max_results);

        info!(
            "Selected {} of {} candidates with similarity >= {min_similarity}",
            results.len(),
            candidates.len()
        );

        Ok(results)
    }

    /// Score every resolvable candidate against `query`, in candidate order.
    ///
    /// Duplicate candidates are scored once.
    pub async fn score<S>(&mut self, query: &str, candidates: &[S]) -> Result<Vec<(String, f32)>>
    where
        S: AsRef<str>,
    {
        let candidates = unique(candidates);
        let resolved = self.resolve_missing(&candidates).await;

        let query_embedding = self.provider.embed(self.request(query)).await?.embedding;

        let mut scores = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            // Vectors resolved by this call are scored even if a bounded
            // store already evicted them again.
            let embedding = match resolved.get(candidate) {
                Some(embedding) => Some(embedding),
                None => self.store.get(candidate),
            };
            if let Some(embedding) = embedding {
                scores.push((
                    candidate.to_string(),
                    cosine_similarity(&query_embedding, embedding),
                ));
            }
        }

        debug!("Computed similarities: {scores:?}");
        Ok(scores)
    }

    /// Embed the candidates the store does not know yet.
    ///
    /// Returns the vectors obtained by this call; they are also put into
    /// the store.
    async fn resolve_missing(&mut self, candidates: &[&str]) -> HashMap<String, Embedding> {
        let missing: Vec<&str> = candidates
            .iter()
            .copied()
            .filter(|c| !self.store.has(c))
            .collect();

        let mut resolved = HashMap::with_capacity(missing.len());
        if missing.is_empty() {
            return resolved;
        }

        info!("Computing embeddings for {} candidates", missing.len());

        let batch_size = self.batch.batch_size.max(1);
        for (batch_index, batch) in missing.chunks(batch_size).enumerate() {
            if batch_index > 0 && !self.batch.pause.is_zero() {
                tokio::time::sleep(self.batch.pause).await;
            }

            for candidate in batch {
                match self.provider.embed(self.request(candidate)).await {
                    Ok(response) => {
                        self.store.put(*candidate, response.embedding.clone());
                        resolved.insert(candidate.to_string(), response.embedding);
                    }
                    Err(e) => warn!("Failed to embed candidate {candidate:?}: {e}"),
                }
            }
        }

        resolved
    }

    fn request(&self, text: &str) -> EmbeddingRequest {
        let request = EmbeddingRequest::new(text);
        match &self.model {
            Some(model) => request.with_model(model.clone()),
            None => request,
        }
    }
}

fn unique<S: AsRef<str>>(candidates: &[S]) -> Vec<&str> {
    let mut seen = HashSet::new();
    candidates
        .iter()
        .map(AsRef::as_ref)
        .filter(|c| seen.insert(*c))
        .collect()
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
