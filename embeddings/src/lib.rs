//! # Embeddings
//!
//! This crate provides the embedding side of yagent: a memoizing vector
//! store, cosine similarity ranking, and a matching engine that ranks a set
//! of candidate texts against a query.
//!
//! ## Features
//!
//! - **Vector Store**: text→vector memoization that survives invocations
//! - **Similarity Ranking**: cosine similarity, threshold and top-k selection
//! - **Matching Engine**: lazy, batched resolution of missing embeddings
//! - **Yandex Provider**: client for the Foundation Models embedding API
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Matching Engine                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  EmbeddingProvider ──► VectorStore ──► select_top_matches       │
//! │       │                    │                  │                 │
//! │       ▼                    ▼                  ▼                 │
//! │  Yandex API          load() / save()    SimilarityResult        │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency
//!
//! Nothing in this crate locks. The host must serialize `rank` calls for a
//! given engine; `&mut self` receivers make that a compile-time requirement.

pub mod error;
pub mod matching;
pub mod provider;
pub mod similarity;
pub mod store;

pub use error::{EmbeddingError, Result};
pub use matching::{BatchPolicy, MatchingEngine};
pub use provider::{
    EmbeddingProvider, EmbeddingRequest, EmbeddingResponse, YandexEmbeddingProvider,
};
pub use similarity::{SimilarityResult, cosine_similarity, select_top_matches};
pub use store::{CachePolicy, VectorStore};

/// A dense vector embedding.
pub type Embedding = Vec<f32>;
