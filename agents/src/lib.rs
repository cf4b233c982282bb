//! # Agents
//!
//! The three yagent agents built on the matching engine and the operation
//! tracker:
//!
//! ```text
//!   Event ──► EmbeddingClassifier ──► Event + "embedding"
//!   Event ──► SemanticSearch      ──► Event + "semantic_search"
//!   Event ──► CompletionAgent ··(poll)··► Event + "completion"
//! ```
//!
//! Each agent validates its configuration on construction and never makes
//! a remote call with an invalid one. State that has to outlive a process
//! (embeddings, pending operations, known events) goes through
//! [`MemoryStore`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use yagent_agents::{ClassifierConfig, EmbeddingClassifier, Event};
//! use yagent_embeddings::YandexEmbeddingProvider;
//!
//! let provider = YandexEmbeddingProvider::new("b1gfolder");
//! let config = ClassifierConfig {
//!     labels: vec!["sports".into(), "politics".into()],
//!     ..Default::default()
//! };
//! let mut classifier = EmbeddingClassifier::new(provider, config)?;
//! let emitted = classifier.classify(&Event::new("e1"), "Late goal decides the derby").await?;
//! ```

pub mod classifier;
pub mod completion;
pub mod config;
pub mod error;
pub mod event;
pub mod memory;
pub mod search;

#[cfg(test)]
mod testing;

pub use classifier::EmbeddingClassifier;
pub use completion::{CompletionAgent, EventLog};
pub use config::{
    AgentConfig, ClassifierConfig, CompletionConfig, Credentials, SemanticSearchConfig,
};
pub use error::{AgentError, Result};
pub use event::{Event, Payload};
pub use memory::MemoryStore;
pub use search::{ResultExtractor, SearchMatch, SemanticSearch, first_word};
