//! Memoizing vector store.
//!
//! The store maps an opaque text key (a label, a document, any text) to its
//! embedding. A key that has a vector is never embedded again. With the
//! default [`CachePolicy::Unbounded`] nothing is ever evicted, so a
//! long-lived store grows with every distinct key it sees; pick
//! [`CachePolicy::Lru`] to bound it.
//!
//! On disk the store is a JSON object of key to vector whose entries run
//! from least to most recently used, so a reloaded LRU store evicts in the
//! same order it would have before it was saved.

use std::num::NonZeroUsize;
use std::path::Path;

use lru::LruCache;
use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use tokio::fs;
use tracing::{debug, info};

use crate::Embedding;
use crate::error::{EmbeddingError, Result};

/// Capacity policy for a [`VectorStore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CachePolicy {
    /// Append-only: entries are never evicted.
    #[default]
    Unbounded,

    /// Keep at most `capacity` entries, evicting the least recently used.
    Lru { capacity: usize },
}

/// Saved entries, least recently used first.
#[serde_as]
#[derive(Serialize)]
struct SavedVectors<'a>(#[serde_as(as = "serde_with::Map<_, _>")] Vec<(&'a str, &'a Embedding)>);

#[serde_as]
#[derive(Deserialize)]
struct LoadedVectors(#[serde_as(as = "serde_with::Map<_, _>")] Vec<(String, Embedding)>);

/// Key→vector cache shared by every invocation of one matching session.
pub struct VectorStore {
    entries: LruCache<String, Embedding>,
    policy: CachePolicy,
}

impl VectorStore {
    /// Create an empty, unbounded store.
    pub fn new() -> Self {
        Self {
            entries: LruCache::unbounded(),
            policy: CachePolicy::Unbounded,
        }
    }

    /// Create an empty store with the given capacity policy.
    pub fn with_policy(policy: CachePolicy) -> Result<Self> {
        let entries = match policy {
            CachePolicy::Unbounded => LruCache::unbounded(),
            CachePolicy::Lru { capacity } => {
                let capacity = NonZeroUsize::new(capacity).ok_or_else(|| {
                    EmbeddingError::Store("LRU capacity must be positive".to_string())
                })?;
                LruCache::new(capacity)
            }
        };

        Ok(Self { entries, policy })
    }

    /// The capacity policy in effect.
    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// Get the vector for `key`, marking it as recently used.
    pub fn get(&mut self, key: &str) -> Option<&Embedding> {
        self.entries.get(key)
    }

    /// Get the vector for `key` without touching recency.
    pub fn peek(&self, key: &str) -> Option<&Embedding> {
        self.entries.peek(key)
    }

    /// Store the vector for `key`.
    pub fn put(&mut self, key: impl Into<String>, embedding: Embedding) {
        let key = key.into();
        if let Some((evicted, _)) = self.entries.push(key.clone(), embedding) {
            if evicted != key {
                debug!("Evicted embedding for {evicted:?}");
            }
        }
    }

    /// Check whether `key` already has a vector.
    pub fn has(&self, key: &str) -> bool {
        self.entries.contains(key)
    }

    /// Number of cached vectors.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All cached keys, most recently used first.
    pub fn keys(&self) -> Vec<&str> {
        self.entries.iter().map(|(k, _)| k.as_str()).collect()
    }

    /// Serialize the store as a JSON object of key to vector, least
    /// recently used first.
    pub fn to_json(&self) -> Result<String> {
        let entries = self
            .entries
            .iter()
            .rev()
            .map(|(k, v)| (k.as_str(), v))
            .collect();
        Ok(serde_json::to_string(&SavedVectors(entries))?)
    }

    /// Rebuild a store from [`VectorStore::to_json`] output, replaying the
    /// entries in document order.
    pub fn from_json(json: &str, policy: CachePolicy) -> Result<Self> {
        let LoadedVectors(entries) = serde_json::from_str(json)?;

        let mut store = Self::with_policy(policy)?;
        for (key, embedding) in entries {
            store.entries.push(key, embedding);
        }

        Ok(store)
    }

    /// Load a store from disk. A missing file yields an empty store.
    pub async fn load(path: impl AsRef<Path>, policy: CachePolicy) -> Result<Self> {
        let path = path.as_ref();
        if !fs::try_exists(path).await? {
            debug!("No vector store at {}, starting empty", path.display());
            return Self::with_policy(policy);
        }

        let content = fs::read_to_string(path).await?;
        let store = Self::from_json(&content, policy)?;
        info!("Loaded {} cached embeddings from {}", store.len(), path.display());
        Ok(store)
    }

    /// Save the store to disk, replacing the file atomically.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = self.to_json()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, &content).await?;
        fs::rename(&temp_path, path).await?;

        debug!("Saved {} cached embeddings to {}", self.len(), path.display());
        Ok(())
    }
}

impl Default for VectorStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for VectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStore")
            .field("entries", &self.entries.len())
            .field("policy", &self.policy)
            .finish()
    }
}
