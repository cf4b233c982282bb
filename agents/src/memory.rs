//! Directory-backed agent state.
//!
//! Layout under the root directory:
//!
//! ```text
//! <root>/
//!   vectors/<name>.json        label or document embeddings
//!   pending_operations.json    operations awaiting a result
//!   events.json                events completions attach to
//! ```
//!
//! State is loaded once before an invocation and saved once after it.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;
use yagent_embeddings::{CachePolicy, VectorStore};
use yagent_operations::PendingOperations;

use crate::completion::EventLog;
use crate::error::Result;

const VECTORS_DIR: &str = "vectors";
const PENDING_FILE: &str = "pending_operations.json";
const EVENTS_FILE: &str = "events.json";

/// Persistent state of the agents, rooted at one directory.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    root: PathBuf,
}

impl MemoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File holding the vector store called `name`.
    pub fn vectors_path(&self, name: &str) -> PathBuf {
        self.root.join(VECTORS_DIR).join(format!("{name}.json"))
    }

    pub fn pending_path(&self) -> PathBuf {
        self.root.join(PENDING_FILE)
    }

    pub fn events_path(&self) -> PathBuf {
        self.root.join(EVENTS_FILE)
    }

    /// Load the vector store called `name`; empty if never saved.
    pub async fn load_vectors(&self, name: &str, policy: CachePolicy) -> Result<VectorStore> {
        Ok(VectorStore::load(self.vectors_path(name), policy).await?)
    }

    pub async fn save_vectors(&self, name: &str, store: &VectorStore) -> Result<()> {
        Ok(store.save(self.vectors_path(name)).await?)
    }

    /// Load the pending operations; empty if never saved.
    pub async fn load_pending(&self) -> Result<PendingOperations> {
        Ok(PendingOperations::load(self.pending_path()).await?)
    }

    pub async fn save_pending(&self, pending: &PendingOperations) -> Result<()> {
        Ok(pending.save(self.pending_path()).await?)
    }

    /// Load the known events; empty if never saved.
    pub async fn load_events(&self) -> Result<EventLog> {
        let path = self.events_path();
        if !fs::try_exists(&path).await? {
            return Ok(EventLog::new());
        }
        let content = fs::read_to_string(&path).await?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save the known events, replacing the file atomically.
    pub async fn save_events(&self, events: &EventLog) -> Result<()> {
        let path = self.events_path();
        fs::create_dir_all(&self.root).await?;

        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, serde_json::to_string_pretty(events)?).await?;
        fs::rename(&temp_path, &path).await?;

        debug!("Saved {} events to {}", events.len(), path.display());
        Ok(())
    }
}
