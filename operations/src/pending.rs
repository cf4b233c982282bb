//! Pending operation storage and persistence.
//!
//! `PendingOperations` is the tracker's repository: a map from operation id
//! to the context it belongs to and when it was submitted. It is loaded at
//! the start of an invocation and saved at the end of it.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{Result, StorageError};

/// A submitted operation that has not reached a terminal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOperation {
    /// Remote operation id.
    pub operation_id: String,

    /// Originating request the result belongs to.
    pub context_id: String,

    /// Submission time.
    pub created_at: DateTime<Utc>,
}

impl PendingOperation {
    /// Create a pending operation.
    pub fn new(
        operation_id: impl Into<String>,
        context_id: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            operation_id: operation_id.into(),
            context_id: context_id.into(),
            created_at,
        }
    }
}

/// On-disk form of a pending operation, keyed by operation id.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredOperation {
    context_id: String,
    created_at: DateTime<Utc>,
}

/// Shared handle to the set of pending operations.
///
/// Clones refer to the same set. The lock is only held for the duration
/// of each method call.
#[derive(Debug, Clone, Default)]
pub struct PendingOperations {
    operations: Arc<RwLock<HashMap<String, PendingOperation>>>,
}

impl PendingOperations {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a pending operation, replacing any with the same id.
    pub async fn insert(&self, operation: PendingOperation) {
        debug!(
            "Tracking operation {} for context {}",
            operation.operation_id, operation.context_id
        );
        self.operations
            .write()
            .await
            .insert(operation.operation_id.clone(), operation);
    }

    /// Get a pending operation by id.
    pub async fn get(&self, operation_id: &str) -> Option<PendingOperation> {
        self.operations.read().await.get(operation_id).cloned()
    }

    /// Check whether an operation is pending.
    pub async fn contains(&self, operation_id: &str) -> bool {
        self.operations.read().await.contains_key(operation_id)
    }

    /// Remove the given operations, returning the ones that were present.
    pub async fn remove_all(&self, operation_ids: &[String]) -> Vec<PendingOperation> {
        let mut operations = self.operations.write().await;
        operation_ids
            .iter()
            .filter_map(|id| operations.remove(id))
            .collect()
    }

    /// Copy of every pending operation, oldest first.
    pub async fn snapshot(&self) -> Vec<PendingOperation> {
        let mut snapshot: Vec<PendingOperation> =
            self.operations.read().await.values().cloned().collect();
        snapshot.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.operation_id.cmp(&b.operation_id))
        });
        snapshot
    }

    /// Number of pending operations.
    pub async fn len(&self) -> usize {
        self.operations.read().await.len()
    }

    /// Whether nothing is pending.
    pub async fn is_empty(&self) -> bool {
        self.operations.read().await.is_empty()
    }

    /// Serialize as `{ "<operation id>": { "contextId", "createdAt" } }`.
    pub async fn to_json(&self) -> Result<String> {
        let operations = self.operations.read().await;
        let stored: HashMap<&str, StoredOperation> = operations
            .values()
            .map(|op| {
                (
                    op.operation_id.as_str(),
                    StoredOperation {
                        context_id: op.context_id.clone(),
                        created_at: op.created_at,
                    },
                )
            })
            .collect();
        Ok(serde_json::to_string_pretty(&stored)?)
    }

    /// Rebuild from [`PendingOperations::to_json`] output.
    pub fn from_json(json: &str) -> Result<Self> {
        let stored: HashMap<String, StoredOperation> = serde_json::from_str(json)?;
        let operations = stored
            .into_iter()
            .map(|(id, op)| {
                let operation = PendingOperation::new(id.clone(), op.context_id, op.created_at);
                (id, operation)
            })
            .collect();

        Ok(Self {
            operations: Arc::new(RwLock::new(operations)),
        })
    }

    /// Load from disk. A missing file yields an empty set.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let exists = fs::try_exists(path)
            .await
            .map_err(|e| StorageError::ReadFile(format!("{}: {e}", path.display())))?;
        if !exists {
            return Ok(Self::new());
        }

        let content = fs::read_to_string(path)
            .await
            .map_err(|e| StorageError::ReadFile(format!("{}: {e}", path.display())))?;

        let pending = Self::from_json(&content)?;
        info!(
            "Loaded {} pending operations from {}",
            pending.len().await,
            path.display()
        );
        Ok(pending)
    }

    /// Save to disk, replacing the file atomically.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = self.to_json().await?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::CreateDirectory(format!("{}: {e}", parent.display())))?;
        }

        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, &content)
            .await
            .map_err(|e| StorageError::WriteFile(format!("{}: {e}", temp_path.display())))?;

        fs::rename(&temp_path, path)
            .await
            .map_err(|e| StorageError::WriteFile(format!("{}: {e}", path.display())))?;

        debug!("Saved pending operations to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_remove() {
        let pending = PendingOperations::new();
        pending.insert(PendingOperation::new("op-1", "event-1", at(1))).await;
        pending.insert(PendingOperation::new("op-2", "event-2", at(2))).await;

        assert!(pending.contains("op-1").await);
        assert_eq!(pending.len().await, 2);

        let removed = pending
            .remove_all(&["op-1".to_string(), "op-missing".to_string()])
            .await;
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].context_id, "event-1");
        assert!(!pending.contains("op-1").await);
    }

    #[tokio::test]
    async fn test_snapshot_is_detached_and_ordered() {
        let pending = PendingOperations::new();
        pending.insert(PendingOperation::new("late", "e", at(5))).await;
        pending.insert(PendingOperation::new("early", "e", at(1))).await;

        let snapshot = pending.snapshot().await;
        pending.insert(PendingOperation::new("new", "e", at(0))).await;

        let ids: Vec<&str> = snapshot.iter().map(|op| op.operation_id.as_str()).collect();
        assert_eq!(ids, vec!["early", "late"]);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let pending = PendingOperations::new();
        let handle = pending.clone();
        handle.insert(PendingOperation::new("op", "ctx", at(1))).await;
        assert!(pending.contains("op").await);
    }

    #[tokio::test]
    async fn test_json_shape() {
        let pending = PendingOperations::new();
        pending.insert(PendingOperation::new("op-1", "42", at(3))).await;

        let value: serde_json::Value =
            serde_json::from_str(&pending.to_json().await.unwrap()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "op-1": { "contextId": "42", "createdAt": "2024-03-01T03:00:00Z" }
            })
        );
    }

    #[tokio::test]
    async fn test_persistence() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state/pending.json");

        {
            let pending = PendingOperations::new();
            pending
                .insert(PendingOperation::new("op-1", "event-9", at(4)))
                .await;
            pending.save(&path).await.unwrap();
        }

        let loaded = PendingOperations::load(&path).await.unwrap();
        let op = loaded.get("op-1").await.unwrap();
        assert_eq!(op, PendingOperation::new("op-1", "event-9", at(4)));
        assert_eq!(op.created_at + Duration::hours(1), at(5));
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let loaded = PendingOperations::load(temp_dir.path().join("none.json"))
            .await
            .unwrap();
        assert!(loaded.is_empty().await);
    }
}
