//! The operation tracker state machine.
//!
//! ```text
//!   submit ──► Submitted ──poll──► Completed   (result reported, removed)
//!                 │  ▲     └────► Failed      (logged, removed)
//!                 │  └─ Pending
//!                 └──── age > ttl ──► Expired (removed, reported)
//! ```
//!
//! Every tick works on a snapshot taken before the first poll. Operations
//! submitted while a tick is in progress are first seen by the next tick.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use crate::pending::{PendingOperation, PendingOperations};
use crate::provider::{
    CompletionParams, CompletionProvider, CompletionResult, OperationOutcome, Prompt,
};

/// How long an operation may stay pending before it is dropped.
pub const DEFAULT_TTL_HOURS: i64 = 24;

/// Answers whether the originating request of an operation still exists.
pub trait ContextLookup {
    /// Whether `context_id` refers to a known context.
    fn contains_context(&self, context_id: &str) -> bool;
}

impl ContextLookup for HashSet<String> {
    fn contains_context(&self, context_id: &str) -> bool {
        self.contains(context_id)
    }
}

impl ContextLookup for BTreeSet<String> {
    fn contains_context(&self, context_id: &str) -> bool {
        self.contains(context_id)
    }
}

impl<V> ContextLookup for HashMap<String, V> {
    fn contains_context(&self, context_id: &str) -> bool {
        self.contains_key(context_id)
    }
}

impl<V> ContextLookup for BTreeMap<String, V> {
    fn contains_context(&self, context_id: &str) -> bool {
        self.contains_key(context_id)
    }
}

/// Treats every context as known.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyContext;

impl ContextLookup for AnyContext {
    fn contains_context(&self, _context_id: &str) -> bool {
        true
    }
}

/// An operation that finished with a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedOperation {
    pub operation_id: String,
    pub context_id: String,
    pub result: CompletionResult,
}

/// An operation that finished with an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedOperation {
    pub operation_id: String,
    pub context_id: String,
    pub message: String,
}

/// Everything that happened during one tick.
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    /// Operations that completed; these carry the results to emit.
    pub completed: Vec<CompletedOperation>,

    /// Operations the provider reported as failed.
    pub failed: Vec<FailedOperation>,

    /// Operations dropped for exceeding the TTL.
    pub expired: Vec<PendingOperation>,

    /// Operation ids not polled because their context is gone.
    pub skipped: Vec<String>,

    /// Operations still pending after the tick.
    pub remaining: usize,
}

impl TickReport {
    /// Whether the tick changed nothing.
    pub fn is_quiet(&self) -> bool {
        self.completed.is_empty() && self.failed.is_empty() && self.expired.is_empty()
    }
}

/// Submits completions and follows them to a final state.
///
/// The host must not run `tick` concurrently with another `tick` on the
/// same pending set. A `submit` racing a `tick` is fine.
pub struct OperationTracker<P> {
    provider: P,
    pending: PendingOperations,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl<P> OperationTracker<P>
where
    P: CompletionProvider,
{
    /// Create a tracker with an empty pending set.
    pub fn new(provider: P) -> Self {
        Self::with_pending(provider, PendingOperations::new())
    }

    /// Create a tracker over an existing (e.g. loaded) pending set.
    pub fn with_pending(provider: P, pending: PendingOperations) -> Self {
        Self {
            provider,
            pending,
            clock: Arc::new(SystemClock),
            ttl: Duration::hours(DEFAULT_TTL_HOURS),
        }
    }

    /// Use another time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Override the time-to-live of pending operations.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// The underlying provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Handle to the pending set.
    pub fn pending(&self) -> &PendingOperations {
        &self.pending
    }

    /// The time-to-live of pending operations.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Submit a prompt on behalf of `context_id`.
    ///
    /// Nothing is recorded when the provider rejects the submission.
    pub async fn submit(
        &self,
        prompt: &Prompt,
        params: &CompletionParams,
        context_id: impl Into<String>,
    ) -> Result<String> {
        let context_id = context_id.into();

        let operation_id = match self.provider.submit(prompt, params).await {
            Ok(id) => id,
            Err(e) => {
                error!("Failed to submit completion for context {context_id}: {e}");
                return Err(e);
            }
        };

        self.pending
            .insert(PendingOperation::new(
                operation_id.clone(),
                context_id.clone(),
                self.clock.now(),
            ))
            .await;
        info!("Saved operation {operation_id} for context {context_id}");

        Ok(operation_id)
    }

    /// Poll every pending operation once and drop the expired ones.
    pub async fn tick<C>(&self, contexts: &C) -> TickReport
    where
        C: ContextLookup + ?Sized,
    {
        let snapshot = self.pending.snapshot().await;
        let mut report = TickReport::default();
        let mut finished: HashSet<String> = HashSet::new();

        for operation in &snapshot {
            let id = &operation.operation_id;

            if !contexts.contains_context(&operation.context_id) {
                debug!(
                    "Context {} of operation {id} is gone, not polling",
                    operation.context_id
                );
                report.skipped.push(id.clone());
                continue;
            }

            match self.provider.poll(id).await {
                Ok(OperationOutcome::Pending) => {}
                Ok(OperationOutcome::Completed(result)) => {
                    info!(
                        "Operation {id} completed for context {}",
                        operation.context_id
                    );
                    finished.insert(id.clone());
                    report.completed.push(CompletedOperation {
                        operation_id: id.clone(),
                        context_id: operation.context_id.clone(),
                        result,
                    });
                }
                Ok(OperationOutcome::Failed(message)) => {
                    error!("Operation {id} failed: {message}");
                    finished.insert(id.clone());
                    report.failed.push(FailedOperation {
                        operation_id: id.clone(),
                        context_id: operation.context_id.clone(),
                        message,
                    });
                }
                Err(e) => warn!("Failed to check operation {id}: {e}"),
            }
        }

        let finished_ids: Vec<String> = finished.iter().cloned().collect();
        self.pending.remove_all(&finished_ids).await;

        let now = self.clock.now();
        let expired: Vec<String> = snapshot
            .iter()
            .filter(|op| !finished.contains(&op.operation_id))
            .filter(|op| now - op.created_at > self.ttl)
            .map(|op| op.operation_id.clone())
            .collect();
        report.expired = self.pending.remove_all(&expired).await;

        for operation in &report.expired {
            warn!(
                "Dropping operation {} for context {}: pending since {}",
                operation.operation_id, operation.context_id, operation.created_at
            );
        }

        report.remaining = self.pending.len().await;
        debug!(
            "Tick done: {} completed, {} failed, {} expired, {} remaining",
            report.completed.len(),
            report.failed.len(),
            report.expired.len(),
            report.remaining
        );

        report
    }
}
