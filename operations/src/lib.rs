//! # Operations
//!
//! Tracking of long-running remote completions for yagent.
//!
//! A completion is submitted once and answered later: the service returns
//! an operation id which has to be polled until it is done. This crate
//! keeps the set of pending operations, polls them on every tick, hands
//! back finished results together with the context they belong to, and
//! drops operations that stay pending for longer than a day.
//!
//! ## Components
//!
//! - **[`OperationTracker`]**: submit / tick state machine
//! - **[`PendingOperations`]**: the persisted pending set
//! - **[`CompletionProvider`]**: remote service contract, implemented by
//!   [`YandexGptClient`]
//! - **[`Clock`]**: time source for submission timestamps and expiry

pub mod clock;
pub mod error;
pub mod pending;
pub mod provider;
pub mod tracker;
pub mod yandex;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{OperationError, Result, StorageError};
pub use pending::{PendingOperation, PendingOperations};
pub use provider::{
    Alternative, CompletionParams, CompletionProvider, CompletionResult, Message,
    OperationOutcome, Prompt, Usage,
};
pub use tracker::{
    AnyContext, CompletedOperation, ContextLookup, DEFAULT_TTL_HOURS, FailedOperation,
    OperationTracker, TickReport,
};
pub use yandex::YandexGptClient;
