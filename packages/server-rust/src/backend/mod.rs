//! Configuration transactional backend contracts.
//!
//! The orchestrator never talks to a concrete datastore. It opens a
//! [`Transaction`] through a [`ConfigBackend`], lets the service handler edit
//! configuration through a [`ConfigRoot`], and then drives the transaction to
//! one of three terminal states: committed, committed through the commit
//! queue, or dry-run evaluated. [`MemoryBackend`] is the in-process
//! implementation used by tests and the test server.

pub mod memory;
pub mod path;
pub mod root;

pub use memory::{BackendStats, MemoryBackend, QueueBehavior};
pub use path::ConfigPath;
pub use root::ConfigRoot;

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use wrapper_core::Value;

use crate::template::TemplateVariables;

/// Access mode requested when opening a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionMode {
    Read,
    ReadWrite,
}

/// Flags passed to [`Transaction::commit`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitFlags {
    /// Push device changes through the commit queue and allow the caller to
    /// wait for the queue item with [`Transaction::commit_queue_result`].
    pub sync_commit_queue: bool,
}

impl CommitFlags {
    /// Flags for a plain synchronous commit.
    #[must_use]
    pub fn plain() -> Self {
        Self::default()
    }

    /// Flags for a commit that goes through the commit queue.
    #[must_use]
    pub fn commit_queue() -> Self {
        Self {
            sync_commit_queue: true,
        }
    }
}

/// Status of a commit-queue item as reported by the backend.
///
/// Numeric codes follow the platform's commit-queue result encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueStatus {
    /// Nothing was queued (the transaction had no device changes).
    None,
    /// Item is still queued or executing.
    Async,
    /// Item was applied on all devices.
    Completed,
    /// The wait bound expired before the item reached a terminal state.
    Timeout,
    /// Item was removed from the queue before completing.
    Deleted,
    /// Item failed on at least one device.
    Failed,
}

impl QueueStatus {
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            Self::None => 0,
            Self::Async => 1,
            Self::Completed => 2,
            Self::Timeout => 3,
            Self::Deleted => 4,
            Self::Failed => 5,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Async => "async",
            Self::Completed => "completed",
            Self::Timeout => "timeout",
            Self::Deleted => "deleted",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.as_str(), self.code())
    }
}

/// Result of waiting on a commit-queue item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueResult {
    /// Queue item identifier. Zero when nothing was queued.
    pub queue_id: u64,
    pub status: QueueStatus,
}

/// Per-device configuration text produced by a dry-run, keyed by device name.
pub type DryRunOutput = BTreeMap<String, String>;

// ---------------------------------------------------------------------------
// ConfigBackend
// ---------------------------------------------------------------------------

/// Entry point to the configuration datastore.
///
/// Used as `Arc<dyn ConfigBackend>`.
#[async_trait]
pub trait ConfigBackend: Send + Sync {
    /// Open a transaction on behalf of `identity` within the given user context.
    async fn open_transaction(
        &self,
        identity: &str,
        context: &str,
        mode: TransactionMode,
    ) -> anyhow::Result<Box<dyn Transaction>>;
}

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// A single configuration transaction, exclusively owned by one invocation.
///
/// Edits are invisible to other transactions until [`commit`](Self::commit)
/// succeeds. [`release`](Self::release) must be called exactly once when the
/// owner is done, whatever the outcome.
#[async_trait]
pub trait Transaction: Send + Sync {
    /// Backend-assigned transaction handle.
    fn id(&self) -> u64;

    /// Read a leaf value. Returns `None` if the node does not exist.
    async fn get(&self, path: &ConfigPath) -> anyhow::Result<Option<Value>>;

    /// Check whether the node or any descendant exists.
    async fn exists(&self, path: &ConfigPath) -> anyhow::Result<bool>;

    /// Set a leaf value, creating the node if needed.
    async fn set(&mut self, path: &ConfigPath, value: Value) -> anyhow::Result<()>;

    /// Create a container or list entry without a value.
    async fn create(&mut self, path: &ConfigPath) -> anyhow::Result<()>;

    /// Delete a node and all of its descendants. Deleting a missing node is a no-op.
    async fn delete(&mut self, path: &ConfigPath) -> anyhow::Result<()>;

    /// Render a named template with `context` as its context node and apply
    /// the result to this transaction.
    async fn apply_template(
        &mut self,
        name: &str,
        context: &ConfigPath,
        vars: &TemplateVariables,
    ) -> anyhow::Result<()>;

    /// Apply the transaction.
    ///
    /// Returns the id of the commit-queue item created by a queued commit, or
    /// `None` when nothing was queued.
    async fn commit(&mut self, flags: CommitFlags) -> anyhow::Result<Option<u64>>;

    /// Evaluate the transaction without persisting it.
    async fn commit_dry_run(&mut self) -> anyhow::Result<DryRunOutput>;

    /// Wait for the commit-queue item created by the last queued commit.
    ///
    /// `timeout` of `None` waits without bound. Implementations report an
    /// expired bound as [`QueueStatus::Timeout`].
    async fn commit_queue_result(&mut self, timeout: Option<Duration>)
        -> anyhow::Result<QueueResult>;

    /// Discard all pending edits. A no-op after a successful commit.
    async fn abort(&mut self) -> anyhow::Result<()>;

    /// Release the transaction handle. Synchronous so it can run from `Drop`.
    fn release(&mut self);
}
