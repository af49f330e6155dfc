//! Drives one service operation through a configuration transaction.
//!
//! The orchestrator opens a read/write transaction as the caller, hands the
//! configuration root to the service handler, then settles the transaction:
//! dry-run for validation requests, a queued commit when the commit queue is
//! enabled, a plain commit otherwise. The transaction lives in a
//! [`TransactionGuard`] so it is released exactly once on every path,
//! including when the invocation future is dropped by an outer timeout.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use wrapper_core::{OperationType, RequestContext, ServiceArguments};

use super::config::WrapperConfig;
use super::handler::{HandlerContext, ServiceHandler};
use super::operation::{CommitOutcome, WrapperError};
use crate::backend::{
    CommitFlags, ConfigBackend, ConfigRoot, QueueResult, QueueStatus, Transaction,
    TransactionMode,
};

/// Slack added to the commit-queue bound before the orchestrator stops
/// waiting on a backend that does not honour the bound itself.
const QUEUE_WAIT_GRACE: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// TransactionGuard
// ---------------------------------------------------------------------------

/// Owns an open transaction and releases it when dropped.
pub struct TransactionGuard {
    txn: Box<dyn Transaction>,
}

impl TransactionGuard {
    #[must_use]
    pub fn new(txn: Box<dyn Transaction>) -> Self {
        Self { txn }
    }

    pub fn transaction(&mut self) -> &mut dyn Transaction {
        self.txn.as_mut()
    }

    /// Discards pending edits. Failures are logged; the caller is already
    /// on an error path.
    pub async fn abort(&mut self) {
        if let Err(e) = self.txn.abort().await {
            warn!(txn = self.txn.id(), error = %e, "failed to abort transaction");
        }
    }
}

impl Drop for TransactionGuard {
    fn drop(&mut self) {
        debug!(txn = self.txn.id(), "releasing transaction");
        self.txn.release();
    }
}

// ---------------------------------------------------------------------------
// OperationOrchestrator
// ---------------------------------------------------------------------------

/// Runs service handlers inside backend transactions.
#[derive(Clone)]
pub struct OperationOrchestrator {
    backend: Arc<dyn ConfigBackend>,
    config: Arc<WrapperConfig>,
}

impl OperationOrchestrator {
    #[must_use]
    pub fn new(backend: Arc<dyn ConfigBackend>, config: Arc<WrapperConfig>) -> Self {
        Self { backend, config }
    }

    /// Applies `args.operation_type()` through `handler` on behalf of `caller`.
    ///
    /// # Errors
    ///
    /// - `BackendUnavailable` if the transaction cannot be opened, committed
    ///   or dry-run
    /// - `Handler` if the handler fails; the transaction is aborted
    /// - `CommitQueueTimeout` / `CommitQueueFailed` for commit-queue outcomes
    pub async fn invoke(
        &self,
        handler: &dyn ServiceHandler,
        args: &ServiceArguments,
        caller: &RequestContext,
    ) -> Result<CommitOutcome, WrapperError> {
        let txn = self
            .backend
            .open_transaction(
                caller.username(),
                &self.config.transaction_context,
                TransactionMode::ReadWrite,
            )
            .await
            .map_err(WrapperError::BackendUnavailable)?;
        let mut guard = TransactionGuard::new(txn);

        let operation = args.operation_type();
        let ctx = HandlerContext {
            request: caller,
            args,
            none_placeholder: &self.config.none_placeholder,
        };

        let dispatched = {
            let mut root = ConfigRoot::new(guard.transaction());
            match operation {
                OperationType::Create => handler.create(&ctx, &mut root).await,
                OperationType::Modify => handler.modify(&ctx, &mut root).await,
                OperationType::Delete => handler.delete(&ctx, &mut root).await,
            }
        };
        if let Err(source) = dispatched {
            guard.abort().await;
            return Err(WrapperError::Handler {
                service: args.service_name().to_string(),
                operation,
                source,
            });
        }

        if args.validate_only() {
            return Self::dry_run(&mut guard).await;
        }
        if self.config.commit_queue.enabled {
            self.commit_via_queue(&mut guard).await
        } else {
            Self::commit_plain(&mut guard).await
        }
    }

    async fn dry_run(guard: &mut TransactionGuard) -> Result<CommitOutcome, WrapperError> {
        let result = guard.transaction().commit_dry_run().await;
        guard.abort().await;
        let output = result.map_err(WrapperError::BackendUnavailable)?;
        debug!(devices = output.len(), "dry-run evaluated");
        Ok(CommitOutcome::DryRun(output))
    }

    async fn commit_plain(guard: &mut TransactionGuard) -> Result<CommitOutcome, WrapperError> {
        if let Err(e) = guard.transaction().commit(CommitFlags::plain()).await {
            guard.abort().await;
            return Err(WrapperError::BackendUnavailable(e));
        }
        Ok(CommitOutcome::Applied)
    }

    async fn commit_via_queue(
        &self,
        guard: &mut TransactionGuard,
    ) -> Result<CommitOutcome, WrapperError> {
        let queued = match guard.transaction().commit(CommitFlags::commit_queue()).await {
            Ok(queued) => queued,
            Err(e) => {
                guard.abort().await;
                return Err(WrapperError::BackendUnavailable(e));
            }
        };

        let bound = self.config.commit_queue.timeout;
        let wait = guard.transaction().commit_queue_result(bound);
        let QueueResult { queue_id, status } = match bound {
            Some(bound) => match tokio::time::timeout(bound + QUEUE_WAIT_GRACE, wait).await {
                Ok(result) => result.map_err(WrapperError::BackendUnavailable)?,
                Err(_elapsed) => {
                    let queue_id = queued.unwrap_or_default();
                    warn!(queue_id, ?bound, "backend did not answer commit queue wait");
                    return Err(WrapperError::CommitQueueTimeout { queue_id });
                }
            },
            None => wait.await.map_err(WrapperError::BackendUnavailable)?,
        };

        match status {
            QueueStatus::Completed | QueueStatus::None => {
                info!(queue_id, %status, "commit queue item settled");
                Ok(CommitOutcome::AppliedViaQueue { queue_id })
            }
            QueueStatus::Timeout => {
                warn!(queue_id, "commit queue item timed out");
                Err(WrapperError::CommitQueueTimeout { queue_id })
            }
            QueueStatus::Async | QueueStatus::Deleted | QueueStatus::Failed => {
                warn!(queue_id, %status, "commit queue item failed");
                Err(WrapperError::CommitQueueFailed { queue_id, status })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
