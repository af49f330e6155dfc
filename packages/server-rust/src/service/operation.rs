//! Request, outcome and error types of the service operation pipeline.

use serde::{Deserialize, Serialize};
use wrapper_core::{ArgsError, OperationType, RequestContext};

use crate::backend::{DryRunOutput, QueueStatus};

/// Inbound invocation after the entry point has stamped it with a call id
/// and the invocation-scoped timeout.
#[derive(Debug, Clone)]
pub struct ActionRequest {
    pub call_id: u64,
    pub service_name: String,
    pub operation_id: String,
    pub caller: RequestContext,
    pub timeout_ms: u64,
}

/// Result of driving a transaction to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Plain commit succeeded.
    Applied,
    /// Commit went through the commit queue and the item completed, or there
    /// was nothing to queue (`queue_id` is then 0).
    AppliedViaQueue { queue_id: u64 },
    /// Validation only: per-device rendered configuration, nothing persisted.
    DryRun(DryRunOutput),
}

impl CommitOutcome {
    /// Short label for logs and metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::AppliedViaQueue { .. } => "applied_via_queue",
            Self::DryRun(_) => "dry_run",
        }
    }
}

/// Output of the action: exactly one of `success` or `failure`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionResponse {
    Success(String),
    Failure(String),
}

impl ActionResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Success(m) | Self::Failure(m) => m,
        }
    }
}

/// Classified failure of a single invocation.
///
/// Stays a structured value until the action entry point renders it.
#[derive(Debug, thiserror::Error)]
pub enum WrapperError {
    #[error("no service parameters found for key {key}")]
    NotFound { key: String },
    #[error(transparent)]
    Arguments(#[from] ArgsError),
    #[error("parameter store unavailable: {0:#}")]
    ParameterStoreUnavailable(#[source] anyhow::Error),
    #[error("{operation} handler for service {service} failed: {source:#}")]
    Handler {
        service: String,
        operation: OperationType,
        #[source]
        source: anyhow::Error,
    },
    #[error("commit queue item {queue_id} did not complete in time")]
    CommitQueueTimeout { queue_id: u64 },
    #[error("commit queue item {queue_id} finished with status {status}")]
    CommitQueueFailed { queue_id: u64, status: QueueStatus },
    #[error("configuration backend unavailable: {0:#}")]
    BackendUnavailable(#[source] anyhow::Error),
    #[error("operation timed out after {timeout_ms}ms")]
    ActionTimeout { timeout_ms: u64 },
}

impl WrapperError {
    /// Short label for logs and metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Arguments(_) => "invalid_arguments",
            Self::ParameterStoreUnavailable(_) => "parameter_store_unavailable",
            Self::Handler { .. } => "handler_error",
            Self::CommitQueueTimeout { .. } => "commit_queue_timeout",
            Self::CommitQueueFailed { .. } => "commit_queue_failed",
            Self::BackendUnavailable(_) => "backend_unavailable",
            Self::ActionTimeout { .. } => "action_timeout",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_response_serializes_as_single_field() {
        let ok = serde_json::to_value(ActionResponse::Success("done".into())).unwrap();
        assert_eq!(ok, serde_json::json!({"success": "done"}));
        let err = serde_json::to_value(ActionResponse::Failure("boom".into())).unwrap();
        assert_eq!(err, serde_json::json!({"failure": "boom"}));
    }

    #[test]
    fn error_messages_are_descriptive() {
        let err = WrapperError::CommitQueueFailed {
            queue_id: 7,
            status: QueueStatus::Failed,
        };
        assert_eq!(
            err.to_string(),
            "commit queue item 7 finished with status failed (5)"
        );

        let err = WrapperError::Handler {
            service: "loopback".into(),
            operation: OperationType::Delete,
            source: anyhow::anyhow!("device rtr9 unknown"),
        };
        assert_eq!(
            err.to_string(),
            "delete handler for service loopback failed: device rtr9 unknown"
        );
    }

    #[test]
    fn argument_errors_pass_through_transparently() {
        let err = WrapperError::from(ArgsError::MissingField {
            field: "operationType",
        });
        assert_eq!(err.to_string(), "missing mandatory field: operationType");
        assert_eq!(err.kind(), "invalid_arguments");
    }
}
