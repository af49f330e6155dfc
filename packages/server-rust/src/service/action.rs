//! Action entry point: turns an invocation into a user-facing message.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tower::ServiceExt;
use tracing::error;
use uuid::Uuid;
use wrapper_core::RequestContext;

use super::config::WrapperConfig;
use super::middleware::ActionPipeline;
use super::operation::{ActionRequest, ActionResponse, CommitOutcome, WrapperError};

pub const SUCCESS_MESSAGE: &str = "Service call completed successfully";
pub const FAILURE_PREFIX: &str = "An error occurred";

/// Receives `(service name, operation id, caller)` and always answers with
/// exactly one of success or failure. Never propagates errors.
pub struct ActionEntryPoint {
    /// Cloned per call; the mutex only makes the boxed service shareable.
    pipeline: Mutex<ActionPipeline>,
    config: Arc<WrapperConfig>,
    call_id_counter: AtomicU64,
}

impl ActionEntryPoint {
    #[must_use]
    pub fn new(pipeline: ActionPipeline, config: Arc<WrapperConfig>) -> Self {
        Self {
            pipeline: Mutex::new(pipeline),
            config,
            call_id_counter: AtomicU64::new(1),
        }
    }

    fn next_call_id(&self) -> u64 {
        self.call_id_counter.fetch_add(1, Ordering::Relaxed)
    }

    #[must_use]
    pub fn action_timeout(&self) -> Duration {
        self.config.action_timeout
    }

    /// Runs the action for `caller` with the configured action timeout and a
    /// fresh trace id.
    pub async fn handle(
        &self,
        service_name: &str,
        operation_id: &str,
        caller: &str,
    ) -> ActionResponse {
        self.handle_traced(service_name, operation_id, caller, Uuid::new_v4().to_string())
            .await
    }

    /// Like [`handle`](Self::handle) under a trace id chosen by the host,
    /// such as the HTTP request id.
    pub async fn handle_traced(
        &self,
        service_name: &str,
        operation_id: &str,
        caller: &str,
        trace_id: String,
    ) -> ActionResponse {
        let mut context = RequestContext::for_caller(caller);
        context.action.clone_from(&self.config.action_name);
        context.trace_id = trace_id;
        self.run(service_name, operation_id, context).await
    }

    async fn run(
        &self,
        service_name: &str,
        operation_id: &str,
        caller: RequestContext,
    ) -> ActionResponse {
        #[allow(clippy::cast_possible_truncation)]
        let timeout_ms = self.config.action_timeout.as_millis() as u64;
        let req = ActionRequest {
            call_id: self.next_call_id(),
            service_name: service_name.to_string(),
            operation_id: operation_id.to_string(),
            caller,
            timeout_ms,
        };

        let pipeline = self.pipeline.lock().clone();
        match pipeline.oneshot(req).await {
            Ok(outcome) => ActionResponse::Success(render_success(&outcome)),
            Err(e) => {
                error!(
                    service = service_name,
                    operation_id,
                    kind = e.kind(),
                    error = %e,
                    "service action failed"
                );
                ActionResponse::Failure(render_failure(&e))
            }
        }
    }
}

/// Success text; a dry-run appends its per-device output as a JSON object.
#[must_use]
pub fn render_success(outcome: &CommitOutcome) -> String {
    match outcome {
        CommitOutcome::DryRun(output) => match serde_json::to_string(output) {
            Ok(json) => format!("{SUCCESS_MESSAGE}: {json}"),
            Err(e) => {
                error!(error = %e, "failed to encode dry-run output");
                SUCCESS_MESSAGE.to_string()
            }
        },
        CommitOutcome::Applied | CommitOutcome::AppliedViaQueue { .. } => {
            SUCCESS_MESSAGE.to_string()
        }
    }
}

#[must_use]
pub fn render_failure(err: &WrapperError) -> String {
    format!("{FAILURE_PREFIX}: {err}")
}
