//! Innermost service of the action pipeline: parameters, handler, transaction.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tower::Service;
use tracing::debug;

use super::operation::{ActionRequest, CommitOutcome, WrapperError};
use super::orchestrator::OperationOrchestrator;
use super::registry::HandlerRegistry;
use crate::params::ParameterLoader;

type InvocationFuture = Pin<Box<dyn Future<Output = Result<CommitOutcome, WrapperError>> + Send>>;

/// Runs one [`ActionRequest`]: loads its arguments, resolves the handler for
/// its service and drives the operation through the orchestrator.
///
/// Cheap to clone; all state is shared and immutable.
#[derive(Clone)]
pub struct InvocationService {
    loader: ParameterLoader,
    registry: Arc<HandlerRegistry>,
    orchestrator: OperationOrchestrator,
}

impl InvocationService {
    #[must_use]
    pub fn new(
        loader: ParameterLoader,
        registry: Arc<HandlerRegistry>,
        orchestrator: OperationOrchestrator,
    ) -> Self {
        Self {
            loader,
            registry,
            orchestrator,
        }
    }
}

impl Service<ActionRequest> for InvocationService {
    type Response = CommitOutcome;
    type Error = WrapperError;
    type Future = InvocationFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ActionRequest) -> Self::Future {
        let this = self.clone();
        Box::pin(async move {
            let args = this
                .loader
                .load(&req.service_name, &req.operation_id)
                .await?;
            let handler = this.registry.resolve(args.service_name());
            debug!(
                call_id = req.call_id,
                key = %args.key(),
                custom = this.registry.contains(args.service_name()),
                handler = handler.service_name(),
                "resolved service handler"
            );
            this.orchestrator
                .invoke(handler.as_ref(), &args, &req.caller)
                .await
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
