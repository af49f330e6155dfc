//! Metrics middleware for actions.
//!
//! Wraps every action in a `tracing` span carrying its duration and outcome,
//! and records the `metrics` counter and histogram below.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use tower::{Layer, Service};
use tracing::{info_span, Instrument};

use crate::service::operation::{ActionRequest, CommitOutcome, WrapperError};

pub const ACTIONS_TOTAL: &str = "wrapper_actions_total";
pub const ACTION_DURATION: &str = "wrapper_action_duration_seconds";

/// Registers metric descriptions with the installed recorder.
pub fn describe_metrics() {
    describe_counter!(ACTIONS_TOTAL, "Service actions completed, by outcome");
    describe_histogram!(ACTION_DURATION, "Duration of service actions in seconds");
}

// ---------------------------------------------------------------------------
// MetricsLayer
// ---------------------------------------------------------------------------

/// Tower layer that instruments actions with timing and counting.
#[derive(Debug, Clone)]
pub struct MetricsLayer;

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsService { inner }
    }
}

// ---------------------------------------------------------------------------
// MetricsService
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MetricsService<S> {
    inner: S,
}

impl<S> Service<ActionRequest> for MetricsService<S>
where
    S: Service<ActionRequest, Response = CommitOutcome, Error = WrapperError> + Send,
    S::Future: Send + 'static,
{
    type Response = CommitOutcome;
    type Error = WrapperError;
    type Future = Pin<Box<dyn Future<Output = Result<CommitOutcome, WrapperError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: ActionRequest) -> Self::Future {
        let call_id = req.call_id;
        let span = info_span!(
            "action",
            call_id,
            service = %req.service_name,
            operation_id = %req.operation_id,
            caller = %req.caller.username(),
            trace_id = %req.caller.trace_id,
            duration_ms = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );

        let fut = self.inner.call(req);

        Box::pin(
            async move {
                let start = Instant::now();
                let result = fut.await;
                let elapsed = start.elapsed();

                let outcome = match &result {
                    Ok(outcome) => outcome.kind(),
                    Err(e) => e.kind(),
                };

                #[allow(clippy::cast_possible_truncation)]
                let duration_ms = elapsed.as_millis() as u64;
                tracing::Span::current().record("duration_ms", duration_ms);
                tracing::Span::current().record("outcome", outcome);

                counter!(ACTIONS_TOTAL, "outcome" => outcome).increment(1);
                histogram!(ACTION_DURATION).record(elapsed.as_secs_f64());

                tracing::info!(call_id, duration_ms, outcome, "action complete");

                result
            }
            .instrument(span),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
