//! Timeout middleware for actions.
//!
//! Rejects actions that exceed their `timeout_ms` with `WrapperError::ActionTimeout`.
//! Dropping the inner future on expiry releases any open transaction.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tower::{Layer, Service};

use crate::service::operation::{ActionRequest, CommitOutcome, WrapperError};

// ---------------------------------------------------------------------------
// TimeoutLayer
// ---------------------------------------------------------------------------

/// Tower layer that wraps services with per-action timeout enforcement.
///
/// The timeout is read from each request's `timeout_ms` field.
#[derive(Debug, Clone)]
pub struct TimeoutLayer;

impl<S> Layer<S> for TimeoutLayer {
    type Service = TimeoutService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TimeoutService { inner }
    }
}

// ---------------------------------------------------------------------------
// TimeoutService
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TimeoutService<S> {
    inner: S,
}

impl<S> Service<ActionRequest> for TimeoutService<S>
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
        let timeout_ms = req.timeout_ms;
        let fut = self.inner.call(req);
        Box::pin(async move {
            let duration = Duration::from_millis(timeout_ms);
            match tokio::time::timeout(duration, fut).await {
                Ok(result) => result,
                Err(_elapsed) => Err(WrapperError::ActionTimeout { timeout_ms }),
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use tower::ServiceExt;
    use wrapper_core::RequestContext;

    use super::*;

    /// Service that takes a configurable delay before responding.
    struct SlowService {
        delay_ms: u64,
    }

    impl Service<ActionRequest> for SlowService {
        type Response = CommitOutcome;
        type Error = WrapperError;
        type Future = Pin<Box<dyn Future<Output = Result<CommitOutcome, WrapperError>> + Send>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, _req: ActionRequest) -> Self::Future {
            let delay = self.delay_ms;
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                Ok(CommitOutcome::Applied)
            })
        }
    }

    fn make_req(timeout_ms: u64) -> ActionRequest {
        ActionRequest {
            call_id: 1,
            service_name: "test".to_string(),
            operation_id: "1".to_string(),
            caller: RequestContext::for_caller("admin"),
            timeout_ms,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn completes_within_timeout() {
        let svc = TimeoutLayer.layer(SlowService { delay_ms: 10 });
        let resp = svc.oneshot(make_req(1000)).await.unwrap();
        assert_eq!(resp, CommitOutcome::Applied);
    }

    #[tokio::test(start_paused = true)]
    async fn exceeds_timeout_returns_error() {
        let svc = TimeoutLayer.layer(SlowService { delay_ms: 200 });
        let err = svc.oneshot(make_req(50)).await.unwrap_err();
        assert!(matches!(err, WrapperError::ActionTimeout { timeout_ms: 50 }));
    }
}
