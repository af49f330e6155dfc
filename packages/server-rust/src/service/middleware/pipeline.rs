//! Pipeline composition: combines all middleware layers into a single service stack.

use tower::util::BoxCloneService;
use tower::ServiceBuilder;

use super::metrics::MetricsLayer;
use super::timeout::TimeoutLayer;
use crate::service::operation::{ActionRequest, CommitOutcome, WrapperError};
use crate::service::router::InvocationService;

/// Type-erased action pipeline shared by the entry point.
pub type ActionPipeline = BoxCloneService<ActionRequest, CommitOutcome, WrapperError>;

/// Build the action pipeline by wrapping the `InvocationService` with middleware layers.
///
/// Layer order (outermost to innermost):
/// 1. `MetricsLayer` -- record timing and outcome, including timeouts
/// 2. `TimeoutLayer` -- enforce the per-action timeout
#[must_use]
pub fn build_action_pipeline(service: InvocationService) -> ActionPipeline {
    BoxCloneService::new(
        ServiceBuilder::new()
            .layer(MetricsLayer)
            .layer(TimeoutLayer)
            .service(service),
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use tower::ServiceExt;
    use wrapper_core::RequestContext;

    use super::*;
    use crate::backend::{MemoryBackend, QueueBehavior};
    use crate::params::{MemoryParameterStore, ParameterLoader};
    use crate::service::config::{CommitQueueConfig, WrapperConfig};
    use crate::service::orchestrator::OperationOrchestrator;
    use crate::service::registry::HandlerRegistry;
    use crate::template::{MemoryTemplateEngine, Template, TemplateEdit};

    fn pipeline(backend: &MemoryBackend, queue_timeout: Option<std::time::Duration>) -> ActionPipeline {
        let store = MemoryParameterStore::new();
        store.insert(
            "dns-1",
            serde_json::from_value(json!({"operationType": "create", "device": "r1"})).unwrap(),
        );
        let config = WrapperConfig {
            commit_queue: CommitQueueConfig {
                enabled: true,
                timeout: queue_timeout,
            },
            ..WrapperConfig::default()
        };
        build_action_pipeline(InvocationService::new(
            ParameterLoader::new(Arc::new(store)),
            Arc::new(HandlerRegistry::empty()),
            OperationOrchestrator::new(Arc::new(backend.clone()), Arc::new(config)),
        ))
    }

    fn backend() -> MemoryBackend {
        let engine = MemoryTemplateEngine::new().with_template(
            "dns-create",
            Template::new(vec![TemplateEdit::set(
                "/devices/device/{$device}/config/dns",
                "8.8.8.8",
            )]),
        );
        MemoryBackend::new(Arc::new(engine))
    }

    fn req(timeout_ms: u64) -> ActionRequest {
        ActionRequest {
            call_id: 9,
            service_name: "dns".to_string(),
            operation_id: "1".to_string(),
            caller: RequestContext::for_caller("admin"),
            timeout_ms,
        }
    }

    #[tokio::test]
    async fn pipeline_routes_through_all_layers() {
        let backend = backend();
        let outcome = pipeline(&backend, None).oneshot(req(5_000)).await.unwrap();
        assert!(matches!(outcome, CommitOutcome::AppliedViaQueue { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn action_timeout_releases_transaction() {
        let backend = backend().with_queue_behavior(QueueBehavior::Stall);
        let err = pipeline(&backend, None).oneshot(req(1_000)).await.unwrap_err();

        assert!(matches!(err, WrapperError::ActionTimeout { timeout_ms: 1_000 }));
        assert_eq!(backend.stats().opened(), 1);
        assert_eq!(backend.stats().released(), 1);
    }
}
