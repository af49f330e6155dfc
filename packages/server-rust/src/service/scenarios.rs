//! End-to-end action scenarios: entry point, pipeline, orchestrator and the
//! in-memory backend wired together the way the server wires them.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use wrapper_core::ParamRecord;

use super::action::{ActionEntryPoint, SUCCESS_MESSAGE};
use super::config::{CommitQueueConfig, WrapperConfig};
use super::handler::{HandlerContext, ServiceHandler};
use super::middleware::build_action_pipeline;
use super::operation::ActionResponse;
use super::orchestrator::OperationOrchestrator;
use super::registry::{HandlerRegistry, HandlerRegistryBuilder};
use super::router::InvocationService;
use crate::backend::{ConfigPath, ConfigRoot, MemoryBackend, QueueBehavior, QueueStatus};
use crate::params::{MemoryParameterStore, ParameterLoader};
use crate::template::{MemoryTemplateEngine, Template, TemplateEdit};

const LOOPBACK_PATH: &str = "/devices/device/{$deviceName}/config/interface/loopback/{$loopbackId}";

fn templates() -> MemoryTemplateEngine {
    MemoryTemplateEngine::new()
        .with_template(
            "loopback-create",
            Template::new(vec![
                TemplateEdit::set(format!("{LOOPBACK_PATH}/description"), "{$description}"),
                TemplateEdit::set("loopback/{$deviceName}/id", "{$loopbackId}"),
            ]),
        )
        .with_template(
            "loopback-delete",
            Template::new(vec![
                TemplateEdit::delete(LOOPBACK_PATH),
                TemplateEdit::delete("loopback/{$deviceName}"),
            ]),
        )
}

fn record(value: serde_json::Value) -> ParamRecord {
    serde_json::from_value(value).unwrap()
}

fn scenario_a() -> ParamRecord {
    record(json!({
        "operationType": "create",
        "deviceName": "rtr1",
        "description": "edge",
        "loopbackId": 0
    }))
}

struct Harness {
    backend: MemoryBackend,
    store: Arc<MemoryParameterStore>,
    entry: ActionEntryPoint,
}

fn harness(registry: HandlerRegistry, commit_queue: CommitQueueConfig) -> Harness {
    let backend = MemoryBackend::new(Arc::new(templates()));
    let store = Arc::new(MemoryParameterStore::new());
    let config = Arc::new(WrapperConfig {
        commit_queue,
        ..WrapperConfig::default()
    });
    let pipeline = build_action_pipeline(InvocationService::new(
        ParameterLoader::new(store.clone()),
        Arc::new(registry),
        OperationOrchestrator::new(Arc::new(backend.clone()), Arc::clone(&config)),
    ));
    Harness {
        backend,
        store,
        entry: ActionEntryPoint::new(pipeline, config),
    }
}

fn plain() -> Harness {
    harness(HandlerRegistry::empty(), CommitQueueConfig::default())
}

fn queued(behavior: QueueBehavior, timeout: Option<Duration>) -> Harness {
    let h = harness(
        HandlerRegistry::empty(),
        CommitQueueConfig {
            enabled: true,
            timeout,
        },
    );
    h.backend.set_queue_behavior(behavior);
    h
}

fn p(path: &str) -> ConfigPath {
    ConfigPath::parse(path)
}

// ---------------------------------------------------------------------------
// Default handler
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_renders_template_and_commits() {
    let h = plain();
    h.store.insert("loopback-1", scenario_a());

    let response = h.entry.handle("loopback", "1", "admin").await;

    assert_eq!(response, ActionResponse::Success(SUCCESS_MESSAGE.to_string()));
    assert_eq!(
        h.backend.get(&p("/devices/device/rtr1/config/interface/loopback/0/description")),
        Some("edge".into())
    );
    assert_eq!(h.backend.get(&p("/services/loopback/rtr1/id")), Some("0".into()));
    assert_eq!(h.backend.stats().commits(), 1);
    assert_eq!(h.backend.stats().released(), 1);
}

#[tokio::test]
async fn delete_applies_delete_template() {
    let h = plain();
    h.backend
        .seed(&p("/devices/device/rtr1/config/interface/loopback/0/description"), "edge");
    h.backend.seed(&p("/services/loopback/rtr1/id"), "0");
    h.store.insert(
        "loopback-2",
        record(json!({"operationType": "delete", "deviceName": "rtr1", "loopbackId": 0})),
    );

    let response = h.entry.handle("loopback", "2", "admin").await;

    assert!(response.is_success(), "{response:?}");
    assert!(h.backend.is_empty());
    assert_eq!(h.backend.stats().commits(), 1);
}

#[tokio::test]
async fn modify_behaves_like_create_for_default_handler() {
    let h = plain();
    let mut rec = scenario_a();
    rec.insert("operationType".to_string(), json!("modify"));
    h.store.insert("loopback-3", rec);

    let response = h.entry.handle("loopback", "3", "admin").await;

    assert!(response.is_success(), "{response:?}");
    assert_eq!(
        h.backend.get(&p("/devices/device/rtr1/config/interface/loopback/0/description")),
        Some("edge".into())
    );
}

#[tokio::test]
async fn validate_returns_dry_run_without_committing() {
    let h = queued(QueueBehavior::Complete, Some(Duration::from_secs(60)));
    let mut rec = scenario_a();
    rec.insert("validate".to_string(), json!("true"));
    h.store.insert("loopback-4", rec);

    let first = h.entry.handle("loopback", "4", "admin").await;
    let second = h.entry.handle("loopback", "4", "admin").await;

    let expected = format!(
        "{SUCCESS_MESSAGE}: {}",
        json!({"rtr1": "+ interface/loopback/0/description edge"})
    );
    assert_eq!(first, ActionResponse::Success(expected));
    assert_eq!(first, second);
    assert!(h.backend.is_empty());
    assert_eq!(h.backend.stats().dry_runs(), 2);
    assert_eq!(h.backend.stats().commits(), 0);
    assert_eq!(h.backend.stats().queued_commits(), 0);
    assert_eq!(h.backend.stats().released(), 2);
}

#[tokio::test]
async fn missing_record_reports_key() {
    let h = plain();

    let response = h.entry.handle("loopback", "99", "admin").await;

    assert_eq!(
        response,
        ActionResponse::Failure(
            "An error occurred: no service parameters found for key loopback-99".to_string()
        )
    );
    assert_eq!(h.backend.stats().opened(), 0);
}

#[tokio::test]
async fn missing_template_fails_and_releases() {
    let h = plain();
    h.store.insert(
        "vlan-1",
        record(json!({"operationType": "create", "vlanId": 10})),
    );

    let response = h.entry.handle("vlan", "1", "admin").await;

    assert!(!response.is_success());
    assert!(response.message().contains("template not found: vlan-create"), "{response:?}");
    assert_eq!(h.backend.stats().commits(), 0);
    assert_eq!(h.backend.stats().released(), 1);
}

// ---------------------------------------------------------------------------
// Custom handler
// ---------------------------------------------------------------------------

#[derive(Default)]
struct CountingLoopback {
    creates: AtomicUsize,
}

#[async_trait]
impl ServiceHandler for CountingLoopback {
    fn service_name(&self) -> &str {
        "loopback"
    }

    async fn create(&self, ctx: &HandlerContext<'_>, root: &mut ConfigRoot<'_>) -> anyhow::Result<()> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        let device = ctx.args.require("deviceName")?.to_string();
        let path = root.services().child("custom").child(device);
        root.set(&path, "seen").await
    }
}

#[tokio::test]
async fn modify_on_override_runs_custom_create_once() {
    let handler = Arc::new(CountingLoopback::default());
    let mut builder = HandlerRegistryBuilder::new();
    builder.register("loopback", handler.clone()).unwrap();
    let h = harness(builder.build(), CommitQueueConfig::default());
    let mut rec = scenario_a();
    rec.insert("operationType".to_string(), json!("modify"));
    h.store.insert("loopback-5", rec);

    let response = h.entry.handle("loopback", "5", "admin").await;

    assert!(response.is_success(), "{response:?}");
    assert_eq!(handler.creates.load(Ordering::SeqCst), 1);
    assert_eq!(h.backend.get(&p("/services/custom/rtr1")), Some("seen".into()));
    assert!(!h
        .backend
        .exists(&p("/devices/device/rtr1/config/interface/loopback/0/description")));
}

#[derive(Default)]
struct TraceRecorder {
    trace_id: parking_lot::Mutex<String>,
}

#[async_trait]
impl ServiceHandler for TraceRecorder {
    fn service_name(&self) -> &str {
        "loopback"
    }

    async fn create(&self, ctx: &HandlerContext<'_>, _root: &mut ConfigRoot<'_>) -> anyhow::Result<()> {
        ctx.request.trace_id.clone_into(&mut self.trace_id.lock());
        Ok(())
    }
}

#[tokio::test]
async fn host_trace_id_reaches_handler() {
    let handler = Arc::new(TraceRecorder::default());
    let mut builder = HandlerRegistryBuilder::new();
    builder.register("loopback", handler.clone()).unwrap();
    let h = harness(builder.build(), CommitQueueConfig::default());
    h.store.insert("loopback-6", scenario_a());

    let response = h
        .entry
        .handle_traced("loopback", "6", "admin", "req-6".to_string())
        .await;
    assert!(response.is_success(), "{response:?}");
    assert_eq!(*handler.trace_id.lock(), "req-6");

    h.entry.handle("loopback", "6", "admin").await;
    assert!(uuid::Uuid::parse_str(&handler.trace_id.lock()).is_ok());
}

// ---------------------------------------------------------------------------
// Commit queue
// ---------------------------------------------------------------------------

#[tokio::test]
async fn queued_commit_completes() {
    let h = queued(QueueBehavior::Complete, Some(Duration::from_secs(60)));
    h.store.insert("loopback-1", scenario_a());

    let response = h.entry.handle("loopback", "1", "admin").await;

    assert_eq!(response, ActionResponse::Success(SUCCESS_MESSAGE.to_string()));
    assert_eq!(h.backend.stats().queued_commits(), 1);
    assert_eq!(h.backend.stats().queue_waits(), 1);
    assert_eq!(h.backend.stats().commits(), 0);
}

#[tokio::test(start_paused = true)]
async fn stalled_queue_times_out_and_releases_once() {
    let h = queued(QueueBehavior::Stall, Some(Duration::from_secs(10)));
    h.store.insert("loopback-1", scenario_a());

    let response = h.entry.handle("loopback", "1", "admin").await;

    assert!(!response.is_success());
    assert!(response.message().contains("did not complete in time"), "{response:?}");
    assert_eq!(h.backend.stats().opened(), 1);
    assert_eq!(h.backend.stats().released(), 1);
}

#[tokio::test]
async fn failed_queue_item_is_reported() {
    let h = queued(
        QueueBehavior::Finish(QueueStatus::Failed),
        Some(Duration::from_secs(60)),
    );
    h.store.insert("loopback-1", scenario_a());

    let response = h.entry.handle("loopback", "1", "admin").await;

    assert!(!response.is_success());
    assert!(response.message().contains("failed (5)"), "{response:?}");
    assert_eq!(h.backend.stats().released(), 1);
}
