//! Standalone action server over the in-memory configuration backend.
//!
//! ```bash
//! wrapper-test-server --params-dir ./params --templates-dir ./templates \
//!     --handler loopback --commit-queue --port 8080
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context as _};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use wrapper_server::backend::MemoryBackend;
use wrapper_server::network::{NetworkConfig, NetworkModule};
use wrapper_server::params::{JsonDirParameterStore, ParameterLoader};
use wrapper_server::service::domain::BUILTIN_HANDLERS;
use wrapper_server::service::middleware::describe_metrics;
use wrapper_server::service::{
    build_action_pipeline, builtin_handler, ActionEntryPoint, CommitQueueConfig,
    HandlerRegistry, HandlerRegistryBuilder, InvocationService, OperationOrchestrator,
    WrapperConfig,
};
use wrapper_server::template::MemoryTemplateEngine;

/// Service wrapper test server.
#[derive(Debug, Parser)]
#[command(name = "wrapper-test-server")]
#[command(about = "Runs service actions against an in-memory configuration backend")]
#[command(version)]
struct Args {
    /// Bind address.
    #[arg(long, env = "WRAPPER_HOST", default_value = "0.0.0.0")]
    host: String,

    /// HTTP port; 0 picks a free port.
    #[arg(long, env = "WRAPPER_PORT", default_value = "8080")]
    port: u16,

    /// Directory of `<service>-<operation id>.json` parameter records.
    #[arg(long, env = "WRAPPER_PARAMS_DIR", default_value = "params")]
    params_dir: PathBuf,

    /// Directory of `<name>.json` templates.
    #[arg(long, env = "WRAPPER_TEMPLATES_DIR")]
    templates_dir: Option<PathBuf>,

    /// Built-in custom handler to register (repeatable).
    #[arg(long = "handler", value_delimiter = ',')]
    handlers: Vec<String>,

    /// Commit through the commit queue and wait for the queue item.
    #[arg(long, env = "WRAPPER_COMMIT_QUEUE")]
    commit_queue: bool,

    /// Bound on the commit-queue wait in seconds; 0 waits without bound.
    #[arg(long, env = "WRAPPER_COMMIT_QUEUE_TIMEOUT_SECS", default_value = "60")]
    commit_queue_timeout_secs: u64,

    /// Ceiling for a whole action in seconds.
    #[arg(long, env = "WRAPPER_ACTION_TIMEOUT_SECS", default_value = "240")]
    action_timeout_secs: u64,

    /// Text substituted for null template variables.
    #[arg(long, env = "WRAPPER_NONE_PLACEHOLDER", default_value = "")]
    none_placeholder: String,

    /// User context transactions are opened in.
    #[arg(long, env = "WRAPPER_CONTEXT", default_value = "system")]
    context: String,

    /// Emit logs as JSON.
    #[arg(long, env = "WRAPPER_LOG_JSON")]
    log_json: bool,

    /// Expose Prometheus metrics on this port.
    #[arg(long, env = "WRAPPER_METRICS_PORT")]
    metrics_port: Option<u16>,
}

impl Args {
    fn wrapper_config(&self) -> WrapperConfig {
        WrapperConfig {
            action_timeout: Duration::from_secs(self.action_timeout_secs),
            commit_queue: CommitQueueConfig {
                enabled: self.commit_queue,
                timeout: (self.commit_queue_timeout_secs > 0)
                    .then(|| Duration::from_secs(self.commit_queue_timeout_secs)),
            },
            none_placeholder: self.none_placeholder.clone(),
            transaction_context: self.context.clone(),
            ..WrapperConfig::default()
        }
    }

    fn network_config(&self) -> NetworkConfig {
        NetworkConfig {
            host: self.host.clone(),
            port: self.port,
            ..NetworkConfig::default()
        }
    }
}

fn init_logging(json: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer())
            .init();
    }
}

fn build_registry(names: &[String]) -> anyhow::Result<HandlerRegistry> {
    let mut builder = HandlerRegistryBuilder::new();
    for name in names {
        let Some(handler) = builtin_handler(name) else {
            bail!(
                "unknown handler {name}; available: {}",
                BUILTIN_HANDLERS.join(", ")
            );
        };
        builder.register(name, handler)?;
    }
    Ok(builder.build())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.log_json);

    if let Some(port) = args.metrics_port {
        PrometheusBuilder::new()
            .with_http_listener(SocketAddr::from(([0, 0, 0, 0], port)))
            .install()
            .context("installing prometheus exporter")?;
        describe_metrics();
        info!(port, "prometheus exporter listening");
    }

    let templates = match &args.templates_dir {
        Some(dir) => MemoryTemplateEngine::load_dir(dir)
            .with_context(|| format!("loading templates from {}", dir.display()))?,
        None => MemoryTemplateEngine::new(),
    };
    info!(templates = templates.len(), "template catalog loaded");

    let registry = build_registry(&args.handlers)?;
    info!(
        count = registry.count(),
        handlers = ?registry.names().collect::<Vec<_>>(),
        "registered custom service handlers"
    );

    let config = Arc::new(args.wrapper_config());
    let backend = MemoryBackend::new(Arc::new(templates));
    let pipeline = build_action_pipeline(InvocationService::new(
        ParameterLoader::new(Arc::new(JsonDirParameterStore::new(&args.params_dir))),
        Arc::new(registry),
        OperationOrchestrator::new(Arc::new(backend), Arc::clone(&config)),
    ));
    let entry = Arc::new(ActionEntryPoint::new(pipeline, config));

    let mut network = NetworkModule::new(args.network_config(), entry);
    let port = network.start().await?;
    info!(port, params_dir = %args.params_dir.display(), "wrapper test server ready");

    network
        .serve(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await
}
