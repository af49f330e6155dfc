//! Tower middleware layers for the action pipeline.
//!
//! - [`timeout`]: Per-action timeout enforcement
//! - [`metrics`]: Action timing and counting via `tracing` spans and `metrics`
//! - [`pipeline`]: Composes all layers into a single service stack

pub mod metrics;
pub mod pipeline;
pub mod timeout;

pub use metrics::{describe_metrics, MetricsLayer};
pub use pipeline::{build_action_pipeline, ActionPipeline};
pub use timeout::TimeoutLayer;
