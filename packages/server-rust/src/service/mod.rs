//! Service operation orchestration.
//!
//! This module implements the action pipeline:
//!
//! 1. **Entry point** (`action`): `(service, operation id, caller)` -> `ActionResponse`
//! 2. **Middleware** (`middleware`): Tower layers (metrics, timeout)
//! 3. **Invocation** (`router`): parameter loading and handler resolution
//! 4. **Registry** (`registry`): service name -> handler, default fallback
//! 5. **Orchestrator** (`orchestrator`): transaction lifecycle and commit
//! 6. **Handlers** (`handler`, `domain`): template-driven default and built-in overrides

pub mod action;
pub mod config;
pub mod domain;
pub mod handler;
pub mod middleware;
pub mod operation;
pub mod orchestrator;
pub mod registry;
pub mod router;

#[cfg(test)]
mod scenarios;

// Re-export key types for convenient access.
pub use action::ActionEntryPoint;
pub use config::{CommitQueueConfig, WrapperConfig};
pub use domain::builtin_handler;
pub use handler::{apply_service_template, DefaultHandler, HandlerContext, ServiceHandler};
pub use middleware::{build_action_pipeline, ActionPipeline};
pub use operation::{ActionRequest, ActionResponse, CommitOutcome, WrapperError};
pub use orchestrator::{OperationOrchestrator, TransactionGuard};
pub use registry::{HandlerRegistry, HandlerRegistryBuilder, RegistryError};
pub use router::InvocationService;
