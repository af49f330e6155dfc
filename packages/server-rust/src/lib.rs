//! Service wrapper server: turns service actions into configuration transactions.
//!
//! An action names a service and an operation id. Its parameters are loaded
//! from a [`params::ParameterStore`], the handler registered for the service
//! (or the template-driven default) edits configuration inside a
//! [`backend::Transaction`], and the orchestrator commits, queues or
//! dry-runs the result.

pub mod backend;
pub mod network;
pub mod params;
pub mod service;
pub mod template;

pub use service::{ActionEntryPoint, ActionResponse, WrapperConfig, WrapperError};
