use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::info;

use super::handler::{DefaultHandler, ServiceHandler};

static SERVICE_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]*$").expect("valid service name regex"));

/// Startup-time registration failure. Fatal for the process.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("a handler is already registered for service {name}")]
    DuplicateRegistration { name: String },
    #[error("handler for service {name} is invalid: {reason}")]
    InvalidHandlerType { name: String, reason: String },
}

// ---------------------------------------------------------------------------
// HandlerRegistryBuilder
// ---------------------------------------------------------------------------

/// Collects custom handler registrations before the registry is frozen.
#[derive(Default)]
pub struct HandlerRegistryBuilder {
    handlers: HashMap<String, Arc<dyn ServiceHandler>>,
    order: Vec<String>,
}

impl HandlerRegistryBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `name` to `handler`.
    ///
    /// # Errors
    ///
    /// - `DuplicateRegistration` if `name` is already bound; the first binding stays
    /// - `InvalidHandlerType` if `name` is not a valid service name or the
    ///   handler reports a different service name
    pub fn register(
        &mut self,
        name: &str,
        handler: Arc<dyn ServiceHandler>,
    ) -> Result<&mut Self, RegistryError> {
        if !SERVICE_NAME_RE.is_match(name) {
            return Err(RegistryError::InvalidHandlerType {
                name: name.to_string(),
                reason: "service name must be a non-empty identifier".to_string(),
            });
        }
        if handler.service_name() != name {
            return Err(RegistryError::InvalidHandlerType {
                name: name.to_string(),
                reason: format!("handler declares service {}", handler.service_name()),
            });
        }
        if self.handlers.contains_key(name) {
            return Err(RegistryError::DuplicateRegistration {
                name: name.to_string(),
            });
        }

        self.handlers.insert(name.to_string(), handler);
        self.order.push(name.to_string());
        info!(service = name, "registered custom service handler");
        Ok(self)
    }

    /// Freezes the registrations. The registry is immutable afterwards.
    #[must_use]
    pub fn build(self) -> HandlerRegistry {
        HandlerRegistry {
            handlers: self.handlers,
            order: self.order,
            default: Arc::new(DefaultHandler),
        }
    }
}

// ---------------------------------------------------------------------------
// HandlerRegistry
// ---------------------------------------------------------------------------

/// Immutable map from service name to handler with a default fallback.
///
/// Shared across invocations as `Arc<HandlerRegistry>`; lookups take no locks.
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn ServiceHandler>>,
    order: Vec<String>,
    default: Arc<dyn ServiceHandler>,
}

impl HandlerRegistry {
    /// Registry with no custom handlers.
    #[must_use]
    pub fn empty() -> Self {
        HandlerRegistryBuilder::new().build()
    }

    /// Handler registered for `service_name`, else the default handler.
    #[must_use]
    pub fn resolve(&self, service_name: &str) -> Arc<dyn ServiceHandler> {
        self.handlers
            .get(service_name)
            .map_or_else(|| Arc::clone(&self.default), Arc::clone)
    }

    /// Whether a custom handler is registered for `service_name`.
    #[must_use]
    pub fn contains(&self, service_name: &str) -> bool {
        self.handlers.contains_key(service_name)
    }

    /// Number of custom registrations.
    #[must_use]
    pub fn count(&self) -> usize {
        self.handlers.len()
    }

    /// Registered service names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::empty()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.order)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
