use crate::types::Principal;

/// Per-invocation context describing who triggered the operation.
/// Threaded through the orchestrator into every handler call.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Authenticated caller. Transactions are opened as `principal.id`.
    pub principal: Principal,
    /// Name of the inbound action that carried the request.
    pub action: String,
    /// Distributed trace identifier for observability.
    pub trace_id: String,
}

impl RequestContext {
    /// Builds a context for `caller` with an empty action and trace id.
    #[must_use]
    pub fn for_caller(caller: impl Into<String>) -> Self {
        Self {
            principal: Principal { id: caller.into() },
            action: String::new(),
            trace_id: String::new(),
        }
    }

    /// User name of the caller.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.principal.id
    }
}
