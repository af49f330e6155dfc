//! Built-in custom service handlers.
//!
//! Services without an entry here run the template-driven default handler.

pub mod example;
pub mod loopback;

pub use example::{ExampleHandler, EXAMPLE_SERVICE};
pub use loopback::{LoopbackHandler, LOOPBACK_SERVICE};

use std::sync::Arc;

use super::handler::ServiceHandler;

/// Names accepted by [`builtin_handler`].
pub const BUILTIN_HANDLERS: &[&str] = &[EXAMPLE_SERVICE, LOOPBACK_SERVICE];

/// Built-in handler for `name`, if there is one.
#[must_use]
pub fn builtin_handler(name: &str) -> Option<Arc<dyn ServiceHandler>> {
    match name {
        EXAMPLE_SERVICE => Some(Arc::new(ExampleHandler)),
        LOOPBACK_SERVICE => Some(Arc::new(LoopbackHandler)),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::registry::HandlerRegistryBuilder;

    #[test]
    fn every_builtin_resolves_under_its_own_name() {
        for name in BUILTIN_HANDLERS {
            let handler = builtin_handler(name).unwrap();
            assert_eq!(handler.service_name(), *name);
        }
        assert!(builtin_handler("l3vpn").is_none());
    }

    #[test]
    fn builtins_register_cleanly() {
        let mut builder = HandlerRegistryBuilder::new();
        for name in BUILTIN_HANDLERS {
            builder.register(name, builtin_handler(name).unwrap()).unwrap();
        }
        assert_eq!(builder.build().count(), BUILTIN_HANDLERS.len());
    }
}
