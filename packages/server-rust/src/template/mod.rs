//! Template rendering contracts.
//!
//! Templates are looked up by name and rendered against a context node and a
//! set of scalar variables. The engine cannot represent absent values, so a
//! `null` argument is replaced with a configurable placeholder before it
//! reaches the engine; templates test for the placeholder instead.

pub mod memory;

pub use memory::{MemoryTemplateEngine, Template, TemplateEdit};

use std::collections::BTreeMap;

use wrapper_core::{OperationType, ServiceArguments, Value};

use crate::backend::ConfigPath;

/// Name of the template applied for `operation` on `service_name`.
#[must_use]
pub fn template_name(service_name: &str, operation: OperationType) -> String {
    format!("{service_name}-{operation}")
}

// ---------------------------------------------------------------------------
// TemplateVariables
// ---------------------------------------------------------------------------

/// Variables bound while rendering a template. Values are already rendered
/// to text; `null` has been replaced by the placeholder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateVariables {
    vars: BTreeMap<String, String>,
    placeholder: String,
}

impl TemplateVariables {
    /// Empty set whose placeholder is the empty string.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_placeholder(placeholder: impl Into<String>) -> Self {
        Self {
            vars: BTreeMap::new(),
            placeholder: placeholder.into(),
        }
    }

    /// Binds every domain key of `args`.
    #[must_use]
    pub fn from_arguments(args: &ServiceArguments, placeholder: &str) -> Self {
        let mut vars = Self::with_placeholder(placeholder);
        for (name, value) in args.domain() {
            vars.insert(name.clone(), value);
        }
        vars
    }

    /// Binds `name` to `value`, substituting the placeholder for `Null`.
    pub fn insert(&mut self, name: impl Into<String>, value: &Value) {
        let text = match value {
            Value::Null => self.placeholder.clone(),
            other => other.to_string(),
        };
        self.vars.insert(name.into(), text);
    }

    /// Whether rendered `text` stands for an absent value: empty, or exactly
    /// the placeholder.
    #[must_use]
    pub fn is_unset(&self, text: &str) -> bool {
        text.is_empty() || text == self.placeholder
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

// ---------------------------------------------------------------------------
// TemplateEngine
// ---------------------------------------------------------------------------

/// A single configuration change produced by rendering a template.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderedEdit {
    Set { path: ConfigPath, value: Value },
    Create { path: ConfigPath },
    Delete { path: ConfigPath },
}

/// Renders named templates into configuration edits.
///
/// Used as `Arc<dyn TemplateEngine>` by backends that support
/// `apply_template`.
pub trait TemplateEngine: Send + Sync {
    /// Render `name` with `context` as the context node.
    ///
    /// # Errors
    ///
    /// Fails if no template named `name` exists or a referenced variable is unbound.
    fn render(
        &self,
        name: &str,
        context: &ConfigPath,
        vars: &TemplateVariables,
    ) -> anyhow::Result<Vec<RenderedEdit>>;
}
