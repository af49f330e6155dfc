//! In-memory [`TemplateEngine`] with `{$VAR}` substitution.
//!
//! A template is a list of edits. Paths and values may reference variables
//! as `{$name}`. Paths starting with `/` are absolute; all others are
//! resolved beneath the context node. An edit carrying a `when` expression is
//! skipped when the expression renders to the empty string or to the null
//! placeholder, which is how
//! templates branch on the null placeholder.

use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{anyhow, Context as _};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;
use wrapper_core::Value;

use super::{RenderedEdit, TemplateEngine, TemplateVariables};
use crate::backend::ConfigPath;

static VARIABLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\$([A-Za-z_][A-Za-z0-9_.-]*)\}").expect("template variable pattern compiles")
});

/// One edit of a template, before substitution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum TemplateEdit {
    Set {
        path: String,
        value: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        when: Option<String>,
    },
    Create {
        path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        when: Option<String>,
    },
    Delete {
        path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        when: Option<String>,
    },
}

impl TemplateEdit {
    /// Unconditional `set` edit.
    pub fn set(path: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Set {
            path: path.into(),
            value: value.into(),
            when: None,
        }
    }

    /// Unconditional `create` edit.
    pub fn create(path: impl Into<String>) -> Self {
        Self::Create {
            path: path.into(),
            when: None,
        }
    }

    /// Unconditional `delete` edit.
    pub fn delete(path: impl Into<String>) -> Self {
        Self::Delete {
            path: path.into(),
            when: None,
        }
    }

    /// Returns the same edit guarded by `expr`.
    #[must_use]
    pub fn when(mut self, expr: impl Into<String>) -> Self {
        let expr = Some(expr.into());
        match &mut self {
            Self::Set { when, .. } | Self::Create { when, .. } | Self::Delete { when, .. } => {
                *when = expr;
            }
        }
        self
    }

    fn guard(&self) -> Option<&str> {
        match self {
            Self::Set { when, .. } | Self::Create { when, .. } | Self::Delete { when, .. } => {
                when.as_deref()
            }
        }
    }
}

/// Named list of edits, stored on disk as `<name>.json`:
///
/// ```json
/// { "edits": [ { "op": "set", "path": "/devices/device/{$deviceName}/config/hostname", "value": "{$hostname}" } ] }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub edits: Vec<TemplateEdit>,
}

impl Template {
    #[must_use]
    pub fn new(edits: Vec<TemplateEdit>) -> Self {
        Self { edits }
    }
}

/// Template catalog held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryTemplateEngine {
    templates: HashMap<String, Template>,
}

impl MemoryTemplateEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a template.
    pub fn insert(&mut self, name: impl Into<String>, template: Template) {
        self.templates.insert(name.into(), template);
    }

    /// Builder-style [`insert`](Self::insert).
    #[must_use]
    pub fn with_template(mut self, name: impl Into<String>, template: Template) -> Self {
        self.insert(name, template);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Loads every `*.json` file in `dir` as a template named after the file stem.
    ///
    /// # Errors
    ///
    /// Fails if the directory cannot be read or a file is not a valid template.
    pub fn load_dir(dir: &Path) -> anyhow::Result<Self> {
        let mut engine = Self::new();
        for entry in std::fs::read_dir(dir)
            .with_context(|| format!("reading template directory {}", dir.display()))?
        {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading template {}", path.display()))?;
            let template: Template = serde_json::from_str(&text)
                .with_context(|| format!("parsing template {}", path.display()))?;
            debug!(template = name, edits = template.edits.len(), "loaded template");
            engine.insert(name, template);
        }
        Ok(engine)
    }
}

impl TemplateEngine for MemoryTemplateEngine {
    fn render(
        &self,
        name: &str,
        context: &ConfigPath,
        vars: &TemplateVariables,
    ) -> anyhow::Result<Vec<RenderedEdit>> {
        let template = self
            .templates
            .get(name)
            .ok_or_else(|| anyhow!("template not found: {name}"))?;

        let mut rendered = Vec::with_capacity(template.edits.len());
        for edit in &template.edits {
            if let Some(expr) = edit.guard() {
                if vars.is_unset(&substitute(expr, vars)?) {
                    continue;
                }
            }
            rendered.push(match edit {
                TemplateEdit::Set { path, value, .. } => RenderedEdit::Set {
                    path: resolve(context, &substitute(path, vars)?),
                    value: Value::String(substitute(value, vars)?),
                },
                TemplateEdit::Create { path, .. } => RenderedEdit::Create {
                    path: resolve(context, &substitute(path, vars)?),
                },
                TemplateEdit::Delete { path, .. } => RenderedEdit::Delete {
                    path: resolve(context, &substitute(path, vars)?),
                },
            });
        }
        Ok(rendered)
    }
}

fn resolve(context: &ConfigPath, path: &str) -> ConfigPath {
    if path.starts_with('/') {
        ConfigPath::parse(path)
    } else {
        context.join(path)
    }
}

fn substitute(text: &str, vars: &TemplateVariables) -> anyhow::Result<String> {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in VARIABLE_RE.captures_iter(text) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let value = vars
            .get(name.as_str())
            .ok_or_else(|| anyhow!("unbound template variable: {}", name.as_str()))?;
        out.push_str(&text[last..whole.start()]);
        out.push_str(value);
        last = whole.end();
    }
    out.push_str(&text[last..]);
    Ok(out)
}
