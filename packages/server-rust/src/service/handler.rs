//! Service handler capability contract and the template-driven default.

use async_trait::async_trait;
use tracing::debug;
use wrapper_core::{OperationType, RequestContext, ServiceArguments};

use crate::backend::ConfigRoot;
use crate::template::{template_name, TemplateVariables};

/// Name the default handler reports.
pub const DEFAULT_HANDLER_NAME: &str = "default";

/// Everything a handler needs about the current invocation.
#[derive(Debug, Clone, Copy)]
pub struct HandlerContext<'a> {
    pub request: &'a RequestContext,
    pub args: &'a ServiceArguments,
    /// Text substituted for null template variables.
    pub none_placeholder: &'a str,
}

impl HandlerContext<'_> {
    /// Template variables built from the domain arguments.
    #[must_use]
    pub fn template_variables(&self) -> TemplateVariables {
        TemplateVariables::from_arguments(self.args, self.none_placeholder)
    }
}

/// Create/modify/delete unit for one service type.
///
/// Every method defaults to applying the service's template, so a custom
/// handler only overrides what it needs. `modify` re-applies `create`.
#[async_trait]
pub trait ServiceHandler: Send + Sync {
    /// Service name this handler serves. Must match its registration name.
    fn service_name(&self) -> &str;

    async fn create(&self, ctx: &HandlerContext<'_>, root: &mut ConfigRoot<'_>) -> anyhow::Result<()> {
        apply_service_template(ctx, root, OperationType::Create).await
    }

    async fn modify(&self, ctx: &HandlerContext<'_>, root: &mut ConfigRoot<'_>) -> anyhow::Result<()> {
        self.create(ctx, root).await
    }

    async fn delete(&self, ctx: &HandlerContext<'_>, root: &mut ConfigRoot<'_>) -> anyhow::Result<()> {
        apply_service_template(ctx, root, OperationType::Delete).await
    }
}

/// Applies the `<service>-<operation>` template with `/services` as context.
///
/// # Errors
///
/// Fails if the template is unknown or does not render with the arguments.
pub async fn apply_service_template(
    ctx: &HandlerContext<'_>,
    root: &mut ConfigRoot<'_>,
    operation: OperationType,
) -> anyhow::Result<()> {
    let name = template_name(ctx.args.service_name(), operation);
    let vars = ctx.template_variables();
    debug!(template = %name, vars = vars.len(), "applying service template");
    let context = root.services();
    root.apply_template(&name, &context, &vars).await
}

/// Handler used for every service without a custom registration.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHandler;

#[async_trait]
impl ServiceHandler for DefaultHandler {
    fn service_name(&self) -> &str {
        DEFAULT_HANDLER_NAME
    }
}
