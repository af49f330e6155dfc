use async_trait::async_trait;
use tracing::info;

use crate::backend::ConfigRoot;
use crate::service::handler::{HandlerContext, ServiceHandler};

pub const EXAMPLE_SERVICE: &str = "example";

/// Handler that only logs. Starting point for new custom handlers.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExampleHandler;

#[async_trait]
impl ServiceHandler for ExampleHandler {
    fn service_name(&self) -> &str {
        EXAMPLE_SERVICE
    }

    async fn create(&self, ctx: &HandlerContext<'_>, _root: &mut ConfigRoot<'_>) -> anyhow::Result<()> {
        info!(operation_id = ctx.args.operation_id(), "example create");
        Ok(())
    }

    async fn delete(&self, ctx: &HandlerContext<'_>, _root: &mut ConfigRoot<'_>) -> anyhow::Result<()> {
        info!(operation_id = ctx.args.operation_id(), "example delete");
        Ok(())
    }
}
