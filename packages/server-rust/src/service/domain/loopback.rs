use async_trait::async_trait;
use tracing::info;

use crate::backend::{ConfigPath, ConfigRoot};
use crate::service::handler::{HandlerContext, ServiceHandler};

pub const LOOPBACK_SERVICE: &str = "loopback";

const DEVICE_NAME: &str = "deviceName";
const DESCRIPTION: &str = "description";
const LOOPBACK_ID: &str = "loopbackId";

/// Loopback interfaces written directly into the service model instead of
/// through a template.
///
/// Entries live at `/services/loopback/device/<deviceName>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoopbackHandler;

impl LoopbackHandler {
    fn entry(root: &ConfigRoot<'_>, device: &str) -> ConfigPath {
        root.services()
            .child(LOOPBACK_SERVICE)
            .child("device")
            .child(device)
    }
}

#[async_trait]
impl ServiceHandler for LoopbackHandler {
    fn service_name(&self) -> &str {
        LOOPBACK_SERVICE
    }

    async fn create(&self, ctx: &HandlerContext<'_>, root: &mut ConfigRoot<'_>) -> anyhow::Result<()> {
        let device = ctx.args.require(DEVICE_NAME)?.to_string();
        info!(device = %device, "creating loopback entry");

        let entry = Self::entry(root, &device);
        root.create(&entry).await?;
        if let Some(description) = ctx.args.get(DESCRIPTION) {
            root.set(&entry.child("description"), description.clone()).await?;
        }
        let loopback_id = ctx.args.require(LOOPBACK_ID)?.clone();
        root.set(&entry.child("loopback-id"), loopback_id).await
    }

    async fn delete(&self, ctx: &HandlerContext<'_>, root: &mut ConfigRoot<'_>) -> anyhow::Result<()> {
        let device = ctx.args.require(DEVICE_NAME)?.to_string();
        info!(device = %device, "deleting loopback entry");

        let entry = Self::entry(root, &device);
        root.delete(&entry).await
    }
}
