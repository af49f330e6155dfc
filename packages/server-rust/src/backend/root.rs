//! Handle to the configuration root handed to service handlers.

use wrapper_core::Value;

use super::{ConfigPath, Transaction};
use crate::template::TemplateVariables;

/// Name of the subtree holding service instances.
pub const SERVICES_NODE: &str = "services";

/// Configuration root of an open transaction.
///
/// Borrows the transaction mutably for the duration of a handler call, so a
/// handler can edit configuration but can neither commit nor release it.
pub struct ConfigRoot<'a> {
    txn: &'a mut dyn Transaction,
}

impl<'a> ConfigRoot<'a> {
    #[must_use]
    pub fn new(txn: &'a mut dyn Transaction) -> Self {
        Self { txn }
    }

    /// Path of the services subtree, the context node for service templates.
    #[must_use]
    pub fn services(&self) -> ConfigPath {
        ConfigPath::root().child(SERVICES_NODE)
    }

    /// # Errors
    ///
    /// Propagates backend read failures.
    pub async fn get(&self, path: &ConfigPath) -> anyhow::Result<Option<Value>> {
        self.txn.get(path).await
    }

    /// # Errors
    ///
    /// Propagates backend read failures.
    pub async fn exists(&self, path: &ConfigPath) -> anyhow::Result<bool> {
        self.txn.exists(path).await
    }

    /// # Errors
    ///
    /// Propagates backend write failures.
    pub async fn set(&mut self, path: &ConfigPath, value: impl Into<Value>) -> anyhow::Result<()> {
        self.txn.set(path, value.into()).await
    }

    /// # Errors
    ///
    /// Propagates backend write failures.
    pub async fn create(&mut self, path: &ConfigPath) -> anyhow::Result<()> {
        self.txn.create(path).await
    }

    /// # Errors
    ///
    /// Propagates backend write failures.
    pub async fn delete(&mut self, path: &ConfigPath) -> anyhow::Result<()> {
        self.txn.delete(path).await
    }

    /// Render and apply a template rooted at `context`.
    ///
    /// # Errors
    ///
    /// Fails if the template does not exist or cannot be rendered with `vars`.
    pub async fn apply_template(
        &mut self,
        name: &str,
        context: &ConfigPath,
        vars: &TemplateVariables,
    ) -> anyhow::Result<()> {
        self.txn.apply_template(name, context, vars).await
    }
}
