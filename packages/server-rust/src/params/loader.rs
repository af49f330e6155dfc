//! Resolves `(service name, operation id)` to validated service arguments.

use std::sync::Arc;

use tracing::debug;
use wrapper_core::{parameter_key, ServiceArguments};

use super::ParameterStore;
use crate::service::operation::WrapperError;

/// Loads and validates parameter records.
#[derive(Clone)]
pub struct ParameterLoader {
    store: Arc<dyn ParameterStore>,
}

impl ParameterLoader {
    #[must_use]
    pub fn new(store: Arc<dyn ParameterStore>) -> Self {
        Self { store }
    }

    /// Fetches the record for `service_name`/`operation_id` and validates it.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the store has no record for the key
    /// - `ParameterStoreUnavailable` if the store itself fails
    /// - `Arguments` if the record does not validate
    pub async fn load(
        &self,
        service_name: &str,
        operation_id: &str,
    ) -> Result<ServiceArguments, WrapperError> {
        let key = parameter_key(service_name, operation_id);
        let record = self
            .store
            .fetch(&key)
            .await
            .map_err(WrapperError::ParameterStoreUnavailable)?
            .ok_or_else(|| WrapperError::NotFound { key: key.clone() })?;

        let args = ServiceArguments::from_record(service_name, operation_id, &record)?;
        debug!(
            key = %key,
            operation = %args.operation_type(),
            validate = args.validate_only(),
            params = args.domain().len(),
            "loaded service arguments"
        );
        Ok(args)
    }
}
