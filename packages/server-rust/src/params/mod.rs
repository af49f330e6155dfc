//! Parameter store access.
//!
//! A [`ParameterStore`] resolves `"<service>-<operation-id>"` keys to raw
//! records; the [`ParameterLoader`] turns a record into validated
//! [`ServiceArguments`](wrapper_core::ServiceArguments).

pub mod json_dir;
pub mod loader;
pub mod memory;

pub use json_dir::JsonDirParameterStore;
pub use loader::ParameterLoader;
pub use memory::MemoryParameterStore;

use async_trait::async_trait;
use wrapper_core::ParamRecord;

/// Keyed lookup of parameter records.
///
/// The backing medium is opaque: implementations only need exact point
/// lookups. Used as `Arc<dyn ParameterStore>`.
#[async_trait]
pub trait ParameterStore: Send + Sync {
    /// Fetch the record stored under `key`.
    ///
    /// Returns `Ok(None)` when no record exists. `Err` is reserved for
    /// failures of the store itself.
    async fn fetch(&self, key: &str) -> anyhow::Result<Option<ParamRecord>>;
}
