//! In-memory [`ParameterStore`] backed by [`DashMap`].

use async_trait::async_trait;
use dashmap::DashMap;
use wrapper_core::ParamRecord;

use super::ParameterStore;

/// Parameter store held in memory. Suitable for tests and for hosts that
/// deliver parameters in the invocation payload.
#[derive(Debug, Default)]
pub struct MemoryParameterStore {
    records: DashMap<String, ParamRecord>,
}

impl MemoryParameterStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `record` under `key`, returning the previous record if any.
    pub fn insert(&self, key: impl Into<String>, record: ParamRecord) -> Option<ParamRecord> {
        self.records.insert(key.into(), record)
    }

    /// Removes the record under `key`.
    pub fn remove(&self, key: &str) -> Option<ParamRecord> {
        self.records.remove(key).map(|(_, r)| r)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl ParameterStore for MemoryParameterStore {
    async fn fetch(&self, key: &str) -> anyhow::Result<Option<ParamRecord>> {
        Ok(self.records.get(key).map(|r| r.value().clone()))
    }
}
