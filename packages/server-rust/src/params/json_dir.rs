//! [`ParameterStore`] reading one JSON file per record from a directory.
//!
//! The record for key `loopback-42` lives in `<dir>/loopback-42.json` and must
//! be a JSON object. A missing file means "no record", and so does a key that
//! cannot name a file in the directory.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use async_trait::async_trait;
use tracing::debug;
use wrapper_core::ParamRecord;

use super::ParameterStore;

/// Directory-backed parameter store.
#[derive(Debug, Clone)]
pub struct JsonDirParameterStore {
    dir: PathBuf,
}

impl JsonDirParameterStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// File holding `key`, or `None` if the key would leave the directory.
    fn record_path(&self, key: &str) -> Option<PathBuf> {
        if key.is_empty() || key.contains(['/', '\\', '\0']) {
            return None;
        }
        Some(self.dir.join(format!("{key}.json")))
    }
}

#[async_trait]
impl ParameterStore for JsonDirParameterStore {
    async fn fetch(&self, key: &str) -> anyhow::Result<Option<ParamRecord>> {
        let Some(path) = self.record_path(key) else {
            debug!(key, "parameter key cannot name a record file");
            return Ok(None);
        };
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", path.display()));
            }
        };
        let record: ParamRecord = serde_json::from_str(&text)
            .with_context(|| format!("{} is not a JSON object", path.display()))?;
        Ok(Some(record))
    }
}
