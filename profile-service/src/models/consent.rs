//! Terms-of-service configuration as published in the config cache.
//!
//! Shape: `{"latestVersion": "v4", "v4": {"url": "https://.."}, "v3": {..}}`.

use serde_json::{Map, Value};

const LATEST_VERSION_KEY: &str = "latestVersion";

#[derive(Debug, Clone, PartialEq)]
pub struct TncConfig {
    entries: Map<String, Value>,
}

impl TncConfig {
    /// `None` for an empty document; an error for anything that is not a
    /// JSON object.
    pub fn parse(raw: &str) -> Result<Option<Self>, serde_json::Error> {
        let entries: Map<String, Value> = serde_json::from_str(raw)?;
        if entries.is_empty() {
            return Ok(None);
        }
        Ok(Some(Self { entries }))
    }

    pub fn latest_version(&self) -> Option<&str> {
        self.entries.get(LATEST_VERSION_KEY).and_then(Value::as_str)
    }

    pub fn is_known_version(&self, version: &str) -> bool {
        self.entries.contains_key(version)
    }

    pub fn url_for(&self, version: &str) -> Option<&str> {
        self.entries
            .get(version)
            .and_then(|v| v.get("url"))
            .and_then(Value::as_str)
    }
}
