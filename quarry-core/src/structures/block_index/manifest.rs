//! Index-wide metadata persisted between the vocabulary and the footer

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result};

/// String-keyed metadata dictionary, stored as a JSON object.
///
/// Scoring code reads collection statistics from here; writers record
/// which component produced the file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    entries: BTreeMap<String, Value>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_slice(data)
            .map_err(|e| Error::Serialization(format!("invalid manifest: {}", e)))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Set `key` only if nothing is stored under it yet
    pub fn set_default(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.entries.entry(key.into()).or_insert_with(|| value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(Value::as_str)
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.entries.get(key).and_then(Value::as_u64)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.entries.get(key).and_then(Value::as_f64)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.entries.get(key).and_then(Value::as_bool)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_roundtrip() {
        let mut manifest = Manifest::new();
        manifest.set("readerClass", "quarry::PositionIndexReader");
        manifest.set("keyCount", 42u64);
        manifest.set("maxScore", 7.25);
        manifest.set("isCompressed", true);
        manifest.set("emptyString", "");

        let bytes = manifest.to_bytes().unwrap();
        let decoded = Manifest::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, manifest);
        assert_eq!(decoded.get_str("readerClass"), Some("quarry::PositionIndexReader"));
        assert_eq!(decoded.get_u64("keyCount"), Some(42));
        assert_eq!(decoded.get_f64("maxScore"), Some(7.25));
        assert_eq!(decoded.get_bool("isCompressed"), Some(true));
        assert_eq!(decoded.get_str("emptyString"), Some(""));
        assert_eq!(decoded.get_str("missing"), None);
    }

    #[test]
    fn test_set_default_keeps_existing() {
        let mut manifest = Manifest::new();
        manifest.set("writerClass", "custom");
        manifest.set_default("writerClass", "fallback");
        manifest.set_default("readerClass", "fallback");
        assert_eq!(manifest.get_str("writerClass"), Some("custom"));
        assert_eq!(manifest.get_str("readerClass"), Some("fallback"));
    }

    #[test]
    fn test_invalid_manifest() {
        assert!(matches!(
            Manifest::from_bytes(b"{not json"),
            Err(Error::Serialization(_))
        ));
    }
}
