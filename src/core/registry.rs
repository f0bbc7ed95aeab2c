//! Parameter registry — fixed string key to locator mapping.
//!
//! Producers publish a resource locator under a predictable name
//! (`<name>-<kind>-secret-arn`) so later consumers, including ones outside
//! this graph, can look it up without holding a direct reference. No
//! ownership transfer occurs; entries are write-once.

use super::types::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Published parameter entries, in publication order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParameterRegistry {
    entries: IndexMap<String, Value>,
}

impl ParameterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a locator under a fixed key. Re-publishing the identical
    /// value is idempotent; a conflicting value is an error.
    pub fn publish(&mut self, key: impl Into<String>, value: Value) -> Result<(), String> {
        let key = key.into();
        if let Some(existing) = self.entries.get(&key) {
            if *existing == value {
                return Ok(());
            }
            return Err(format!(
                "parameter '{}' already published with a different value",
                key
            ));
        }
        self.entries.insert(key, value);
        Ok(())
    }

    /// Look up a published locator.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
