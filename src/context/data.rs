//! Multi-scope data shared by the operations of one run

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Scope used for data visible to every step
pub const GLOBAL_SCOPE: &str = "global";

/// Flat key/value data within one scope
pub type DataContext = BTreeMap<String, String>;

/// Data contexts keyed by scope name (e.g. a node identifier)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MultiDataContext {
    scopes: BTreeMap<String, DataContext>,
}

impl MultiDataContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a whole scope
    pub fn scope(&self, scope: &str) -> Option<&DataContext> {
        self.scopes.get(scope)
    }

    /// Read one value
    pub fn get(&self, scope: &str, key: &str) -> Option<&str> {
        self.scopes
            .get(scope)
            .and_then(|ctx| ctx.get(key))
            .map(String::as_str)
    }

    /// Write one value, creating the scope if needed
    pub fn put(&mut self, scope: impl Into<String>, key: impl Into<String>, value: impl Into<String>) {
        self.scopes
            .entry(scope.into())
            .or_default()
            .insert(key.into(), value.into());
    }

    /// Builder form of [`MultiDataContext::put`]
    pub fn with(
        mut self,
        scope: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.put(scope, key, value);
        self
    }

    /// Fold `other` in scope by scope; values from `other` win per key
    pub fn merge(&mut self, other: &MultiDataContext) {
        for (scope, data) in &other.scopes {
            let target = self.scopes.entry(scope.clone()).or_default();
            for (key, value) in data {
                target.insert(key.clone(), value.clone());
            }
        }
    }

    pub fn scope_names(&self) -> impl Iterator<Item = &str> {
        self.scopes.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.values().all(|ctx| ctx.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_and_get() {
        let mut ctx = MultiDataContext::new();
        ctx.put("node1", "exit_code", "0");

        assert_eq!(ctx.get("node1", "exit_code"), Some("0"));
        assert_eq!(ctx.get("node1", "missing"), None);
        assert_eq!(ctx.get("node2", "exit_code"), None);
    }

    #[test]
    fn test_merge_keeps_other_scopes() {
        let mut shared = MultiDataContext::new()
            .with(GLOBAL_SCOPE, "run", "42")
            .with("node1", "out", "old");
        let produced = MultiDataContext::new()
            .with("node1", "out", "new")
            .with("node2", "out", "fresh");

        shared.merge(&produced);

        assert_eq!(shared.get(GLOBAL_SCOPE, "run"), Some("42"));
        assert_eq!(shared.get("node1", "out"), Some("new"));
        assert_eq!(shared.get("node2", "out"), Some("fresh"));
        assert_eq!(shared.scope_names().count(), 3);
    }

    #[test]
    fn test_is_empty() {
        assert!(MultiDataContext::new().is_empty());
        assert!(!MultiDataContext::new().with("a", "b", "c").is_empty());
    }
}
