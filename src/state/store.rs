//! State snapshots and deltas

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::btree_map;

/// Raw key/value storage shared by snapshots and deltas
pub type StateMap = BTreeMap<String, String>;

/// Read-only snapshot of workflow facts
///
/// Operations only ever see a `&State`; the engine owns the authoritative
/// copy and replaces it with [`State::merge`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct State {
    entries: StateMap,
}

impl State {
    /// Create an empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new, empty delta
    pub fn mutable() -> StateDelta {
        StateDelta::new()
    }

    /// Look up a key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// True iff every entry of `target` is present here with an equal value
    pub fn has_state<S: AsRef<StateMap> + ?Sized>(&self, target: &S) -> bool {
        target
            .as_ref()
            .iter()
            .all(|(key, value)| self.entries.get(key) == Some(value))
    }

    /// Entries of `target` that this snapshot does not satisfy
    pub fn missing<'a, S: AsRef<StateMap> + ?Sized>(
        &self,
        target: &'a S,
    ) -> Vec<(&'a str, &'a str)> {
        target
            .as_ref()
            .iter()
            .filter(|(key, value)| self.entries.get(*key) != Some(*value))
            .map(|(key, value)| (key.as_str(), value.as_str()))
            .collect()
    }

    /// Produce a new snapshot with `delta` applied (delta wins per key)
    pub fn merge(&self, delta: &StateDelta) -> State {
        let mut entries = self.entries.clone();
        for (key, value) in delta.iter() {
            entries.insert(key.to_string(), value.to_string());
        }
        State { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl AsRef<StateMap> for State {
    fn as_ref(&self) -> &StateMap {
        &self.entries
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for State {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl From<StateDelta> for State {
    fn from(delta: StateDelta) -> Self {
        Self {
            entries: delta.changes,
        }
    }
}

/// Pending writes produced by a single operation
///
/// Last write wins within one delta.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateDelta {
    changes: StateMap,
}

impl StateDelta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a write, overwriting any earlier write to the same key
    pub fn update_state(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.changes.insert(key.into(), value.into());
    }

    /// Builder form of [`StateDelta::update_state`]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.update_state(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.changes.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, String> {
        self.changes.iter()
    }
}

impl AsRef<StateMap> for StateDelta {
    fn as_ref(&self) -> &StateMap {
        &self.changes
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for StateDelta {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            changes: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
