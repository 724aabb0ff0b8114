//! Composable predicates over state snapshots

use crate::state::{State, StateMap};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A predicate evaluated against a [`State`] snapshot
///
/// The leaf form is a state-containment check: it holds when the snapshot
/// contains every required key/value pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// Snapshot contains all of these entries
    Matches(State),
    /// Every inner condition holds (empty is true)
    All(Vec<Condition>),
    /// At least one inner condition holds (empty is false)
    Any(Vec<Condition>),
    /// Inner condition does not hold
    Not(Box<Condition>),
}

impl Condition {
    /// Single key equality
    pub fn equals(key: impl Into<String>, value: impl Into<String>) -> Self {
        Condition::Matches(std::iter::once((key.into(), value.into())).collect())
    }

    /// Containment of a whole state
    pub fn matches(state: State) -> Self {
        Condition::Matches(state)
    }

    /// Combine a set of conditions with implicit AND semantics
    pub fn all_of(conditions: impl IntoIterator<Item = Condition>) -> Self {
        Condition::All(conditions.into_iter().collect())
    }

    pub fn any_of(conditions: impl IntoIterator<Item = Condition>) -> Self {
        Condition::Any(conditions.into_iter().collect())
    }

    pub fn negate(self) -> Self {
        Condition::Not(Box::new(self))
    }

    /// Evaluate against a snapshot
    pub fn is_satisfied(&self, state: &State) -> bool {
        match self {
            Condition::Matches(required) => state.has_state(required),
            Condition::All(conditions) => conditions.iter().all(|c| c.is_satisfied(state)),
            Condition::Any(conditions) => conditions.iter().any(|c| c.is_satisfied(state)),
            Condition::Not(inner) => !inner.is_satisfied(state),
        }
    }

    /// Flatten into a single required state when the condition is a pure
    /// conjunction of matches; `None` when it uses `Any` or `Not`
    pub fn as_trigger_state(&self) -> Option<State> {
        match self {
            Condition::Matches(required) => Some(required.clone()),
            Condition::All(conditions) => {
                let mut merged = StateMap::new();
                for condition in conditions {
                    let state = condition.as_trigger_state()?;
                    for (key, value) in state.iter() {
                        match merged.get(key) {
                            // contradictory requirements cannot be a single state
                            Some(existing) if existing != value => return None,
                            _ => {
                                merged.insert(key.to_string(), value.to_string());
                            }
                        }
                    }
                }
                Some(merged.into_iter().collect())
            }
            Condition::Any(_) | Condition::Not(_) => None,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Matches(required) => {
                let parts: Vec<String> = required
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, v))
                    .collect();
                write!(f, "{}", parts.join(" & "))
            }
            Condition::All(conditions) => write_group(f, "all", conditions),
            Condition::Any(conditions) => write_group(f, "any", conditions),
            Condition::Not(inner) => write!(f, "not({})", inner),
        }
    }
}

fn write_group(f: &mut fmt::Formatter<'_>, name: &str, conditions: &[Condition]) -> fmt::Result {
    let parts: Vec<String> = conditions.iter().map(|c| c.to_string()).collect();
    write!(f, "{}({})", name, parts.join(", "))
}
