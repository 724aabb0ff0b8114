//! State model for the rule engine
//!
//! This module handles:
//! - Read-only state snapshots and containment checks
//! - Deltas produced by operations and merged by the engine
//! - Typed key construction for the step/label/global namespaces

mod keys;
mod store;

pub use keys::{
    GlobalKey, KeyKind, StepKey, StepRef, StepStatus, VALUE_FALSE, VALUE_TRUE, WORKFLOW_DONE,
    WORKFLOW_STARTED,
};
pub use store::{State, StateDelta, StateMap};
