//! Schedulable operations
//!
//! An [`Operation`] declares when it is ready or skippable, runs against a
//! snapshot of the shared data, and reports a state delta. [`StepOperation`]
//! binds a single workflow step to that contract.

mod completed;
mod result;
mod step;

pub use completed::OperationCompleted;
pub use result::{
    ControlBehavior, FnStep, StepExecutable, StepExecutionResult, StepResultCapture, step_fn,
};
pub use step::StepOperation;

use crate::context::MultiDataContext;
use crate::state::{State, StateDelta};
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Unexpected faults raised while applying an operation
#[derive(Debug, Error)]
pub enum OperationError {
    #[error("step {ordinal} raised an error: {source}")]
    Step {
        ordinal: u32,
        #[source]
        source: anyhow::Error,
    },

    #[error("operation '{identity}' was already applied")]
    AlreadyApplied { identity: String },

    #[error("operation '{identity}' panicked: {message}")]
    Panicked { identity: String, message: String },
}

/// Lifecycle of one operation within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    NotStarted,
    Running,
    Done,
}

impl Lifecycle {
    pub fn is_done(self) -> bool {
        self == Lifecycle::Done
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lifecycle::NotStarted => f.write_str("not-started"),
            Lifecycle::Running => f.write_str("running"),
            Lifecycle::Done => f.write_str("done"),
        }
    }
}

/// A unit of schedulable work
///
/// The engine checks `should_skip` before `should_run`; a skipped operation
/// is never applied and contributes `skip_state` instead.
#[async_trait]
pub trait Operation: Send + Sync + fmt::Debug {
    /// Stable identity used in logs and completions
    fn identity(&self) -> String;

    /// Ordinal used to order equally-ready operations
    fn ordinal(&self) -> u32;

    fn should_run(&self, state: &State) -> bool;

    fn should_skip(&self, state: &State) -> bool;

    /// Execute against a snapshot of the shared data
    async fn apply(
        &self,
        context: Arc<MultiDataContext>,
    ) -> Result<OperationCompleted, OperationError>;

    /// Delta recorded when the operation is skipped without running
    fn skip_state(&self, state: &State) -> StateDelta;

    /// Delta recorded when `apply` faults
    fn failure_state(&self, cause: &OperationError) -> StateDelta;

    /// Human-readable trigger entries not yet satisfied by `state`
    fn waiting_on(&self, _state: &State) -> Vec<String> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_error_display() {
        let err = OperationError::Step {
            ordinal: 3,
            source: anyhow::anyhow!("connection refused"),
        };
        assert_eq!(err.to_string(), "step 3 raised an error: connection refused");

        let err = OperationError::AlreadyApplied {
            identity: "3".into(),
        };
        assert!(err.to_string().contains("already applied"));
    }

    #[test]
    fn test_lifecycle_display() {
        assert_eq!(Lifecycle::NotStarted.to_string(), "not-started");
        assert!(Lifecycle::Done.is_done());
        assert!(!Lifecycle::Running.is_done());
    }
}
