//! Run results and engine errors

use crate::context::{ExecutionFile, MultiDataContext};
use crate::operation::OperationCompleted;
use crate::state::{State, StepKey, StepStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Errors reported by the engine itself
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("max_concurrency must be at least 1")]
    InvalidConcurrency,

    #[error("duplicate operation ordinal {ordinal}")]
    DuplicateOrdinal { ordinal: u32 },

    #[error("workflow stalled: {} operation(s) can never become ready", .pending.len())]
    Stalled { pending: Vec<PendingOperation> },
}

/// An operation left waiting when the run stalled
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingOperation {
    pub ordinal: u32,
    pub identity: String,
    /// Start-trigger entries the final state does not satisfy
    pub waiting_on: Vec<String>,
}

/// An operation whose apply faulted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FaultRecord {
    pub ordinal: u32,
    pub identity: String,
    pub message: String,
}

/// How a run terminated
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every operation ran or was skipped, and none failed
    Succeeded,

    /// Every operation ran or was skipped, and some failed or faulted
    CompletedWithFailures { failed: Vec<u32> },

    /// A step requested a halt
    Halted {
        ordinal: Option<u32>,
        status: Option<String>,
    },

    /// No operation could make progress although some remain
    Stalled { pending: Vec<PendingOperation> },

    /// The run was cancelled externally before all operations finished
    Cancelled,
}

impl RunOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunOutcome::Succeeded => "succeeded",
            RunOutcome::CompletedWithFailures { .. } => "completed_with_failures",
            RunOutcome::Halted { .. } => "halted",
            RunOutcome::Stalled { .. } => "stalled",
            RunOutcome::Cancelled => "cancelled",
        }
    }
}

/// Everything a caller needs after a run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcome: RunOutcome,

    /// Final authoritative state
    pub state: State,

    /// Completions in merge order
    pub completions: Vec<OperationCompleted>,

    /// Ordinals skipped without running
    pub skipped: Vec<u32>,

    pub faulted: Vec<FaultRecord>,

    /// Final shared data
    pub data: MultiDataContext,

    /// Files produced by completed steps
    pub files: Vec<ExecutionFile>,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.outcome == RunOutcome::Succeeded
    }

    pub fn is_halted(&self) -> bool {
        matches!(self.outcome, RunOutcome::Halted { .. })
    }

    /// Ordinals that failed or faulted, ascending
    pub fn failed_ordinals(&self) -> Vec<u32> {
        failed_ordinals(&self.completions, &self.faulted)
    }

    /// Recorded status of a step, if it reached one
    pub fn step_state(&self, ordinal: u32) -> Option<StepStatus> {
        self.state
            .get(&StepKey::state(ordinal).to_string())
            .and_then(StepStatus::parse)
    }

    /// Completion for a given ordinal
    pub fn completion(&self, ordinal: u32) -> Option<&OperationCompleted> {
        self.completions.iter().find(|c| c.ordinal() == ordinal)
    }

    pub fn duration_ms(&self) -> u64 {
        (self.finished_at - self.started_at)
            .num_milliseconds()
            .max(0) as u64
    }

    /// Convert a stalled run into an engine error
    pub fn into_result(self) -> Result<RunReport, EngineError> {
        match self.outcome {
            RunOutcome::Stalled { pending } => Err(EngineError::Stalled { pending }),
            _ => Ok(self),
        }
    }
}

/// Ordinals whose completion failed or whose apply faulted, ascending
pub(crate) fn failed_ordinals(completions: &[OperationCompleted], faulted: &[FaultRecord]) -> Vec<u32> {
    let mut failed: Vec<u32> = completions
        .iter()
        .filter(|c| !c.is_success())
        .map(OperationCompleted::ordinal)
        .chain(faulted.iter().map(|f| f.ordinal))
        .collect();
    failed.sort_unstable();
    failed.dedup();
    failed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::StepResultCapture;
    use crate::state::StateDelta;

    fn report(outcome: RunOutcome) -> RunReport {
        let now = Utc::now();
        RunReport {
            outcome,
            state: State::new(),
            completions: Vec::new(),
            skipped: Vec::new(),
            faulted: Vec::new(),
            data: MultiDataContext::new(),
            files: Vec::new(),
            started_at: now,
            finished_at: now,
        }
    }

    #[test]
    fn test_stalled_into_error() {
        let pending = vec![PendingOperation {
            ordinal: 1,
            identity: "1".into(),
            waiting_on: vec!["never.set=true".into()],
        }];
        let err = report(RunOutcome::Stalled { pending }).into_result().unwrap_err();

        assert!(matches!(err, EngineError::Stalled { ref pending } if pending.len() == 1));
        assert_eq!(
            err.to_string(),
            "workflow stalled: 1 operation(s) can never become ready"
        );
    }

    #[test]
    fn test_non_stalled_into_result() {
        assert!(report(RunOutcome::Succeeded).into_result().is_ok());
        assert!(report(RunOutcome::Cancelled).into_result().is_ok());
    }

    #[test]
    fn test_outcome_serializes_tagged() {
        let outcome = RunOutcome::Halted {
            ordinal: Some(2),
            status: Some("done early".into()),
        };
        let json = serde_json::to_value(&outcome).unwrap();

        assert_eq!(json["outcome"], "halted");
        assert_eq!(json["ordinal"], 2);
        assert_eq!(outcome.as_str(), "halted");
    }

    #[test]
    fn test_step_state_lookup() {
        let mut r = report(RunOutcome::Succeeded);
        r.state = [("step.state.1", "skipped")].into_iter().collect();

        assert_eq!(r.step_state(1), Some(StepStatus::Skipped));
        assert_eq!(r.step_state(2), None);
    }

    #[test]
    fn test_failed_ordinals_sorted_and_unique() {
        let mut r = report(RunOutcome::Succeeded);
        r.completions = vec![
            OperationCompleted::new("4", 4, StateDelta::new(), StepResultCapture::failure("lint")),
            OperationCompleted::new("2", 2, StateDelta::new(), StepResultCapture::success()),
            OperationCompleted::new("3", 3, StateDelta::new(), StepResultCapture::empty()),
        ];
        r.faulted = vec![
            FaultRecord {
                ordinal: 1,
                identity: "1".into(),
                message: "io".into(),
            },
            FaultRecord {
                ordinal: 3,
                identity: "3".into(),
                message: "timeout".into(),
            },
        ];

        assert_eq!(r.failed_ordinals(), vec![1, 3, 4]);
        assert_eq!(failed_ordinals(&r.completions, &r.faulted), r.failed_ordinals());
    }
}
