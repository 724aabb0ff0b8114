//! Typed builders for the state key namespace
//!
//! Every fact the engine records lives under a key derived from a [`StepKey`]
//! or a [`GlobalKey`]. The canonical string form is stable so that external
//! consumers reading raw state keep working.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Boolean true value
pub const VALUE_TRUE: &str = "true";
/// Boolean false value
pub const VALUE_FALSE: &str = "false";
/// `workflow.state` value once the run has begun
pub const WORKFLOW_STARTED: &str = "started";
/// `workflow.state` value once the run has terminated
pub const WORKFLOW_DONE: &str = "done";

const LABEL_PREFIX: &str = "label.";

/// Identifies which step a key belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StepRef {
    /// Ordinal position of the step (1-based)
    Ordinal(u32),
    /// Human label; keys use the reserved `label.` prefix
    Label(String),
}

impl StepRef {
    pub fn label(label: impl Into<String>) -> Self {
        StepRef::Label(label.into())
    }
}

impl fmt::Display for StepRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepRef::Ordinal(n) => write!(f, "{}", n),
            StepRef::Label(label) => write!(f, "{}{}", LABEL_PREFIX, label),
        }
    }
}

impl From<u32> for StepRef {
    fn from(ordinal: u32) -> Self {
        StepRef::Ordinal(ordinal)
    }
}

/// Per-step fact kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    Completed,
    State,
    Before,
    After,
    FlowControl,
    FlowControlStatus,
    Result,
    Failure,
}

impl KeyKind {
    fn prefix(self) -> &'static str {
        match self {
            KeyKind::Completed => "step.completed",
            KeyKind::State => "step.state",
            KeyKind::Before => "before.step",
            KeyKind::After => "after.step",
            KeyKind::FlowControl => "step.flowcontrol",
            KeyKind::FlowControlStatus => "step.flowcontrol.status",
            KeyKind::Result => "step.result",
            KeyKind::Failure => "step.failure",
        }
    }
}

/// A key scoped to one step, optionally narrowed to a data scope
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StepKey {
    pub kind: KeyKind,
    pub step: StepRef,
    pub scope: Option<String>,
}

impl StepKey {
    pub fn new(kind: KeyKind, step: impl Into<StepRef>) -> Self {
        Self {
            kind,
            step: step.into(),
            scope: None,
        }
    }

    /// Key narrowed to a data scope (used for result and failure data)
    pub fn scoped(kind: KeyKind, step: impl Into<StepRef>, scope: impl Into<String>) -> Self {
        Self {
            kind,
            step: step.into(),
            scope: Some(scope.into()),
        }
    }

    pub fn completed(step: impl Into<StepRef>) -> Self {
        Self::new(KeyKind::Completed, step)
    }

    pub fn state(step: impl Into<StepRef>) -> Self {
        Self::new(KeyKind::State, step)
    }

    pub fn before(step: impl Into<StepRef>) -> Self {
        Self::new(KeyKind::Before, step)
    }

    pub fn after(step: impl Into<StepRef>) -> Self {
        Self::new(KeyKind::After, step)
    }

    pub fn flow_control(step: impl Into<StepRef>) -> Self {
        Self::new(KeyKind::FlowControl, step)
    }

    pub fn flow_control_status(step: impl Into<StepRef>) -> Self {
        Self::new(KeyKind::FlowControlStatus, step)
    }
}

impl fmt::Display for StepKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.kind.prefix(), self.step)?;
        if let Some(ref scope) = self.scope {
            write!(f, ".{}", scope)?;
        }
        Ok(())
    }
}

impl From<StepKey> for String {
    fn from(key: StepKey) -> Self {
        key.to_string()
    }
}

/// Workflow-wide keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GlobalKey {
    AnyStepSucceeded,
    AnyStepFailed,
    AnyStepSkipped,
    AnyFlowControlHalt,
    WorkflowState,
}

impl GlobalKey {
    pub fn as_str(self) -> &'static str {
        match self {
            GlobalKey::AnyStepSucceeded => "step.any.state.success",
            GlobalKey::AnyStepFailed => "step.any.state.failed",
            GlobalKey::AnyStepSkipped => "step.any.state.skipped",
            GlobalKey::AnyFlowControlHalt => "step.any.flowcontrol.halt",
            GlobalKey::WorkflowState => "workflow.state",
        }
    }
}

impl fmt::Display for GlobalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<GlobalKey> for String {
    fn from(key: GlobalKey) -> Self {
        key.as_str().to_string()
    }
}

/// Terminal status recorded under `step.state.<id>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Success,
    Failure,
    Skipped,
}

impl StepStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            StepStatus::Success => "success",
            StepStatus::Failure => "failure",
            StepStatus::Skipped => "skipped",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "success" => Some(StepStatus::Success),
            "failure" => Some(StepStatus::Failure),
            "skipped" => Some(StepStatus::Skipped),
            _ => None,
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<StepStatus> for String {
    fn from(status: StepStatus) -> Self {
        status.as_str().to_string()
    }
}
