//! The step callable boundary

use crate::context::{ExecutionFile, MultiDataContext};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Flow-control directive returned by a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlBehavior {
    /// Proceed normally
    Continue,
    /// Stop dispatching further steps
    Halt,
}

impl fmt::Display for ControlBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlBehavior::Continue => f.write_str("Continue"),
            ControlBehavior::Halt => f.write_str("Halt"),
        }
    }
}

/// Structured outcome of one step execution
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepExecutionResult {
    pub success: bool,

    /// Result data keyed by scope
    pub result_data: BTreeMap<String, Value>,

    /// Failure data keyed by scope
    pub failure_data: BTreeMap<String, Value>,

    pub failure_message: Option<String>,
}

impl StepExecutionResult {
    pub fn success() -> Self {
        Self {
            success: true,
            ..Default::default()
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            failure_message: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn with_result(mut self, scope: impl Into<String>, value: impl Into<Value>) -> Self {
        self.result_data.insert(scope.into(), value.into());
        self
    }

    pub fn with_failure(mut self, scope: impl Into<String>, value: impl Into<Value>) -> Self {
        self.failure_data.insert(scope.into(), value.into());
        self
    }
}

/// Everything a step callable hands back to the engine
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepResultCapture {
    /// `None` when the callable produced no structured result (treated as failure)
    pub step_result: Option<StepExecutionResult>,

    pub control_behavior: Option<ControlBehavior>,

    /// Free-text status accompanying the control behavior
    pub status_string: Option<String>,

    /// Data the step produced for the shared context
    pub result_data: MultiDataContext,

    /// Files produced by the step
    pub files: Vec<ExecutionFile>,
}

impl StepResultCapture {
    pub fn from_result(result: StepExecutionResult) -> Self {
        Self {
            step_result: Some(result),
            ..Default::default()
        }
    }

    pub fn success() -> Self {
        Self::from_result(StepExecutionResult::success())
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::from_result(StepExecutionResult::failure(message))
    }

    /// A capture without a structured result
    pub fn empty() -> Self {
        Self::default()
    }

    /// Attach a flow-control directive and optional status
    pub fn with_control(mut self, behavior: ControlBehavior, status: Option<String>) -> Self {
        self.control_behavior = Some(behavior);
        self.status_string = status;
        self
    }

    /// Shorthand for a halt directive
    pub fn halt(self, status: impl Into<String>) -> Self {
        self.with_control(ControlBehavior::Halt, Some(status.into()))
    }

    pub fn with_data(mut self, data: MultiDataContext) -> Self {
        self.result_data = data;
        self
    }

    pub fn with_file(mut self, file: ExecutionFile) -> Self {
        self.files.push(file);
        self
    }

    pub fn is_success(&self) -> bool {
        self.step_result.as_ref().is_some_and(|r| r.success)
    }

    pub fn is_halt(&self) -> bool {
        self.control_behavior == Some(ControlBehavior::Halt)
    }
}

/// The single entry point into step-specific logic
///
/// An `Err` is an unexpected fault; an ordinary failure is an `Ok` capture
/// whose result reports `success = false`.
#[async_trait]
pub trait StepExecutable: Send + Sync {
    async fn execute(&self, context: Arc<MultiDataContext>) -> anyhow::Result<StepResultCapture>;
}

/// Adapter turning an async closure into a [`StepExecutable`]
pub struct FnStep<F>(F);

/// Wrap an async closure as a step callable
pub fn step_fn<F, Fut>(f: F) -> FnStep<F>
where
    F: Fn(Arc<MultiDataContext>) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<StepResultCapture>> + Send + 'static,
{
    FnStep(f)
}

#[async_trait]
impl<F, Fut> StepExecutable for FnStep<F>
where
    F: Fn(Arc<MultiDataContext>) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<StepResultCapture>> + Send + 'static,
{
    async fn execute(&self, context: Arc<MultiDataContext>) -> anyhow::Result<StepResultCapture> {
        (self.0)(context).await
    }
}
