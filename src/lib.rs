//! stepflow - rule-driven step orchestration
//!
//! Workflow steps are guarded by trigger states over a shared key/value
//! [`State`]. The [`WorkflowEngine`] repeatedly asks each [`Operation`]
//! whether it should be skipped or run, dispatches ready operations up to a
//! concurrency bound, and merges their state deltas until the run succeeds,
//! halts, stalls or is cancelled.

pub mod condition;
pub mod config;
pub mod context;
pub mod engine;
pub mod logging;
pub mod operation;
pub mod state;

pub use condition::Condition;
pub use config::StepflowConfig;
pub use context::{ExecutionFile, MultiDataContext};
pub use engine::{
    CancellationToken, EngineError, EngineListener, RunOutcome, RunReport, Strategy, TriggerPlan,
    WorkflowEngine, WorkflowEvent,
};
pub use operation::{
    ControlBehavior, Operation, OperationCompleted, OperationError, StepExecutable,
    StepExecutionResult, StepOperation, StepResultCapture, step_fn,
};
pub use state::{State, StateDelta, StepKey};
