//! Binds one workflow step to the operation contract

use super::completed::OperationCompleted;
use super::result::{ControlBehavior, StepExecutable, StepExecutionResult, StepResultCapture};
use super::{Lifecycle, Operation, OperationError};
use crate::condition::Condition;
use crate::context::MultiDataContext;
use crate::state::{
    GlobalKey, KeyKind, State, StateDelta, StepKey, StepRef, StepStatus, VALUE_FALSE, VALUE_TRUE,
};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

const NOT_STARTED: u8 = 0;
const RUNNING: u8 = 1;
const DONE: u8 = 2;

/// A workflow step scheduled by its trigger states
pub struct StepOperation {
    ordinal: u32,
    label: Option<String>,
    executable: Arc<dyn StepExecutable>,
    start_trigger: State,
    skip_trigger: Option<State>,
    start_conditions: Vec<Condition>,
    skip_conditions: Vec<Condition>,
    lifecycle: AtomicU8,
}

impl StepOperation {
    /// Create a step that runs once `start_trigger` is contained in the state
    pub fn new(ordinal: u32, executable: Arc<dyn StepExecutable>, start_trigger: State) -> Self {
        Self {
            ordinal,
            label: None,
            executable,
            start_trigger,
            skip_trigger: None,
            start_conditions: Vec::new(),
            skip_conditions: Vec::new(),
            lifecycle: AtomicU8::new(NOT_STARTED),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_skip_trigger(mut self, skip_trigger: State) -> Self {
        self.skip_trigger = Some(skip_trigger);
        self
    }

    /// Informational conditions describing the start trigger
    pub fn with_start_conditions(mut self, conditions: Vec<Condition>) -> Self {
        self.start_conditions = conditions;
        self
    }

    /// Informational conditions describing the skip trigger
    pub fn with_skip_conditions(mut self, conditions: Vec<Condition>) -> Self {
        self.skip_conditions = conditions;
        self
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn start_trigger(&self) -> &State {
        &self.start_trigger
    }

    pub fn skip_trigger(&self) -> Option<&State> {
        self.skip_trigger.as_ref()
    }

    pub fn start_conditions(&self) -> &[Condition] {
        &self.start_conditions
    }

    pub fn skip_conditions(&self) -> &[Condition] {
        &self.skip_conditions
    }

    pub fn lifecycle(&self) -> Lifecycle {
        match self.lifecycle.load(Ordering::SeqCst) {
            NOT_STARTED => Lifecycle::NotStarted,
            RUNNING => Lifecycle::Running,
            _ => Lifecycle::Done,
        }
    }

    /// True once the callable has been invoked
    pub fn did_run(&self) -> bool {
        self.lifecycle() != Lifecycle::NotStarted
    }

    fn label_ref(&self) -> Option<StepRef> {
        self.label.as_ref().map(|l| StepRef::Label(l.clone()))
    }

    /// Derive the state delta for a finished callable
    fn completion_state(&self, capture: &StepResultCapture) -> StateDelta {
        let mut changes = State::mutable();
        let result = capture.step_result.as_ref();
        let success = capture.is_success();
        let status = if success {
            StepStatus::Success
        } else {
            StepStatus::Failure
        };

        if let Some(result) = result {
            fold_result_data(&mut changes, StepRef::Ordinal(self.ordinal), result);
        }
        changes.update_state(StepKey::completed(self.ordinal), VALUE_TRUE);
        changes.update_state(StepKey::state(self.ordinal), status);

        if let Some(label) = self.label_ref() {
            changes.update_state(StepKey::state(label.clone()), status);
            changes.update_state(StepKey::completed(label.clone()), VALUE_TRUE);
            if let Some(result) = result {
                fold_result_data(&mut changes, label, result);
            }
        }

        if success {
            changes.update_state(GlobalKey::AnyStepSucceeded, VALUE_TRUE);
        } else {
            changes.update_state(GlobalKey::AnyStepFailed, VALUE_TRUE);
        }

        changes.update_state(StepKey::before(self.ordinal), VALUE_FALSE);
        changes.update_state(StepKey::after(self.ordinal), VALUE_TRUE);

        if let Some(behavior) = capture.control_behavior {
            changes.update_state(StepKey::flow_control(self.ordinal), behavior.to_string());
            if behavior == ControlBehavior::Halt {
                changes.update_state(GlobalKey::AnyFlowControlHalt, VALUE_TRUE);
            }
            if let Some(ref status) = capture.status_string {
                changes.update_state(StepKey::flow_control_status(self.ordinal), status.clone());
            }
        }

        changes
    }
}

/// Write result and failure data under the step's namespace
fn fold_result_data(changes: &mut StateDelta, step: StepRef, result: &StepExecutionResult) {
    for (scope, value) in &result.result_data {
        changes.update_state(
            StepKey::scoped(KeyKind::Result, step.clone(), scope.clone()),
            render_value(value),
        );
    }
    for (scope, value) in &result.failure_data {
        changes.update_state(
            StepKey::scoped(KeyKind::Failure, step.clone(), scope.clone()),
            render_value(value),
        );
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl Operation for StepOperation {
    fn identity(&self) -> String {
        self.ordinal.to_string()
    }

    fn ordinal(&self) -> u32 {
        self.ordinal
    }

    fn should_run(&self, state: &State) -> bool {
        state.has_state(&self.start_trigger)
    }

    fn should_skip(&self, state: &State) -> bool {
        self.skip_trigger
            .as_ref()
            .is_some_and(|skip| state.has_state(skip))
    }

    async fn apply(
        &self,
        context: Arc<MultiDataContext>,
    ) -> Result<OperationCompleted, OperationError> {
        if self
            .lifecycle
            .compare_exchange(NOT_STARTED, RUNNING, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(OperationError::AlreadyApplied {
                identity: self.identity(),
            });
        }

        let started_at = Utc::now();
        let outcome = self.executable.execute(context).await;
        self.lifecycle.store(DONE, Ordering::SeqCst);

        let capture = outcome.map_err(|source| OperationError::Step {
            ordinal: self.ordinal,
            source,
        })?;

        tracing::debug!(
            ordinal = self.ordinal,
            label = ?self.label,
            success = capture.is_success(),
            control = ?capture.control_behavior,
            "Step callable complete"
        );

        let changes = self.completion_state(&capture);
        Ok(OperationCompleted::new(self.identity(), self.ordinal, changes, capture).with_timing(started_at))
    }

    fn skip_state(&self, _state: &State) -> StateDelta {
        let mut changes = State::mutable();
        changes.update_state(StepKey::completed(self.ordinal), VALUE_FALSE);
        changes.update_state(StepKey::state(self.ordinal), StepStatus::Skipped);
        changes.update_state(GlobalKey::AnyStepSkipped, VALUE_TRUE);
        changes.update_state(StepKey::before(self.ordinal), VALUE_FALSE);
        changes.update_state(StepKey::after(self.ordinal), VALUE_TRUE);
        changes
    }

    fn failure_state(&self, _cause: &OperationError) -> StateDelta {
        let mut changes = State::mutable();
        changes.update_state(StepKey::completed(self.ordinal), VALUE_TRUE);
        changes.update_state(StepKey::state(self.ordinal), StepStatus::Failure);
        changes.update_state(StepKey::before(self.ordinal), VALUE_FALSE);
        changes.update_state(StepKey::after(self.ordinal), VALUE_TRUE);
        changes
    }

    fn waiting_on(&self, state: &State) -> Vec<String> {
        state
            .missing(&self.start_trigger)
            .into_iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect()
    }
}

impl fmt::Debug for StepOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepOperation")
            .field("ordinal", &self.ordinal)
            .field("label", &self.label)
            .field("lifecycle", &self.lifecycle())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::step_fn;

    fn returning(capture: StepResultCapture) -> Arc<dyn StepExecutable> {
        Arc::new(step_fn(move |_ctx| {
            let capture = capture.clone();
            async move { Ok::<_, anyhow::Error>(capture) }
        }))
    }

    fn faulting(message: &'static str) -> Arc<dyn StepExecutable> {
        Arc::new(step_fn(move |_ctx| async move {
            Err::<StepResultCapture, _>(anyhow::anyhow!(message))
        }))
    }

    fn state(pairs: &[(&str, &str)]) -> State {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_should_run_uses_containment() {
        let op = StepOperation::new(
            2,
            returning(StepResultCapture::success()),
            state(&[("step.completed.1", "true")]),
        );

        assert!(!op.should_run(&State::new()));
        assert!(op.should_run(&state(&[("step.completed.1", "true"), ("x", "y")])));
    }

    #[test]
    fn test_should_skip_requires_trigger() {
        let op = StepOperation::new(2, returning(StepResultCapture::success()), State::new());
        assert!(!op.should_skip(&state(&[("step.state.1", "failure")])));

        let op = op.with_skip_trigger(state(&[("step.state.1", "failure")]));
        assert!(op.should_skip(&state(&[("step.state.1", "failure")])));
        assert!(!op.should_skip(&state(&[("step.state.1", "success")])));
    }

    #[tokio::test]
    async fn test_apply_success_delta() {
        let op = StepOperation::new(1, returning(StepResultCapture::success()), State::new());

        let completed = op.apply(Arc::new(MultiDataContext::new())).await.unwrap();
        let delta = completed.new_state();

        assert!(completed.is_success());
        assert_eq!(completed.ordinal(), 1);
        assert_eq!(delta.get("step.completed.1"), Some("true"));
        assert_eq!(delta.get("step.state.1"), Some("success"));
        assert_eq!(delta.get("step.any.state.success"), Some("true"));
        assert_eq!(delta.get("step.any.state.failed"), None);
        assert_eq!(delta.get("before.step.1"), Some("false"));
        assert_eq!(delta.get("after.step.1"), Some("true"));
        assert_eq!(delta.get("step.flowcontrol.1"), None);
        assert!(op.did_run());
        assert_eq!(op.lifecycle(), Lifecycle::Done);
    }

    #[tokio::test]
    async fn test_apply_failure_delta() {
        let op = StepOperation::new(4, returning(StepResultCapture::failure("exit 1")), State::new());

        let completed = op.apply(Arc::new(MultiDataContext::new())).await.unwrap();
        let delta = completed.new_state();

        assert!(!completed.is_success());
        assert_eq!(delta.get("step.completed.4"), Some("true"));
        assert_eq!(delta.get("step.state.4"), Some("failure"));
        assert_eq!(delta.get("step.any.state.failed"), Some("true"));
        assert_eq!(delta.get("step.any.state.success"), None);
    }

    #[tokio::test]
    async fn test_missing_result_is_failure() {
        let op = StepOperation::new(1, returning(StepResultCapture::empty()), State::new());

        let completed = op.apply(Arc::new(MultiDataContext::new())).await.unwrap();

        assert!(!completed.is_success());
        assert_eq!(completed.new_state().get("step.state.1"), Some("failure"));
        assert_eq!(completed.new_state().get("step.any.state.failed"), Some("true"));
    }

    #[tokio::test]
    async fn test_label_mirrors_keys_and_data() {
        let result = StepExecutionResult::success()
            .with_result("node1", "ok")
            .with_result("node2", serde_json::json!({"rc": 0}))
            .with_failure("node3", "unreachable");
        let op = StepOperation::new(3, returning(StepResultCapture::from_result(result)), State::new())
            .with_label("deploy");

        let completed = op.apply(Arc::new(MultiDataContext::new())).await.unwrap();
        let delta = completed.new_state();

        assert_eq!(delta.get("step.state.label.deploy"), Some("success"));
        assert_eq!(delta.get("step.completed.label.deploy"), Some("true"));
        assert_eq!(delta.get("step.result.3.node1"), Some("ok"));
        assert_eq!(delta.get("step.result.label.deploy.node1"), Some("ok"));
        assert_eq!(delta.get("step.result.3.node2"), Some(r#"{"rc":0}"#));
        assert_eq!(delta.get("step.failure.3.node3"), Some("unreachable"));
        assert_eq!(delta.get("step.failure.label.deploy.node3"), Some("unreachable"));
    }

    #[tokio::test]
    async fn test_halt_sets_flow_control_keys() {
        let capture = StepResultCapture::success().halt("manual stop");
        let op = StepOperation::new(2, returning(capture), State::new());

        let completed = op.apply(Arc::new(MultiDataContext::new())).await.unwrap();
        let delta = completed.new_state();

        assert_eq!(delta.get("step.flowcontrol.2"), Some("Halt"));
        assert_eq!(delta.get("step.any.flowcontrol.halt"), Some("true"));
        assert_eq!(delta.get("step.flowcontrol.status.2"), Some("manual stop"));
    }

    #[tokio::test]
    async fn test_continue_does_not_halt() {
        let capture = StepResultCapture::success().with_control(ControlBehavior::Continue, None);
        let op = StepOperation::new(2, returning(capture), State::new());

        let completed = op.apply(Arc::new(MultiDataContext::new())).await.unwrap();
        let delta = completed.new_state();

        assert_eq!(delta.get("step.flowcontrol.2"), Some("Continue"));
        assert_eq!(delta.get("step.any.flowcontrol.halt"), None);
        assert_eq!(delta.get("step.flowcontrol.status.2"), None);
    }

    #[tokio::test]
    async fn test_callable_error_is_fault() {
        let op = StepOperation::new(5, faulting("kaboom"), State::new());

        let err = op.apply(Arc::new(MultiDataContext::new())).await.unwrap_err();
        assert!(matches!(err, OperationError::Step { ordinal: 5, .. }));

        let delta = op.failure_state(&err);
        assert_eq!(delta.get("step.completed.5"), Some("true"));
        assert_eq!(delta.get("step.state.5"), Some("failure"));
        assert_eq!(delta.get("before.step.5"), Some("false"));
        assert_eq!(delta.get("after.step.5"), Some("true"));
    }

    #[tokio::test]
    async fn test_apply_twice_is_rejected() {
        let op = StepOperation::new(1, returning(StepResultCapture::success()), State::new());
        op.apply(Arc::new(MultiDataContext::new())).await.unwrap();

        let err = op.apply(Arc::new(MultiDataContext::new())).await.unwrap_err();
        assert!(matches!(err, OperationError::AlreadyApplied { .. }));
    }

    #[test]
    fn test_skip_state_round_trip() {
        let op = StepOperation::new(2, returning(StepResultCapture::success()), State::new());
        let delta = op.skip_state(&State::new());
        let merged = State::new().merge(&delta);

        assert_eq!(merged.get("step.state.2"), Some("skipped"));
        assert_eq!(merged.get("step.completed.2"), Some("false"));
        assert_eq!(merged.get("step.any.state.skipped"), Some("true"));
        assert_eq!(merged.get("step.any.state.success"), None);
        assert_eq!(merged.get("after.step.2"), Some("true"));
        assert!(!op.did_run());
    }

    #[test]
    fn test_waiting_on_lists_unmet_entries() {
        let op = StepOperation::new(
            2,
            returning(StepResultCapture::success()),
            state(&[("step.completed.1", "true"), ("workflow.state", "started")]),
        );

        let waiting = op.waiting_on(&state(&[("workflow.state", "started")]));
        assert_eq!(waiting, vec!["step.completed.1=true".to_string()]);
    }
}
