//! Trigger planning for common workflow strategies
//!
//! Steps are numbered from 1 with no gaps. A sequential step waits for the
//! step window of its predecessor to close (`after.step.<N-1>`); a parallel
//! step only waits for the workflow to start.

use crate::condition::Condition;
use crate::operation::{StepExecutable, StepOperation};
use crate::state::{GlobalKey, State, StepKey, VALUE_TRUE, WORKFLOW_STARTED};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// How steps relate to one another
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Each step starts after the previous one
    #[default]
    Sequential,
    /// All steps start as soon as the workflow starts
    Parallel,
}

/// Start and skip triggers for one step
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriggerPlan {
    pub start: State,
    pub skip: Option<State>,
    pub start_conditions: Vec<Condition>,
    pub skip_conditions: Vec<Condition>,
}

impl TriggerPlan {
    /// Plan the triggers for step `ordinal`
    ///
    /// Without `keep_going`, a sequential step is skipped once its
    /// predecessor's window has closed and any step has failed.
    pub fn for_step(strategy: Strategy, ordinal: u32, keep_going: bool) -> Self {
        let started = Condition::equals(GlobalKey::WorkflowState, WORKFLOW_STARTED);

        match strategy {
            Strategy::Sequential if ordinal > 1 => {
                let after_previous = Condition::equals(StepKey::after(ordinal - 1), VALUE_TRUE);
                let (skip, skip_conditions) = if keep_going {
                    (None, Vec::new())
                } else {
                    let any_failed = Condition::equals(GlobalKey::AnyStepFailed, VALUE_TRUE);
                    let conditions = vec![after_previous.clone(), any_failed];
                    (
                        Condition::all_of(conditions.clone()).as_trigger_state(),
                        conditions,
                    )
                };
                Self::from_conditions(vec![after_previous], skip, skip_conditions)
            }
            Strategy::Sequential | Strategy::Parallel => {
                Self::from_conditions(vec![started], None, Vec::new())
            }
        }
    }

    fn from_conditions(
        start_conditions: Vec<Condition>,
        skip: Option<State>,
        skip_conditions: Vec<Condition>,
    ) -> Self {
        let start = Condition::all_of(start_conditions.clone())
            .as_trigger_state()
            .unwrap_or_default();
        Self {
            start,
            skip,
            start_conditions,
            skip_conditions,
        }
    }

    /// Seed `before.step.<N> = true` for every step
    pub fn initial_state(ordinals: impl IntoIterator<Item = u32>) -> State {
        ordinals
            .into_iter()
            .map(|n| (StepKey::before(n).to_string(), VALUE_TRUE))
            .collect()
    }

    /// Build the step operation these triggers describe
    pub fn into_operation(
        self,
        ordinal: u32,
        executable: Arc<dyn StepExecutable>,
    ) -> StepOperation {
        let op = StepOperation::new(ordinal, executable, self.start)
            .with_start_conditions(self.start_conditions)
            .with_skip_conditions(self.skip_conditions);
        match self.skip {
            Some(skip) => op.with_skip_trigger(skip),
            None => op,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::{Operation, StepResultCapture, step_fn};

    fn state(pairs: &[(&str, &str)]) -> State {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_first_sequential_step_waits_for_start() {
        let plan = TriggerPlan::for_step(Strategy::Sequential, 1, false);

        assert_eq!(plan.start, state(&[("workflow.state", "started")]));
        assert!(plan.skip.is_none());
    }

    #[test]
    fn test_later_sequential_step() {
        let plan = TriggerPlan::for_step(Strategy::Sequential, 3, false);

        assert_eq!(plan.start, state(&[("after.step.2", "true")]));
        assert_eq!(
            plan.skip,
            Some(state(&[("after.step.2", "true"), ("step.any.state.failed", "true")]))
        );
        assert_eq!(plan.skip_conditions.len(), 2);
    }

    #[test]
    fn test_keep_going_has_no_skip() {
        let plan = TriggerPlan::for_step(Strategy::Sequential, 3, true);
        assert!(plan.skip.is_none());
        assert!(plan.skip_conditions.is_empty());
    }

    #[test]
    fn test_parallel_steps_start_together() {
        let a = TriggerPlan::for_step(Strategy::Parallel, 1, false);
        let b = TriggerPlan::for_step(Strategy::Parallel, 5, false);

        assert_eq!(a.start, b.start);
        assert!(b.skip.is_none());
    }

    #[test]
    fn test_initial_state() {
        let initial = TriggerPlan::initial_state([1, 2]);
        assert_eq!(initial, state(&[("before.step.1", "true"), ("before.step.2", "true")]));
    }

    #[test]
    fn test_into_operation() {
        let exec = Arc::new(step_fn(|_ctx| async {
            Ok::<_, anyhow::Error>(StepResultCapture::success())
        }));
        let op = TriggerPlan::for_step(Strategy::Sequential, 2, false).into_operation(2, exec);

        assert_eq!(op.ordinal(), 2);
        assert!(op.should_run(&state(&[("after.step.1", "true")])));
        assert!(op.should_skip(&state(&[
            ("after.step.1", "true"),
            ("step.any.state.failed", "true"),
        ])));
        assert_eq!(op.start_conditions().len(), 1);
    }
}
