//! Workflow engine - drives operations to completion against one state

use super::cancel::CancellationToken;
use super::events::{EngineListener, Listeners, WorkflowEvent};
use super::outcome::{
    EngineError, FaultRecord, PendingOperation, RunOutcome, RunReport, failed_ordinals,
};
use crate::config::StepflowConfig;
use crate::context::{ExecutionFile, MultiDataContext};
use crate::operation::{Lifecycle, Operation, OperationCompleted, OperationError};
use crate::state::{GlobalKey, State, StateDelta, VALUE_TRUE, WORKFLOW_DONE, WORKFLOW_STARTED};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Default bound on concurrently running operations
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Rule engine scheduling operations from their trigger predicates
#[derive(Clone)]
pub struct WorkflowEngine {
    max_concurrency: usize,
    listeners: Listeners,
    cancellation: Option<CancellationToken>,
}

impl WorkflowEngine {
    /// Create an engine running at most `max_concurrency` operations at once
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            max_concurrency,
            listeners: Listeners::default(),
            cancellation: None,
        }
    }

    /// Create an engine from loaded configuration
    pub fn from_config(config: &StepflowConfig) -> Self {
        Self::new(config.engine.max_concurrency)
    }

    pub fn with_listener(mut self, listener: Arc<dyn EngineListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Run `operations` from `initial_state` until a terminal condition
    ///
    /// Every terminal condition (including a stall) is returned as a
    /// [`RunReport`]; use [`RunReport::into_result`] to treat a stall as an
    /// error. `Err` is only returned for an invalid engine or operation set.
    pub async fn run(
        &self,
        operations: Vec<Arc<dyn Operation>>,
        initial_state: State,
        data: MultiDataContext,
    ) -> Result<RunReport, EngineError> {
        if self.max_concurrency == 0 {
            return Err(EngineError::InvalidConcurrency);
        }

        let mut seen = HashSet::new();
        for op in &operations {
            if !seen.insert(op.ordinal()) {
                return Err(EngineError::DuplicateOrdinal {
                    ordinal: op.ordinal(),
                });
            }
        }

        let mut slots: Vec<Slot> = operations
            .into_iter()
            .map(|op| Slot {
                op,
                lifecycle: Lifecycle::NotStarted,
            })
            .collect();
        slots.sort_by_key(|slot| slot.op.ordinal());

        let (tx, rx) = mpsc::unbounded_channel();
        let run = RunLoop {
            max_concurrency: self.max_concurrency,
            listeners: self.listeners.clone(),
            cancellation: self.cancellation.clone(),
            state: initial_state,
            data,
            slots,
            in_flight: 0,
            tx,
            rx,
            completions: Vec::new(),
            skipped: Vec::new(),
            faulted: Vec::new(),
            files: Vec::new(),
            halted_by: None,
            started_at: Utc::now(),
        };

        Ok(run.drive().await)
    }
}

impl Default for WorkflowEngine {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENCY)
    }
}

impl std::fmt::Debug for WorkflowEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowEngine")
            .field("max_concurrency", &self.max_concurrency)
            .field("listeners", &self.listeners.len())
            .field("cancellation", &self.cancellation)
            .finish()
    }
}

struct Slot {
    op: Arc<dyn Operation>,
    lifecycle: Lifecycle,
}

/// Message from a worker task back to the control loop
struct Finished {
    index: usize,
    result: Result<OperationCompleted, OperationError>,
}

/// State owned by the control loop for one run
struct RunLoop {
    max_concurrency: usize,
    listeners: Listeners,
    cancellation: Option<CancellationToken>,
    state: State,
    data: MultiDataContext,
    slots: Vec<Slot>,
    in_flight: usize,
    tx: mpsc::UnboundedSender<Finished>,
    rx: mpsc::UnboundedReceiver<Finished>,
    completions: Vec<OperationCompleted>,
    skipped: Vec<u32>,
    faulted: Vec<FaultRecord>,
    files: Vec<ExecutionFile>,
    halted_by: Option<(u32, Option<String>)>,
    started_at: chrono::DateTime<Utc>,
}

impl RunLoop {
    async fn drive(mut self) -> RunReport {
        tracing::info!(
            operations = self.slots.len(),
            max_concurrency = self.max_concurrency,
            "Workflow run started"
        );
        self.listeners.emit(WorkflowEvent::Started {
            operations: self.slots.len(),
        });
        self.merge(&StateDelta::new().with(GlobalKey::WorkflowState, WORKFLOW_STARTED));

        loop {
            if !self.stopping() {
                self.settle_skips();
                self.dispatch_ready();
            }

            if self.in_flight == 0 {
                break;
            }

            let finished = match &self.cancellation {
                Some(token) if !token.is_cancelled() => {
                    tokio::select! {
                        finished = self.rx.recv() => finished,
                        _ = token.cancelled() => {
                            tracing::warn!(in_flight = self.in_flight, "Cancellation requested, draining");
                            continue;
                        }
                    }
                }
                _ => self.rx.recv().await,
            };

            match finished {
                Some(finished) => self.absorb(finished),
                // unreachable while the loop holds a sender
                None => break,
            }
        }

        self.finish()
    }

    fn halt_requested(&self) -> bool {
        self.state.get(GlobalKey::AnyFlowControlHalt.as_str()) == Some(VALUE_TRUE)
    }

    fn cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    /// True once no new operations may be dispatched
    fn stopping(&self) -> bool {
        self.halt_requested() || self.cancelled()
    }

    /// The single merge point for state deltas
    fn merge(&mut self, delta: &StateDelta) {
        self.state = self.state.merge(delta);
        tracing::debug!(changes = delta.len(), total = self.state.len(), "Merged state delta");
    }

    /// Skip every not-started operation whose skip trigger holds, repeating
    /// until no further skips become possible
    fn settle_skips(&mut self) {
        loop {
            let snapshot = self.state.clone();
            let skippable: Vec<usize> = self
                .slots
                .iter()
                .enumerate()
                .filter(|(_, slot)| slot.lifecycle == Lifecycle::NotStarted)
                .filter(|(_, slot)| slot.op.should_skip(&snapshot))
                .map(|(index, _)| index)
                .collect();

            if skippable.is_empty() {
                return;
            }

            for index in skippable {
                let delta = self.slots[index].op.skip_state(&snapshot);
                let ordinal = self.slots[index].op.ordinal();
                self.slots[index].lifecycle = Lifecycle::Done;
                self.merge(&delta);
                self.skipped.push(ordinal);
                tracing::debug!(ordinal, "Skipped operation");
                self.listeners.emit(WorkflowEvent::Skipped { ordinal });
            }
        }
    }

    /// Dispatch run-ready operations in ordinal order up to the concurrency bound
    fn dispatch_ready(&mut self) {
        let capacity = self.max_concurrency.saturating_sub(self.in_flight);
        if capacity == 0 {
            return;
        }

        let snapshot = &self.state;
        let ready: Vec<usize> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.lifecycle == Lifecycle::NotStarted)
            .filter(|(_, slot)| !slot.op.should_skip(snapshot) && slot.op.should_run(snapshot))
            .map(|(index, _)| index)
            .take(capacity)
            .collect();

        if ready.is_empty() {
            return;
        }

        let context = Arc::new(self.data.clone());
        for index in ready {
            let slot = &mut self.slots[index];
            slot.lifecycle = Lifecycle::Running;
            self.in_flight += 1;

            let ordinal = slot.op.ordinal();
            tracing::debug!(ordinal, in_flight = self.in_flight, "Dispatching operation");
            self.listeners.emit(WorkflowEvent::Dispatched { ordinal });

            spawn_operation(
                index,
                Arc::clone(&slot.op),
                Arc::clone(&context),
                self.tx.clone(),
            );
        }
    }

    /// Fold one finished operation into the authoritative state
    fn absorb(&mut self, finished: Finished) {
        self.in_flight -= 1;
        let op = Arc::clone(&self.slots[finished.index].op);
        self.slots[finished.index].lifecycle = Lifecycle::Done;
        let ordinal = op.ordinal();

        match finished.result {
            Ok(completed) => {
                self.merge(completed.new_state());
                self.data.merge(completed.result());
                self.files.extend(completed.capture().files.iter().cloned());

                let success = completed.is_success();
                tracing::debug!(
                    ordinal,
                    success,
                    duration_ms = completed.duration_ms(),
                    "Operation completed"
                );
                self.listeners
                    .emit(WorkflowEvent::Completed { ordinal, success });

                if completed.capture().is_halt() {
                    let status = completed.capture().status_string.clone();
                    tracing::warn!(ordinal, status = ?status, "Step requested halt");
                    if self.halted_by.is_none() {
                        self.halted_by = Some((ordinal, status.clone()));
                    }
                    self.listeners
                        .emit(WorkflowEvent::HaltRequested { ordinal, status });
                }

                self.completions.push(completed);
            }
            Err(err) => {
                let message = err.to_string();
                tracing::warn!(ordinal, error = %message, "Operation faulted");

                let delta = op.failure_state(&err);
                self.merge(&delta);
                // a fault counts as a failed step for any-failed skip triggers
                self.merge(&StateDelta::new().with(GlobalKey::AnyStepFailed, VALUE_TRUE));
                self.faulted.push(FaultRecord {
                    ordinal,
                    identity: op.identity(),
                    message: message.clone(),
                });
                self.listeners
                    .emit(WorkflowEvent::Faulted { ordinal, message });
            }
        }
    }

    fn finish(mut self) -> RunReport {
        self.merge(&StateDelta::new().with(GlobalKey::WorkflowState, WORKFLOW_DONE));

        let remaining: Vec<&Slot> = self
            .slots
            .iter()
            .filter(|slot| !slot.lifecycle.is_done())
            .collect();

        let outcome = if self.cancelled() && !remaining.is_empty() {
            RunOutcome::Cancelled
        } else if self.halt_requested() {
            let (ordinal, status) = match self.halted_by.clone() {
                Some((ordinal, status)) => (Some(ordinal), status),
                None => (None, None),
            };
            RunOutcome::Halted { ordinal, status }
        } else if !remaining.is_empty() {
            let pending: Vec<PendingOperation> = remaining
                .iter()
                .map(|slot| PendingOperation {
                    ordinal: slot.op.ordinal(),
                    identity: slot.op.identity(),
                    waiting_on: slot.op.waiting_on(&self.state),
                })
                .collect();
            tracing::error!(
                pending = ?pending.iter().map(|p| p.ordinal).collect::<Vec<_>>(),
                "Workflow stalled: no operation can become ready"
            );
            RunOutcome::Stalled { pending }
        } else {
            let failed = failed_ordinals(&self.completions, &self.faulted);
            if failed.is_empty() {
                RunOutcome::Succeeded
            } else {
                RunOutcome::CompletedWithFailures { failed }
            }
        };

        tracing::info!(
            outcome = outcome.as_str(),
            completed = self.completions.len(),
            skipped = self.skipped.len(),
            faulted = self.faulted.len(),
            "Workflow run finished"
        );
        self.listeners.emit(WorkflowEvent::Finished {
            outcome: outcome.clone(),
        });

        RunReport {
            outcome,
            state: self.state,
            completions: self.completions,
            skipped: self.skipped,
            faulted: self.faulted,
            data: self.data,
            files: self.files,
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }
}

/// Run one operation on the runtime and report back to the control loop
///
/// A panic inside the operation is caught at the join handle and reported
/// as a fault.
fn spawn_operation(
    index: usize,
    op: Arc<dyn Operation>,
    context: Arc<MultiDataContext>,
    tx: mpsc::UnboundedSender<Finished>,
) {
    let identity = op.identity();
    tokio::spawn(async move {
        let handle = tokio::spawn(async move { op.apply(context).await });
        let result = match handle.await {
            Ok(result) => result,
            Err(e) => Err(OperationError::Panicked {
                identity,
                message: e.to_string(),
            }),
        };
        let _ = tx.send(Finished { index, result });
    });
}
