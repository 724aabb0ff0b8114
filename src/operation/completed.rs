//! Result envelope returned after an operation runs

use super::result::StepResultCapture;
use crate::context::MultiDataContext;
use crate::state::StateDelta;
use chrono::{DateTime, Utc};

/// Outcome of one applied operation
#[derive(Debug, Clone)]
pub struct OperationCompleted {
    identity: String,
    ordinal: u32,
    new_state: StateDelta,
    capture: StepResultCapture,
    success: bool,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
}

impl OperationCompleted {
    pub fn new(
        identity: impl Into<String>,
        ordinal: u32,
        new_state: StateDelta,
        capture: StepResultCapture,
    ) -> Self {
        let now = Utc::now();
        Self {
            identity: identity.into(),
            ordinal,
            new_state,
            success: capture.is_success(),
            capture,
            started_at: now,
            finished_at: now,
        }
    }

    /// Record when execution began; the finish time is taken now
    pub fn with_timing(mut self, started_at: DateTime<Utc>) -> Self {
        self.started_at = started_at;
        self.finished_at = Utc::now();
        self
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn ordinal(&self) -> u32 {
        self.ordinal
    }

    /// State delta to merge into the authoritative state
    pub fn new_state(&self) -> &StateDelta {
        &self.new_state
    }

    /// Raw capture returned by the step callable
    pub fn capture(&self) -> &StepResultCapture {
        &self.capture
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Shared-data view produced by the step
    pub fn result(&self) -> &MultiDataContext {
        &self.capture.result_data
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }

    pub fn duration_ms(&self) -> u64 {
        (self.finished_at - self.started_at)
            .num_milliseconds()
            .max(0) as u64
    }
}
