//! Workflow engine
//!
//! The engine owns the authoritative [`State`](crate::state::State) for a
//! run. Each cycle it skips operations whose skip trigger holds, dispatches
//! ready operations up to the concurrency bound, and merges their deltas one
//! at a time as they complete.

mod cancel;
mod events;
mod outcome;
mod scheduler;
mod triggers;

pub use cancel::CancellationToken;
pub use events::{EngineListener, WorkflowEvent};
pub use outcome::{EngineError, FaultRecord, PendingOperation, RunOutcome, RunReport};
pub use scheduler::{DEFAULT_MAX_CONCURRENCY, WorkflowEngine};
pub use triggers::{Strategy, TriggerPlan};
