//! Observation hooks for a running workflow

use super::outcome::RunOutcome;
use std::sync::Arc;

/// Something that happened on the control loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowEvent {
    Started { operations: usize },
    Skipped { ordinal: u32 },
    Dispatched { ordinal: u32 },
    Completed { ordinal: u32, success: bool },
    Faulted { ordinal: u32, message: String },
    HaltRequested { ordinal: u32, status: Option<String> },
    Finished { outcome: RunOutcome },
}

/// Receives workflow events
///
/// Called synchronously from the control loop; implementations must not block.
pub trait EngineListener: Send + Sync {
    fn on_event(&self, event: &WorkflowEvent);
}

/// Fan-out to registered listeners
#[derive(Clone, Default)]
pub(crate) struct Listeners {
    listeners: Vec<Arc<dyn EngineListener>>,
}

impl Listeners {
    pub(crate) fn push(&mut self, listener: Arc<dyn EngineListener>) {
        self.listeners.push(listener);
    }

    pub(crate) fn emit(&self, event: WorkflowEvent) {
        for listener in &self.listeners {
            listener.on_event(&event);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.listeners.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<WorkflowEvent>>);

    impl EngineListener for Recorder {
        fn on_event(&self, event: &WorkflowEvent) {
            self.0.lock().unwrap().push(event.clone());
        }
    }

    #[test]
    fn test_emit_reaches_every_listener() {
        let a = Arc::new(Recorder::default());
        let b = Arc::new(Recorder::default());
        let mut listeners = Listeners::default();
        listeners.push(a.clone());
        listeners.push(b.clone());

        listeners.emit(WorkflowEvent::Skipped { ordinal: 3 });

        assert_eq!(listeners.len(), 2);
        assert_eq!(*a.0.lock().unwrap(), vec![WorkflowEvent::Skipped { ordinal: 3 }]);
        assert_eq!(b.0.lock().unwrap().len(), 1);
    }
}
