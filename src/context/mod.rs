//! Execution context collaborators
//!
//! Scope-keyed step data, typed component attachments and produced files.
//! The engine carries these through a run but never interprets them.

mod component;
mod data;
mod file;

pub use component::{ComponentRegistry, ContextComponent};
pub use data::{DataContext, GLOBAL_SCOPE, MultiDataContext};
pub use file::{DeletePolicy, ExecutionFile};
