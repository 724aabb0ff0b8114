//! Configuration types and loading for stepflow

mod layer;
mod loader;
mod settings;

pub use layer::{ConfigLayer, EngineLayer, LoggingLayer};
pub use loader::StepflowConfig;
pub use settings::{EngineSettings, LoggingConfig};
