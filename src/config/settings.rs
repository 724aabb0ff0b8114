//! Engine and logging sections of the configuration file

use crate::engine::{DEFAULT_MAX_CONCURRENCY, Strategy};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Accepted values for `logging.level`
pub(crate) const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// `[engine]` section
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EngineSettings {
    /// Maximum operations running at once
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Keep running sequential steps after one fails
    #[serde(default)]
    pub keep_going: bool,

    /// Trigger strategy used when planning steps
    #[serde(default)]
    pub strategy: Strategy,
}

fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            keep_going: false,
            strategy: Strategy::default(),
        }
    }
}

/// `[logging]` section
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Minimum level for stepflow's own events
    #[serde(default = "default_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,

    /// Also write logs to this file (`~` is expanded)
    pub file: Option<String>,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Log file path with `~` expanded
    pub fn file_path(&self) -> Option<PathBuf> {
        self.file
            .as_deref()
            .map(|f| PathBuf::from(shellexpand::tilde(f).into_owned()))
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let engine = EngineSettings::default();
        assert_eq!(engine.max_concurrency, 4);
        assert!(!engine.keep_going);
        assert_eq!(engine.strategy, Strategy::Sequential);

        let logging = LoggingConfig::default();
        assert_eq!(logging.level, "info");
        assert!(logging.file_path().is_none());
    }

    #[test]
    fn test_file_path_expands_home() {
        let logging = LoggingConfig::default().with_file("~/logs/run.log");
        let path = logging.file_path().unwrap();

        assert!(path.ends_with("logs/run.log"));
        if let Some(home) = dirs::home_dir() {
            assert!(path.starts_with(home));
        }
    }

    #[test]
    fn test_absolute_file_path_untouched() {
        let logging = LoggingConfig::default().with_file("/var/log/stepflow.log");
        assert_eq!(logging.file_path(), Some(PathBuf::from("/var/log/stepflow.log")));
    }
}
