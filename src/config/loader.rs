//! Configuration loading with multi-layer merge

use super::settings::LOG_LEVELS;
use super::{ConfigLayer, EngineSettings, LoggingConfig};
use crate::engine::TriggerPlan;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level stepflow configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StepflowConfig {
    #[serde(default)]
    pub engine: EngineSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl StepflowConfig {
    /// Load configuration from the standard hierarchy
    ///
    /// Load order (later overrides earlier):
    /// 1. Built-in defaults
    /// 2. ~/.config/stepflow/config.toml
    /// 3. .stepflow/config.toml (project)
    pub fn load(project_dir: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(user_config_path) = Self::user_config_path() {
            if user_config_path.exists() {
                let user_layer = ConfigLayer::load(&user_config_path)
                    .with_context(|| format!("loading {}", user_config_path.display()))?;
                config.merge(user_layer);
            }
        }

        let project_config_path = project_dir
            .map(|p| p.join(".stepflow/config.toml"))
            .unwrap_or_else(|| PathBuf::from(".stepflow/config.toml"));

        if project_config_path.exists() {
            let project_layer = ConfigLayer::load(&project_config_path)
                .with_context(|| format!("loading {}", project_config_path.display()))?;
            config.merge(project_layer);
        }

        tracing::debug!(
            max_concurrency = config.engine.max_concurrency,
            strategy = ?config.engine.strategy,
            "Loaded configuration"
        );

        config.checked()
    }

    /// Load and validate configuration from a specific file over the defaults
    pub fn load_file(path: &Path) -> Result<Self> {
        let mut config = Self::default();
        config.merge(ConfigLayer::load(path)?);
        config
            .checked()
            .with_context(|| format!("validating {}", path.display()))
    }

    /// Get the user config path (~/.config/stepflow/config.toml)
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("stepflow/config.toml"))
    }

    /// Apply a layer on top of this config; every value the layer sets wins
    pub fn merge(&mut self, layer: ConfigLayer) {
        let ConfigLayer { engine, logging } = layer;

        if let Some(max_concurrency) = engine.max_concurrency {
            self.engine.max_concurrency = max_concurrency;
        }
        if let Some(keep_going) = engine.keep_going {
            self.engine.keep_going = keep_going;
        }
        if let Some(strategy) = engine.strategy {
            self.engine.strategy = strategy;
        }

        if let Some(level) = logging.level {
            self.logging.level = level;
        }
        if let Some(json) = logging.json {
            self.logging.json = json;
        }
        if logging.file.is_some() {
            self.logging.file = logging.file;
        }
    }

    fn checked(self) -> Result<Self> {
        self.validate().map_err(|errors| {
            anyhow::anyhow!("invalid configuration:\n  {}", errors.join("\n  "))
        })?;
        Ok(self)
    }

    /// Check value ranges, collecting every problem
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.engine.max_concurrency == 0 {
            errors.push("engine.max_concurrency must be at least 1".to_string());
        }
        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(format!(
                "logging.level '{}' is not one of {}",
                self.logging.level,
                LOG_LEVELS.join(", ")
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Plan triggers for step `ordinal` with the configured strategy
    pub fn trigger_plan(&self, ordinal: u32) -> TriggerPlan {
        TriggerPlan::for_step(self.engine.strategy, ordinal, self.engine.keep_going)
    }
}
