//! One configuration file as written, before it is applied

use crate::engine::Strategy;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Values set by a single config file; `None` leaves the earlier layer alone
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigLayer {
    #[serde(default)]
    pub engine: EngineLayer,

    #[serde(default)]
    pub logging: LoggingLayer,
}

/// `[engine]` as written in one file
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineLayer {
    pub max_concurrency: Option<usize>,
    pub keep_going: Option<bool>,
    pub strategy: Option<Strategy>,
}

/// `[logging]` as written in one file
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingLayer {
    pub level: Option<String>,
    pub json: Option<bool>,
    pub file: Option<String>,
}

impl ConfigLayer {
    /// Read and parse one TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }
}
