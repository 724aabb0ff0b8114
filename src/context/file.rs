//! Files produced by a step, passed through to the caller untouched

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Policy for deleting a produced file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletePolicy {
    #[default]
    Always,
    /// Never delete the produced file (required for other use)
    Never,
    /// Delete only when it can be retrieved again later
    WhenRetrievable,
}

/// A file produced during execution
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ExecutionFile {
    pub local_file: PathBuf,

    /// False if this file does not need to be stored (optional output)
    #[serde(default = "default_should_be_stored")]
    pub should_be_stored: bool,

    #[serde(default)]
    pub delete_policy: DeletePolicy,
}

fn default_should_be_stored() -> bool {
    true
}

impl ExecutionFile {
    pub fn new(local_file: impl Into<PathBuf>, delete_policy: DeletePolicy) -> Self {
        Self {
            local_file: local_file.into(),
            should_be_stored: default_should_be_stored(),
            delete_policy,
        }
    }

    /// Mark the file as optional output
    pub fn optional(mut self) -> Self {
        self.should_be_stored = false;
        self
    }

    pub fn path(&self) -> &Path {
        &self.local_file
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let file = ExecutionFile::new("/tmp/out.log", DeletePolicy::Never);
        assert!(file.should_be_stored);
        assert_eq!(file.path(), Path::new("/tmp/out.log"));

        let optional = file.optional();
        assert!(!optional.should_be_stored);
        assert_eq!(optional.delete_policy, DeletePolicy::Never);
    }

    #[test]
    fn test_deserialize_applies_defaults() {
        let file: ExecutionFile =
            serde_json::from_str(r#"{"local_file": "/tmp/a", "delete_policy": "when_retrievable"}"#)
                .unwrap();
        assert!(file.should_be_stored);
        assert_eq!(file.delete_policy, DeletePolicy::WhenRetrievable);

        let file: ExecutionFile = serde_json::from_str(r#"{"local_file": "/tmp/b"}"#).unwrap();
        assert_eq!(file.delete_policy, DeletePolicy::Always);
    }
}
