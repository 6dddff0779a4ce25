//! Batch manifest: a list of commands to run concurrently
//!
//! ```toml
//! [[commands]]
//! name = "list-tmp"
//! command = "ls"
//! args = ["-la", "/tmp"]
//! timeout_ms = 5000
//! ```

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::RunError;
use crate::executor::Invocation;

/// One command in a batch manifest
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct CommandSpec {
    /// Unique name, used to match completions to entries
    pub name: String,

    /// Program to execute (no shell)
    pub command: String,

    #[serde(default)]
    pub args: Vec<String>,

    /// Timeout override in milliseconds
    pub timeout_ms: Option<u64>,
}

impl CommandSpec {
    /// Build the invocation, using `default_timeout` when no override is set
    pub fn to_invocation(&self, default_timeout: Duration) -> Invocation {
        let timeout = self
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(default_timeout);
        Invocation::new(&self.command)
            .args(&self.args)
            .timeout(timeout)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Manifest {
    #[serde(default)]
    pub commands: Vec<CommandSpec>,
}

impl Manifest {
    /// Parse and validate a manifest from TOML text
    pub fn parse(source: &str, origin: &str) -> Result<Self, RunError> {
        let manifest: Manifest = toml::from_str(source).map_err(|e| RunError::Manifest {
            path: origin.to_string(),
            message: e.to_string(),
        })?;
        manifest.validate(origin)?;
        Ok(manifest)
    }

    fn validate(&self, origin: &str) -> Result<(), RunError> {
        let invalid = |message: String| RunError::Manifest {
            path: origin.to_string(),
            message,
        };

        let mut seen = HashSet::new();
        for spec in &self.commands {
            if spec.name.trim().is_empty() {
                return Err(invalid("command entry with empty name".to_string()));
            }
            if spec.command.trim().is_empty() {
                return Err(invalid(format!("'{}' has an empty command", spec.name)));
            }
            if !seen.insert(spec.name.as_str()) {
                return Err(invalid(format!("duplicate command name '{}'", spec.name)));
            }
        }
        Ok(())
    }
}

/// Read and parse a manifest file
pub fn load_manifest(path: &Path) -> Result<Manifest, RunError> {
    let source = std::fs::read_to_string(path)?;
    Manifest::parse(&source, &path.display().to_string())
}
