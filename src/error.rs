//! Error types for procwatch
//!
//! Only failures that happen before a child process is running are errors.
//! Everything that happens afterwards (non-zero exit, timeout, read failures)
//! is reported through the completion instead.

use std::io::ErrorKind;

use serde::Serialize;
use thiserror::Error;

/// Main error type for runner operations
#[derive(Error, Debug)]
pub enum RunError {
    /// The command string was empty
    #[error("Command must not be empty")]
    EmptyCommand,

    /// Failed to spawn the command
    #[error("Failed to spawn command: {command}")]
    SpawnFailed {
        command: String,
        error: String,
        kind: ErrorKind,
    },

    /// No tokio runtime to drive the invocation
    #[error("No tokio runtime available: {0}")]
    NoRuntime(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Batch manifest could not be read or parsed
    #[error("Invalid manifest {path}: {message}")]
    Manifest { path: String, message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RunError {
    /// Build a spawn failure from the io error returned by `Command::spawn`
    pub fn spawn_failed(command: impl Into<String>, err: &std::io::Error) -> Self {
        RunError::SpawnFailed {
            command: command.into(),
            error: err.to_string(),
            kind: err.kind(),
        }
    }

    /// Whether this error means the child never started
    pub fn is_spawn_failure(&self) -> bool {
        matches!(self, RunError::EmptyCommand | RunError::SpawnFailed { .. })
    }
}

/// Serializable error info for JSON output
#[derive(Debug, Serialize, Clone)]
pub struct ErrorInfo {
    pub message: String,
    pub error_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl From<&RunError> for ErrorInfo {
    fn from(err: &RunError) -> Self {
        match err {
            RunError::EmptyCommand => ErrorInfo {
                message: err.to_string(),
                error_type: "empty_command".to_string(),
                suggestion: Some("Pass the program to run after `--`".to_string()),
            },
            RunError::SpawnFailed {
                command,
                error,
                kind,
            } => ErrorInfo {
                message: format!("Failed to spawn command: {}: {}", command, error),
                error_type: "spawn_failed".to_string(),
                suggestion: suggest_fix(command, *kind),
            },
            RunError::NoRuntime(_) => ErrorInfo {
                message: err.to_string(),
                error_type: "no_runtime".to_string(),
                suggestion: Some(
                    "Create the runner inside a tokio runtime or pass a Handle".to_string(),
                ),
            },
            RunError::Config(_) => ErrorInfo {
                message: err.to_string(),
                error_type: "config_error".to_string(),
                suggestion: Some("Check your procwatch configuration file".to_string()),
            },
            RunError::Manifest { .. } => ErrorInfo {
                message: err.to_string(),
                error_type: "manifest_error".to_string(),
                suggestion: Some(
                    "Each [[commands]] entry needs a `name` and a `command`".to_string(),
                ),
            },
            RunError::Io(_) => ErrorInfo {
                message: err.to_string(),
                error_type: "io_error".to_string(),
                suggestion: None,
            },
        }
    }
}

/// Suggest fixes for common spawn failures
pub fn suggest_fix(command: &str, kind: ErrorKind) -> Option<String> {
    match kind {
        ErrorKind::NotFound => {
            if command.contains('/') {
                Some(format!("'{}' does not exist. Check the path.", command))
            } else if which::which(command).is_err() {
                Some(format!(
                    "'{}' was not found on PATH. Install it or use an absolute path.",
                    command
                ))
            } else {
                Some(format!(
                    "'{}' resolves on PATH but could not be started. Check its interpreter line.",
                    command
                ))
            }
        }
        ErrorKind::PermissionDenied => Some(format!(
            "Permission denied for '{}'. Check that the file is executable.",
            command
        )),
        ErrorKind::OutOfMemory => {
            Some("The system refused to create the process. Too many processes?".to_string())
        }
        _ => None,
    }
}
