//! Error types for convoy operations.
//!
//! This module defines [`ConvoyError`], the error type used for everything
//! that can stop a command before or after a deployment run, and
//! [`ExecError`], the failures a [`RemoteExecutor`](crate::remote::RemoteExecutor)
//! reports for a single remote command.
//!
//! # Error Handling Strategy
//!
//! - Step failures during a run are data, not errors: they are recorded in
//!   the [`DeploymentRun`](crate::runner::DeploymentRun) report
//! - Use `ConvoyError` for configuration, planning and history problems
//! - Use `anyhow::Error` (via `ConvoyError::Other`) for unexpected errors

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Core error type for convoy operations.
#[derive(Debug, Error)]
pub enum ConvoyError {
    /// Configuration file not found at expected location.
    #[error("Configuration not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Failed to parse configuration file.
    #[error("Failed to parse config at {path}: {message}")]
    ConfigParseError { path: PathBuf, message: String },

    /// Invalid configuration structure or values.
    #[error("Invalid configuration: {message}")]
    ConfigValidationError { message: String },

    /// A command template is malformed.
    #[error("Invalid command template '{template}': {message}")]
    TemplateSyntax { template: String, message: String },

    /// A placeholder has no value for the host it runs on.
    #[error("Unresolved placeholder ${{{name}}} for host '{host}'")]
    UnresolvedPlaceholder { name: String, host: String },

    /// Two host plans in one run share a name.
    #[error("Host '{host}' appears more than once in the run")]
    DuplicateHost { host: String },

    /// Reading or writing run history failed.
    #[error("Run history error at {path}: {message}")]
    HistoryError { path: PathBuf, message: String },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic wrapped error for anyhow interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for convoy operations.
pub type Result<T> = std::result::Result<T, ConvoyError>;

impl ConvoyError {
    /// Process exit code for this error.
    ///
    /// Problems with the deployment file exit with 2 so scripts can tell a
    /// broken setup apart from a failed deployment (1).
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConfigNotFound { .. }
            | Self::ConfigParseError { .. }
            | Self::ConfigValidationError { .. }
            | Self::TemplateSyntax { .. }
            | Self::UnresolvedPlaceholder { .. }
            | Self::DuplicateHost { .. } => 2,
            _ => 1,
        }
    }
}

/// Failure of a single remote command execution.
///
/// A non-zero exit status is not an `ExecError`; it comes back as a normal
/// [`CommandOutput`](crate::remote::CommandOutput).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecError {
    /// The host could not be reached.
    #[error("Connection to '{host}' failed: {message}")]
    Connection { host: String, message: String },

    /// The command did not finish within its timeout.
    #[error("Command on '{host}' timed out after {}s", .after.as_secs())]
    Timeout { host: String, after: Duration },

    /// The transport process could not be started.
    #[error("Failed to start '{program}': {message}")]
    Spawn { program: String, message: String },
}

impl ExecError {
    /// Whether this failure means the host itself is unreachable.
    pub fn is_connection(&self) -> bool {
        matches!(self, ExecError::Connection { .. } | ExecError::Spawn { .. })
    }
}
