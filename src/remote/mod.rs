//! Remote command execution.
//!
//! The orchestrator never talks to a host directly: it goes through a
//! [`RemoteExecutor`], which runs one shell command on one host and hands
//! back the exit code and captured output.
//!
//! - [`SshExecutor`] shells out to the system `ssh` binary
//! - [`LocalExecutor`] runs commands through the local shell
//! - [`MockExecutor`] is a scripted double for tests

pub mod local;
pub mod mock;
pub mod process;
pub mod ssh;

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ExecError;

pub use local::LocalExecutor;
pub use mock::{ExecCall, MockExecutor, MockResponse};
pub use process::run_process;
pub use ssh::{SshExecutor, SshSettings};

/// A deployment target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    /// Name the host is known by in configuration and reports.
    pub name: String,

    /// Network address (defaults to the name).
    pub address: String,

    /// Login user, overriding the transport default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// Port, overriding the transport default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl Host {
    /// Create a host whose address is its name.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            address: name.clone(),
            name,
            user: None,
            port: None,
        }
    }

    /// Set the network address.
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    /// Set the login user.
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Set the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Output of a command that ran to completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code (None if killed by signal).
    pub exit_code: Option<i32>,

    /// Standard output.
    pub stdout: String,

    /// Standard error.
    pub stderr: String,

    /// Execution duration.
    pub duration: Duration,
}

impl CommandOutput {
    /// Whether the command exited with status 0.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs shell commands on remote hosts.
///
/// Implementations must be shareable across the orchestrator's worker
/// threads. Calls are synchronous: `execute` returns once the command has
/// exited, failed to connect, or exceeded `timeout`.
pub trait RemoteExecutor: Send + Sync {
    /// Short transport name used in logs.
    fn name(&self) -> &'static str;

    /// Run `command` on `host`.
    ///
    /// A non-zero exit status is a normal `Ok` result. Only an unreachable
    /// host or an expired timeout is an error.
    fn execute(
        &self,
        host: &Host,
        command: &str,
        timeout: Option<Duration>,
    ) -> Result<CommandOutput, ExecError>;

    /// Check that `host` is reachable before any step runs.
    fn connect(&self, host: &Host, timeout: Option<Duration>) -> Result<(), ExecError> {
        let _ = (host, timeout);
        Ok(())
    }
}

impl<E: RemoteExecutor + ?Sized> RemoteExecutor for &E {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn execute(
        &self,
        host: &Host,
        command: &str,
        timeout: Option<Duration>,
    ) -> Result<CommandOutput, ExecError> {
        (**self).execute(host, command, timeout)
    }

    fn connect(&self, host: &Host, timeout: Option<Duration>) -> Result<(), ExecError> {
        (**self).connect(host, timeout)
    }
}

impl<E: RemoteExecutor + ?Sized> RemoteExecutor for Box<E> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn execute(
        &self,
        host: &Host,
        command: &str,
        timeout: Option<Duration>,
    ) -> Result<CommandOutput, ExecError> {
        (**self).execute(host, command, timeout)
    }

    fn connect(&self, host: &Host, timeout: Option<Duration>) -> Result<(), ExecError> {
        (**self).connect(host, timeout)
    }
}
