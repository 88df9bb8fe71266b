//! Remote execution through the system `ssh` client.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{run_process, CommandOutput, Host, RemoteExecutor};
use crate::error::ExecError;

/// Exit status `ssh` uses for its own errors (as opposed to the remote command's).
const SSH_ERROR_STATUS: i32 = 255;

/// Options for the `ssh` transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SshSettings {
    /// Client binary to invoke.
    pub program: String,

    /// Default login user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// Default port.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Private key passed with `-i`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_file: Option<PathBuf>,

    /// Extra `-o` options, e.g. `StrictHostKeyChecking=accept-new`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            program: "ssh".to_string(),
            user: None,
            port: None,
            identity_file: None,
            options: Vec::new(),
        }
    }
}

/// Runs commands on remote hosts with `ssh`.
#[derive(Debug, Clone)]
pub struct SshExecutor {
    settings: SshSettings,
    connect_timeout: Option<Duration>,
}

impl SshExecutor {
    /// Create an executor with the given client settings.
    pub fn new(settings: SshSettings, connect_timeout: Option<Duration>) -> Self {
        Self {
            settings,
            connect_timeout,
        }
    }

    /// Build the `ssh` argument list for running `command` on `host`.
    pub fn build_args(&self, host: &Host, command: &str) -> Vec<String> {
        let mut args = vec!["-o".to_string(), "BatchMode=yes".to_string()];

        if let Some(timeout) = self.connect_timeout {
            args.push("-o".to_string());
            args.push(format!("ConnectTimeout={}", timeout.as_secs().max(1)));
        }

        if let Some(port) = host.port.or(self.settings.port) {
            args.push("-p".to_string());
            args.push(port.to_string());
        }

        if let Some(identity) = &self.settings.identity_file {
            args.push("-i".to_string());
            args.push(identity.display().to_string());
        }

        for option in &self.settings.options {
            args.push("-o".to_string());
            args.push(option.clone());
        }

        args.push(destination(host, self.settings.user.as_deref()));
        args.push(command.to_string());
        args
    }
}

/// `user@address`, or just the address when no user is configured.
fn destination(host: &Host, default_user: Option<&str>) -> String {
    match host.user.as_deref().or(default_user) {
        Some(user) => format!("{}@{}", user, host.address),
        None => host.address.clone(),
    }
}

impl RemoteExecutor for SshExecutor {
    fn name(&self) -> &'static str {
        "ssh"
    }

    fn execute(
        &self,
        host: &Host,
        command: &str,
        timeout: Option<Duration>,
    ) -> Result<CommandOutput, ExecError> {
        let args = self.build_args(host, command);
        debug!("ssh {} -- {}", host.address, command);

        let output = run_process(&self.settings.program, &args, &[], timeout, &host.name)?;

        if output.exit_code == Some(SSH_ERROR_STATUS) {
            return Err(ExecError::Connection {
                host: host.name.clone(),
                message: first_line(&output.stderr)
                    .unwrap_or("ssh exited with status 255")
                    .to_string(),
            });
        }

        Ok(output)
    }

    fn connect(&self, host: &Host, timeout: Option<Duration>) -> Result<(), ExecError> {
        let probe = self.execute(host, "true", timeout.or(self.connect_timeout))?;
        if probe.success() {
            Ok(())
        } else {
            Err(ExecError::Connection {
                host: host.name.clone(),
                message: format!("connection probe exited with {:?}", probe.exit_code),
            })
        }
    }
}

fn first_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).find(|l| !l.is_empty())
}
