//! Execution through the local shell.
//!
//! Every "host" maps to the machine convoy runs on. The target host's name
//! and address are exported as `CONVOY_HOST` and `CONVOY_ADDRESS` so a
//! command can tell the hosts apart.

use std::time::Duration;

use super::{run_process, CommandOutput, Host, RemoteExecutor};
use crate::error::ExecError;

/// Runs commands with the local shell.
#[derive(Debug, Clone, Default)]
pub struct LocalExecutor;

impl LocalExecutor {
    /// Create a local executor.
    pub fn new() -> Self {
        Self
    }
}

impl RemoteExecutor for LocalExecutor {
    fn name(&self) -> &'static str {
        "local"
    }

    fn execute(
        &self,
        host: &Host,
        command: &str,
        timeout: Option<Duration>,
    ) -> Result<CommandOutput, ExecError> {
        let envs = vec![
            ("CONVOY_HOST".to_string(), host.name.clone()),
            ("CONVOY_ADDRESS".to_string(), host.address.clone()),
        ];
        let args = vec![shell_flag().to_string(), command.to_string()];
        run_process(&detect_shell(), &args, &envs, timeout, &host.name)
    }
}

/// Shell used for local execution.
///
/// Always a POSIX shell on Unix regardless of `$SHELL`, so that commands
/// behave the same as on a remote `sh`.
fn detect_shell() -> String {
    if cfg!(target_os = "windows") {
        std::env::var("COMSPEC").unwrap_or_else(|_| "cmd.exe".to_string())
    } else {
        "/bin/sh".to_string()
    }
}

fn shell_flag() -> &'static str {
    if cfg!(target_os = "windows") {
        "/C"
    } else {
        "-c"
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn runs_command_and_exports_host() {
        let exec = LocalExecutor::new();
        let host = Host::new("web1").with_address("10.0.0.5");
        let out = exec
            .execute(&host, "echo $CONVOY_HOST $CONVOY_ADDRESS", None)
            .unwrap();
        assert!(out.success());
        assert_eq!(out.stdout.trim(), "web1 10.0.0.5");
    }

    #[test]
    fn non_zero_exit_is_not_an_error() {
        let exec = LocalExecutor::new();
        let out = exec.execute(&Host::new("a"), "exit 4", None).unwrap();
        assert_eq!(out.exit_code, Some(4));
    }

    #[test]
    fn timeout_is_enforced() {
        let exec = LocalExecutor::new();
        let err = exec
            .execute(&Host::new("a"), "exec sleep 5", Some(Duration::from_millis(100)))
            .unwrap_err();
        assert!(matches!(err, ExecError::Timeout { .. }));
    }

    #[test]
    fn connect_always_succeeds() {
        assert!(LocalExecutor::new().connect(&Host::new("a"), None).is_ok());
    }
}
