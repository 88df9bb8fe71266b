//! Scripted executor for testing.
//!
//! `MockExecutor` implements [`RemoteExecutor`] without touching the
//! network. Every call is recorded, and responses are chosen by matching a
//! host and a command substring. Commands with no matching rule succeed
//! with empty output.
//!
//! # Example
//!
//! ```
//! use convoy::remote::{Host, MockExecutor, MockResponse, RemoteExecutor};
//!
//! let exec = MockExecutor::new();
//! exec.respond(Some("web2"), "docker run", MockResponse::exit(125));
//!
//! let web1 = Host::new("web1");
//! let web2 = Host::new("web2");
//! assert!(exec.execute(&web1, "docker run app", None).unwrap().success());
//! assert!(!exec.execute(&web2, "docker run app", None).unwrap().success());
//! assert_eq!(exec.calls_for("web2"), vec!["docker run app".to_string()]);
//! ```

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use super::{CommandOutput, Host, RemoteExecutor};
use crate::error::ExecError;

/// Canned outcome for a matched command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockResponse {
    /// The command ran and exited.
    Exit {
        code: i32,
        stdout: String,
        stderr: String,
    },
    /// The command exceeded its timeout.
    Timeout,
    /// The connection dropped while running the command.
    ConnectionLost,
}

impl MockResponse {
    /// Exit with `code` and no output.
    pub fn exit(code: i32) -> Self {
        Self::Exit {
            code,
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    /// Exit 0 printing `stdout`.
    pub fn output(stdout: &str) -> Self {
        Self::Exit {
            code: 0,
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }
}

/// A recorded `execute` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecCall {
    pub host: String,
    pub command: String,
}

#[derive(Debug)]
struct Rule {
    host: Option<String>,
    contains: String,
    response: MockResponse,
    once: bool,
}

/// Mock executor for testing.
#[derive(Debug, Default)]
pub struct MockExecutor {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<ExecCall>>,
    unreachable: Mutex<HashSet<String>>,
    delay: Option<Duration>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockExecutor {
    /// Create a mock where every command succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every `execute` call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Respond to commands containing `contains` (on `host`, or any host).
    ///
    /// Later rules take precedence over earlier ones.
    pub fn respond(&self, host: Option<&str>, contains: &str, response: MockResponse) {
        self.push_rule(host, contains, response, false);
    }

    /// Like [`respond`](Self::respond), but the rule is used up after one match.
    pub fn respond_once(&self, host: Option<&str>, contains: &str, response: MockResponse) {
        self.push_rule(host, contains, response, true);
    }

    /// Make `connect` fail for `host`.
    pub fn set_unreachable(&self, host: &str) {
        lock(&self.unreachable).insert(host.to_string());
    }

    /// All recorded calls, in the order they were made.
    pub fn calls(&self) -> Vec<ExecCall> {
        lock(&self.calls).clone()
    }

    /// Commands executed on `host`, in order.
    pub fn calls_for(&self, host: &str) -> Vec<String> {
        lock(&self.calls)
            .iter()
            .filter(|c| c.host == host)
            .map(|c| c.command.clone())
            .collect()
    }

    fn push_rule(&self, host: Option<&str>, contains: &str, response: MockResponse, once: bool) {
        lock(&self.rules).push(Rule {
            host: host.map(String::from),
            contains: contains.to_string(),
            response,
            once,
        });
    }

    fn take_response(&self, host: &str, command: &str) -> Option<MockResponse> {
        let mut rules = lock(&self.rules);
        let index = rules.iter().rposition(|r| {
            r.host.as_deref().map_or(true, |h| h == host) && command.contains(&r.contains)
        })?;
        if rules[index].once {
            Some(rules.remove(index).response)
        } else {
            Some(rules[index].response.clone())
        }
    }
}

impl RemoteExecutor for MockExecutor {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn execute(
        &self,
        host: &Host,
        command: &str,
        timeout: Option<Duration>,
    ) -> Result<CommandOutput, ExecError> {
        lock(&self.calls).push(ExecCall {
            host: host.name.clone(),
            command: command.to_string(),
        });

        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }

        match self.take_response(&host.name, command) {
            None => Ok(CommandOutput {
                exit_code: Some(0),
                ..Default::default()
            }),
            Some(MockResponse::Exit {
                code,
                stdout,
                stderr,
            }) => Ok(CommandOutput {
                exit_code: Some(code),
                stdout,
                stderr,
                duration: Duration::ZERO,
            }),
            Some(MockResponse::Timeout) => Err(ExecError::Timeout {
                host: host.name.clone(),
                after: timeout.unwrap_or(Duration::ZERO),
            }),
            Some(MockResponse::ConnectionLost) => Err(ExecError::Connection {
                host: host.name.clone(),
                message: "connection reset by peer".to_string(),
            }),
        }
    }

    fn connect(&self, host: &Host, _timeout: Option<Duration>) -> Result<(), ExecError> {
        if lock(&self.unreachable).contains(&host.name) {
            Err(ExecError::Connection {
                host: host.name.clone(),
                message: "no route to host".to_string(),
            })
        } else {
            Ok(())
        }
    }
}
