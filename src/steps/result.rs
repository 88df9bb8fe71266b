//! Per-step execution records.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ExecError;
use crate::remote::CommandOutput;

/// Which action of a step produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// The forward (deploy) action.
    Forward,
    /// The undo (rollback) action.
    Undo,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Forward => write!(f, "forward"),
            Phase::Undo => write!(f, "undo"),
        }
    }
}

/// Outcome of one step action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Exited with status 0.
    Succeeded,

    /// Exited non-zero, or could not be rendered.
    Failed,

    /// Exceeded its timeout.
    TimedOut,

    /// The host could not be reached.
    Unreachable,

    /// Nothing was executed (no-op undo, or dry run).
    Skipped,
}

impl StepStatus {
    /// Whether the action left the host in the intended state.
    pub fn is_ok(&self) -> bool {
        matches!(self, StepStatus::Succeeded | StepStatus::Skipped)
    }

    /// Get a display character for this status.
    pub fn display_char(&self) -> char {
        match self {
            StepStatus::Succeeded => '✓',
            StepStatus::Failed => '✗',
            StepStatus::TimedOut => '⧖',
            StepStatus::Unreachable => '⚡',
            StepStatus::Skipped => '⊘',
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepStatus::Succeeded => "succeeded",
            StepStatus::Failed => "failed",
            StepStatus::TimedOut => "timed out",
            StepStatus::Unreachable => "unreachable",
            StepStatus::Skipped => "skipped",
        };
        write!(f, "{}", s)
    }
}

/// Result of running one action of a step on one host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    /// Step name.
    pub step: String,

    /// Forward or undo.
    pub phase: Phase,

    /// Outcome.
    pub status: StepStatus,

    /// Exit code (if the command ran to completion).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,

    /// The command after placeholder resolution.
    pub command: String,

    /// Captured standard output.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stdout: String,

    /// Captured standard error.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stderr: String,

    /// When the (first attempt of the) action started.
    pub started_at: DateTime<Utc>,

    /// Wall time across all attempts, in milliseconds.
    pub duration_ms: u64,

    /// Number of executions (1 unless retried; 0 if nothing ran).
    pub attempts: u32,

    /// Error message for anything other than success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepResult {
    /// Build a result from a command that ran to completion.
    pub fn from_output(
        step: &str,
        phase: Phase,
        command: String,
        started_at: DateTime<Utc>,
        output: CommandOutput,
    ) -> Self {
        let (status, error) = if output.success() {
            (StepStatus::Succeeded, None)
        } else {
            (
                StepStatus::Failed,
                Some(match output.exit_code {
                    Some(code) => format!("exited with status {}", code),
                    None => "terminated by signal".to_string(),
                }),
            )
        };

        Self {
            step: step.to_string(),
            phase,
            status,
            exit_code: output.exit_code,
            command,
            stdout: output.stdout,
            stderr: output.stderr,
            started_at,
            duration_ms: duration_ms(output.duration),
            attempts: 1,
            error,
        }
    }

    /// Build a result from an executor failure.
    pub fn from_exec_error(
        step: &str,
        phase: Phase,
        command: String,
        started_at: DateTime<Utc>,
        error: &ExecError,
    ) -> Self {
        let status = match error {
            ExecError::Timeout { .. } => StepStatus::TimedOut,
            ExecError::Connection { .. } | ExecError::Spawn { .. } => StepStatus::Unreachable,
        };

        Self {
            step: step.to_string(),
            phase,
            status,
            exit_code: None,
            command,
            stdout: String::new(),
            stderr: String::new(),
            started_at,
            duration_ms: elapsed_ms(started_at),
            attempts: 1,
            error: Some(error.to_string()),
        }
    }

    /// A failure that happened before anything was executed.
    pub fn not_run(step: &str, phase: Phase, command: String, error: String) -> Self {
        Self {
            step: step.to_string(),
            phase,
            status: StepStatus::Failed,
            exit_code: None,
            command,
            stdout: String::new(),
            stderr: String::new(),
            started_at: Utc::now(),
            duration_ms: 0,
            attempts: 0,
            error: Some(error),
        }
    }

    /// A result for an action that was deliberately not executed.
    pub fn skipped(step: &str, phase: Phase, command: String) -> Self {
        Self {
            step: step.to_string(),
            phase,
            status: StepStatus::Skipped,
            exit_code: None,
            command,
            stdout: String::new(),
            stderr: String::new(),
            started_at: Utc::now(),
            duration_ms: 0,
            attempts: 0,
            error: None,
        }
    }

    /// Wall time of the action.
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    /// Whether the action left the host in the intended state.
    pub fn is_ok(&self) -> bool {
        self.status.is_ok()
    }

    /// Generate a summary line for display.
    pub fn summary_line(&self) -> String {
        let label = match self.phase {
            Phase::Forward => self.step.clone(),
            Phase::Undo => format!("undo {}", self.step),
        };
        let c = self.status.display_char();

        match self.status {
            StepStatus::Succeeded => {
                let retried = if self.attempts > 1 {
                    format!(", {} attempts", self.attempts)
                } else {
                    String::new()
                };
                format!("{} {} ({}{})", c, label, format_duration(self.duration()), retried)
            }
            StepStatus::Skipped if self.phase == Phase::Undo && self.command.is_empty() => {
                format!("{} {} (no undo action)", c, label)
            }
            StepStatus::Skipped => format!("{} {} (skipped)", c, label),
            _ => {
                let error = self.error.as_deref().unwrap_or("unknown error");
                format!("{} {} - {}", c, label, error)
            }
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn elapsed_ms(since: DateTime<Utc>) -> u64 {
    (Utc::now() - since).num_milliseconds().max(0) as u64
}

/// Format a duration for display.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let millis = duration.subsec_millis();

    if secs == 0 {
        format!("{}ms", millis)
    } else if secs < 60 {
        format!("{}.{}s", secs, millis / 100)
    } else {
        let mins = secs / 60;
        let secs = secs % 60;
        format!("{}m {}s", mins, secs)
    }
}
