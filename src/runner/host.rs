//! Execution of one host plan.
//!
//! A host moves `Pending -> Running -> {Succeeded, Failed, RolledBack}`.
//! Steps run in order; a critical failure, a timeout, a lost connection or
//! cancellation stops the plan and undoes every step that succeeded, most
//! recent first.

use std::thread;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, info_span, warn};

use super::cancel::CancellationToken;
use super::orchestrator::{RunOptions, RunProgress};
use super::report::{is_failure, FailureKind, HostFailure, HostReport, HostState};
use crate::plan::HostPlan;
use crate::remote::RemoteExecutor;
use crate::steps::{Step, StepResult, StepStatus};

/// Drives a single [`HostPlan`] to a terminal state.
pub(crate) struct HostRunner<'a> {
    pub executor: &'a dyn RemoteExecutor,
    pub options: &'a RunOptions,
    pub cancel: &'a CancellationToken,
    pub progress: &'a (dyn Fn(RunProgress<'_>) + Sync),
}

impl HostRunner<'_> {
    pub fn run(&self, plan: &HostPlan) -> HostReport {
        let span = info_span!("host", host = %plan.host.name);
        let _enter = span.enter();

        let started = Instant::now();
        let mut report = HostReport::pending(&plan.host.name, &plan.host.address);
        self.drive(plan, &mut report);
        report.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        info!("{} {}", plan.host, report.state);
        (self.progress)(RunProgress::HostFinished { report: &report });
        report
    }

    fn drive(&self, plan: &HostPlan, report: &mut HostReport) {
        let host = &plan.host.name;

        if let Some(reason) = self.cancelled() {
            report.state = HostState::Failed;
            report.failure = Some(HostFailure {
                kind: FailureKind::Cancelled,
                step: None,
                message: reason,
            });
            return;
        }

        report.state = HostState::Running;
        (self.progress)(RunProgress::HostStarted { host });

        if !self.options.dry_run {
            if let Err(e) = self
                .executor
                .connect(&plan.host, self.options.connect_timeout)
            {
                warn!("{} unreachable: {}", host, e);
                let message = e.to_string();
                (self.progress)(RunProgress::HostUnreachable {
                    host,
                    error: &message,
                });
                report.state = HostState::Failed;
                report.failure = Some(HostFailure {
                    kind: FailureKind::ConnectionError,
                    step: None,
                    message,
                });
                return;
            }
        }

        let mut completed: Vec<&Step> = Vec::new();
        let mut fatal: Option<HostFailure> = None;
        let total = plan.steps.len();

        for (index, step) in plan.steps.iter().enumerate() {
            if let Some(reason) = self.cancelled() {
                fatal = Some(HostFailure {
                    kind: FailureKind::Cancelled,
                    step: Some(step.name().to_string()),
                    message: reason,
                });
                break;
            }

            (self.progress)(RunProgress::StepStarting {
                host,
                step: step.name(),
                index,
                total,
            });

            let result = if self.options.dry_run {
                step.preview(&plan.context)
            } else {
                self.run_forward(plan, step)
            };
            (self.progress)(RunProgress::StepFinished {
                host,
                result: &result,
            });

            let failure = |kind| HostFailure {
                kind,
                step: Some(step.name().to_string()),
                message: result.error.clone().unwrap_or_else(|| result.status.to_string()),
            };

            match result.status {
                StepStatus::Succeeded => completed.push(step),
                StepStatus::Skipped => {}
                StepStatus::Unreachable => fatal = Some(failure(FailureKind::ConnectionError)),
                StepStatus::TimedOut => fatal = Some(failure(FailureKind::Timeout)),
                StepStatus::Failed if step.is_critical() => {
                    fatal = Some(failure(FailureKind::CriticalStepFailure))
                }
                StepStatus::Failed => {
                    warn!("non-critical step '{}' failed on {}, continuing", step.name(), host);
                    report.non_blocking_failures.push(failure(FailureKind::StepFailure));
                }
            }

            report.results.push(result);
            if fatal.is_some() {
                break;
            }
        }

        let Some(failure) = fatal else {
            report.state = HostState::Succeeded;
            return;
        };

        warn!("{} on {}", failure, host);
        let unreachable_from_start =
            failure.kind == FailureKind::ConnectionError && completed.is_empty();
        report.failure = Some(failure);
        report.state = HostState::Failed;

        if unreachable_from_start {
            return;
        }

        self.roll_back(plan, &completed, report);
        report.state = if report.rollback_complete {
            HostState::RolledBack
        } else {
            HostState::Failed
        };
    }

    /// Run the forward action, retrying idempotent steps.
    fn run_forward(&self, plan: &HostPlan, step: &Step) -> StepResult {
        let timeout = step.timeout_or(self.options.step_timeout);
        let max_attempts = if step.is_idempotent() {
            self.options.retries.saturating_add(1)
        } else {
            1
        };

        let first_started = Utc::now();
        let clock = Instant::now();
        let mut attempt = 1;

        loop {
            let mut result = step.run(self.executor, &plan.host, &plan.context, timeout);
            let retry = is_failure(&result)
                && result.attempts > 0
                && attempt < max_attempts
                && !self.cancel.is_cancelled();

            if !retry {
                if attempt > 1 {
                    result.attempts = attempt;
                    result.started_at = first_started;
                    result.duration_ms =
                        u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX);
                }
                return result;
            }

            let error = result.error.as_deref().unwrap_or("failed");
            warn!(
                "step '{}' attempt {}/{} on {}: {}",
                step.name(),
                attempt,
                max_attempts,
                plan.host,
                error
            );
            (self.progress)(RunProgress::StepRetrying {
                host: &plan.host.name,
                step: step.name(),
                attempt,
                error,
            });

            thread::sleep(self.options.retry_delay);
            attempt += 1;
        }
    }

    /// Undo `completed` steps in reverse order.
    ///
    /// Every undo runs even if an earlier one fails, and even after
    /// cancellation.
    fn roll_back(&self, plan: &HostPlan, completed: &[&Step], report: &mut HostReport) {
        let host = &plan.host.name;
        info!("rolling back {} step(s) on {}", completed.len(), host);
        (self.progress)(RunProgress::RollbackStarting {
            host,
            steps: completed.len(),
        });

        for step in completed.iter().rev() {
            let timeout = step.timeout_or(self.options.step_timeout);
            let result = step.undo(self.executor, &plan.host, &plan.context, timeout);
            debug!("undo {} on {}: {}", step.name(), host, result.status);

            if !result.is_ok() {
                warn!(
                    "undo of '{}' failed on {}: {}",
                    step.name(),
                    host,
                    result.error.as_deref().unwrap_or("unknown error")
                );
                report.rollback_complete = false;
            }
            (self.progress)(RunProgress::StepFinished {
                host,
                result: &result,
            });
            report.results.push(result);
        }
    }

    fn cancelled(&self) -> Option<String> {
        self.cancel
            .is_cancelled()
            .then(|| self.cancel.reason().unwrap_or_else(|| "cancelled".to_string()))
    }
}
