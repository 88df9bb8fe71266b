//! Runs host plans across a bounded pool of worker threads.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use chrono::Utc;
use tracing::info;

use super::cancel::CancellationToken;
use super::host::HostRunner;
use super::report::{DeploymentRun, HostReport, RunId};
use crate::config::Settings;
use crate::error::{ConvoyError, Result};
use crate::plan::HostPlan;
use crate::remote::RemoteExecutor;
use crate::steps::StepResult;

/// Knobs for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Maximum hosts deployed at once (0 = one worker per host).
    pub max_parallel: usize,

    /// Timeout for steps that don't set their own.
    pub step_timeout: Option<Duration>,

    /// Timeout for the connection check.
    pub connect_timeout: Option<Duration>,

    /// Extra attempts for failed idempotent steps.
    pub retries: u32,

    /// Pause between attempts.
    pub retry_delay: Duration,

    /// Render every step without executing anything.
    pub dry_run: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl RunOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            max_parallel: settings.max_parallel,
            step_timeout: settings.step_timeout(),
            connect_timeout: settings.connect_timeout(),
            retries: settings.retries,
            retry_delay: settings.retry_delay(),
            dry_run: false,
        }
    }

    /// Number of worker threads for `hosts` plans.
    pub fn workers_for(&self, hosts: usize) -> usize {
        let limit = match self.max_parallel {
            0 => hosts,
            n => n.min(hosts),
        };
        limit.max(1)
    }
}

/// Progress events emitted while a run is in flight.
///
/// Events for different hosts interleave; events for one host arrive in
/// order.
#[derive(Debug, Clone, Copy)]
pub enum RunProgress<'a> {
    /// A worker picked up the host.
    HostStarted { host: &'a str },
    /// The connection check failed.
    HostUnreachable { host: &'a str, error: &'a str },
    /// A forward step is about to run.
    StepStarting {
        host: &'a str,
        step: &'a str,
        index: usize,
        total: usize,
    },
    /// A failed idempotent step will be run again.
    StepRetrying {
        host: &'a str,
        step: &'a str,
        attempt: u32,
        error: &'a str,
    },
    /// A forward or undo action finished.
    StepFinished {
        host: &'a str,
        result: &'a StepResult,
    },
    /// Completed steps are about to be undone.
    RollbackStarting { host: &'a str, steps: usize },
    /// The host reached a terminal state.
    HostFinished { report: &'a HostReport },
}

/// Deploys host plans and records the outcome.
pub struct Orchestrator<'a> {
    executor: &'a dyn RemoteExecutor,
    options: RunOptions,
    cancel: CancellationToken,
}

impl<'a> Orchestrator<'a> {
    pub fn new(executor: &'a dyn RemoteExecutor, options: RunOptions) -> Self {
        Self {
            executor,
            options,
            cancel: CancellationToken::new(),
        }
    }

    /// Use a token shared with something else, such as a signal handler.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Run every plan to a terminal state.
    pub fn run(&self, plans: &[HostPlan]) -> Result<DeploymentRun> {
        self.run_with_progress(plans, &|_| {})
    }

    /// Run every plan, reporting progress from the worker threads.
    ///
    /// Reports are keyed by host name, so plans sharing a name are rejected
    /// before anything is dispatched.
    pub fn run_with_progress(
        &self,
        plans: &[HostPlan],
        on_progress: &(dyn Fn(RunProgress<'_>) + Sync),
    ) -> Result<DeploymentRun> {
        let mut seen = HashSet::new();
        if let Some(dup) = plans.iter().find(|p| !seen.insert(p.host.name.as_str())) {
            return Err(ConvoyError::DuplicateHost {
                host: dup.host.name.clone(),
            });
        }

        let id = RunId::new();
        let started_at = Utc::now();
        let workers = self.options.workers_for(plans.len());
        info!(
            "run {}: {} host(s), {} worker(s){}",
            id,
            plans.len(),
            workers,
            if self.options.dry_run { ", dry run" } else { "" }
        );

        let runner = HostRunner {
            executor: self.executor,
            options: &self.options,
            cancel: &self.cancel,
            progress: on_progress,
        };
        let cursor = AtomicUsize::new(0);
        let (tx, rx) = mpsc::channel::<HostReport>();

        thread::scope(|scope| {
            for _ in 0..workers {
                let tx = tx.clone();
                let runner = &runner;
                let cursor = &cursor;
                scope.spawn(move || {
                    while let Some(plan) = plans.get(cursor.fetch_add(1, Ordering::SeqCst)) {
                        if tx.send(runner.run(plan)).is_err() {
                            break;
                        }
                    }
                });
            }
        });
        drop(tx);

        let hosts: BTreeMap<String, HostReport> =
            rx.into_iter().map(|r| (r.host.clone(), r)).collect();

        let run = DeploymentRun::new(
            id,
            started_at,
            hosts,
            self.options.dry_run,
            self.cancel.reason(),
        );
        info!("run {} {}", run.id(), run.outcome());
        Ok(run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{Host, MockExecutor, MockResponse};
    use crate::runner::{FailureKind, HostState, RunOutcome};
    use crate::steps::{CommandTemplate, Phase, Step, StepStatus};
    use std::sync::Mutex;

    fn lifecycle() -> Vec<Step> {
        let t = |s: &str| CommandTemplate::parse(s).unwrap();
        vec![
            Step::new("stop", t("docker stop app")).with_undo(t("docker start app")),
            Step::new("remove", t("docker rename app app-old"))
                .with_undo(t("docker rename app-old app")),
            Step::new("pull", t("docker pull acct/app")).critical(true),
            Step::new("start", t("docker run --name app acct/app"))
                .with_undo(t("docker rm -f app"))
                .critical(true),
        ]
    }

    fn options() -> RunOptions {
        RunOptions {
            retry_delay: Duration::ZERO,
            ..RunOptions::default()
        }
    }

    #[test]
    fn workers_are_bounded() {
        let mut opts = options();
        assert_eq!(opts.workers_for(5), 5);
        assert_eq!(opts.workers_for(0), 1);
        opts.max_parallel = 2;
        assert_eq!(opts.workers_for(5), 2);
        assert_eq!(opts.workers_for(1), 1);
    }

    #[test]
    fn all_steps_succeed() {
        let exec = MockExecutor::new();
        let plans = vec![HostPlan::new(Host::new("a"), lifecycle())];
        let run = Orchestrator::new(&exec, options()).run(&plans).unwrap();

        assert_eq!(run.outcome(), RunOutcome::Succeeded);
        let a = run.host("a").unwrap();
        assert_eq!(a.state, HostState::Succeeded);
        assert_eq!(a.results.len(), 4);
        assert!(a.failure.is_none());
    }

    #[test]
    fn critical_failure_rolls_back_in_reverse() {
        let exec = MockExecutor::new();
        exec.respond(None, "docker run", MockResponse::exit(125));
        let plans = vec![HostPlan::new(Host::new("b"), lifecycle())];
        let run = Orchestrator::new(&exec, options()).run(&plans).unwrap();

        let b = run.host("b").unwrap();
        assert_eq!(b.state, HostState::RolledBack);
        assert_eq!(b.failure.as_ref().unwrap().kind, FailureKind::CriticalStepFailure);

        let undo: Vec<_> = b.undo_results().map(|r| (r.step.as_str(), r.status)).collect();
        assert_eq!(
            undo,
            vec![
                ("pull", StepStatus::Skipped),
                ("remove", StepStatus::Succeeded),
                ("stop", StepStatus::Succeeded),
            ]
        );
        assert_eq!(
            exec.calls_for("b")[4..],
            ["docker rename app-old app", "docker start app"]
        );
    }

    #[test]
    fn non_critical_failure_continues() {
        let exec = MockExecutor::new();
        exec.respond(None, "docker stop", MockResponse::exit(1));
        let plans = vec![HostPlan::new(Host::new("a"), lifecycle())];
        let run = Orchestrator::new(&exec, options()).run(&plans).unwrap();

        let a = run.host("a").unwrap();
        assert_eq!(a.state, HostState::Succeeded);
        assert_eq!(a.non_blocking_failures.len(), 1);
        assert_eq!(a.non_blocking_failures[0].kind, FailureKind::StepFailure);
        assert_eq!(a.forward_results().count(), 4);
    }

    #[test]
    fn failed_undo_leaves_host_failed() {
        let exec = MockExecutor::new();
        exec.respond(None, "docker run", MockResponse::exit(1));
        exec.respond(None, "docker rename app-old app", MockResponse::exit(1));
        let plans = vec![HostPlan::new(Host::new("a"), lifecycle())];
        let run = Orchestrator::new(&exec, options()).run(&plans).unwrap();

        let a = run.host("a").unwrap();
        assert_eq!(a.state, HostState::Failed);
        assert!(!a.rollback_complete);
        // the remaining undo still ran
        assert_eq!(exec.calls_for("a").last().unwrap(), "docker start app");
    }

    #[test]
    fn unreachable_host_is_failed_without_rollback() {
        let exec = MockExecutor::new();
        exec.set_unreachable("down");
        let plans = vec![
            HostPlan::new(Host::new("down"), lifecycle()),
            HostPlan::new(Host::new("up"), lifecycle()),
        ];
        let run = Orchestrator::new(&exec, options()).run(&plans).unwrap();

        let down = run.host("down").unwrap();
        assert_eq!(down.state, HostState::Failed);
        assert_eq!(down.failure.as_ref().unwrap().kind, FailureKind::ConnectionError);
        assert!(down.results.is_empty());
        assert!(exec.calls_for("down").is_empty());
        assert_eq!(run.host("up").unwrap().state, HostState::Succeeded);
        assert_eq!(run.outcome(), RunOutcome::Partial);
    }

    #[test]
    fn connection_lost_mid_plan_rolls_back() {
        let exec = MockExecutor::new();
        exec.respond_once(None, "docker pull", MockResponse::ConnectionLost);
        let plans = vec![HostPlan::new(Host::new("a"), lifecycle())];
        let run = Orchestrator::new(&exec, options()).run(&plans).unwrap();

        let a = run.host("a").unwrap();
        assert_eq!(a.failure.as_ref().unwrap().kind, FailureKind::ConnectionError);
        assert_eq!(a.state, HostState::RolledBack);
        assert_eq!(a.undo_results().count(), 2);
    }

    #[test]
    fn timeout_triggers_rollback_even_when_not_critical() {
        let exec = MockExecutor::new();
        exec.respond(None, "docker rename app app-old", MockResponse::Timeout);
        let plans = vec![HostPlan::new(Host::new("a"), lifecycle())];
        let run = Orchestrator::new(&exec, options()).run(&plans).unwrap();

        let a = run.host("a").unwrap();
        assert_eq!(a.failure.as_ref().unwrap().kind, FailureKind::Timeout);
        assert_eq!(a.state, HostState::RolledBack);
        let undo: Vec<_> = a.undo_results().map(|r| r.step.as_str()).collect();
        assert_eq!(undo, vec!["stop"]);
    }

    #[test]
    fn retries_only_idempotent_steps() {
        let exec = MockExecutor::new();
        exec.respond_once(None, "docker pull", MockResponse::exit(1));
        exec.respond_once(None, "docker pull", MockResponse::exit(1));
        let mut opts = options();
        opts.retries = 2;
        let plans = vec![HostPlan::new(Host::new("a"), lifecycle())];
        let run = Orchestrator::new(&exec, opts.clone()).run(&plans).unwrap();

        let a = run.host("a").unwrap();
        assert_eq!(a.state, HostState::Succeeded);
        let pull = a.forward_results().find(|r| r.step == "pull").unwrap();
        assert_eq!(pull.attempts, 3);

        let exec = MockExecutor::new();
        exec.respond_once(None, "docker pull", MockResponse::exit(1));
        let mut steps = lifecycle();
        steps[2] = steps[2].clone().idempotent(false);
        let plans = vec![HostPlan::new(Host::new("a"), steps)];
        let run = Orchestrator::new(&exec, opts).run(&plans).unwrap();

        let a = run.host("a").unwrap();
        assert_eq!(a.state, HostState::RolledBack);
        let pulls = exec
            .calls_for("a")
            .iter()
            .filter(|c| c.contains("docker pull"))
            .count();
        assert_eq!(pulls, 1);
    }

    #[test]
    fn cancelled_before_start_marks_hosts_failed() {
        let exec = MockExecutor::new();
        let orchestrator = Orchestrator::new(&exec, options());
        orchestrator.cancellation_token().cancel("interrupted");
        let plans = vec![HostPlan::new(Host::new("a"), lifecycle())];
        let run = orchestrator.run(&plans).unwrap();

        let a = run.host("a").unwrap();
        assert_eq!(a.state, HostState::Failed);
        assert_eq!(a.failure.as_ref().unwrap().kind, FailureKind::Cancelled);
        assert!(exec.calls().is_empty());
        assert_eq!(run.cancelled(), Some("interrupted"));
    }

    #[test]
    fn cancel_mid_plan_stops_dispatch_and_rolls_back() {
        let exec = MockExecutor::new();
        let token = CancellationToken::new();
        let orchestrator = Orchestrator::new(&exec, options()).with_cancellation(token.clone());
        let plans = vec![HostPlan::new(Host::new("a"), lifecycle())];

        let run = orchestrator.run_with_progress(&plans, &|event| {
            if let RunProgress::StepFinished { result, .. } = event {
                if result.step == "remove" && result.phase == Phase::Forward {
                    token.cancel("stop requested");
                }
            }
        })
        .unwrap();

        let a = run.host("a").unwrap();
        assert_eq!(a.state, HostState::RolledBack);
        assert_eq!(a.failure.as_ref().unwrap().kind, FailureKind::Cancelled);
        assert_eq!(a.failure.as_ref().unwrap().step.as_deref(), Some("pull"));
        assert_eq!(a.forward_results().count(), 2);
        assert_eq!(a.undo_results().count(), 2);
    }

    #[test]
    fn dry_run_executes_nothing() {
        let exec = MockExecutor::new();
        exec.set_unreachable("a");
        let opts = RunOptions {
            dry_run: true,
            ..options()
        };
        let plans = vec![HostPlan::new(Host::new("a"), lifecycle())];
        let run = Orchestrator::new(&exec, opts).run(&plans).unwrap();

        let a = run.host("a").unwrap();
        assert_eq!(a.state, HostState::Succeeded);
        assert!(a.results.iter().all(|r| r.status == StepStatus::Skipped));
        assert_eq!(a.results[2].command, "docker pull acct/app");
        assert!(exec.calls().is_empty());
        assert!(run.is_dry_run());
    }

    #[test]
    fn progress_events_arrive_in_order_per_host() {
        let exec = MockExecutor::new();
        let events = Mutex::new(Vec::new());
        let plans = vec![HostPlan::new(Host::new("a"), lifecycle())];

        Orchestrator::new(&exec, options()).run_with_progress(&plans, &|event| {
            let label = match event {
                RunProgress::HostStarted { .. } => "started".to_string(),
                RunProgress::StepStarting { step, .. } => format!("> {}", step),
                RunProgress::StepFinished { result, .. } => format!("< {}", result.step),
                RunProgress::HostFinished { report } => format!("done {}", report.state),
                _ => return,
            };
            events.lock().unwrap().push(label);
        })
        .unwrap();

        let events = events.into_inner().unwrap();
        assert_eq!(events.first().unwrap(), "started");
        assert_eq!(events[1], "> stop");
        assert_eq!(events[2], "< stop");
        assert_eq!(events.last().unwrap(), "done succeeded");
    }

    #[test]
    fn duplicate_host_names_are_rejected() {
        let exec = MockExecutor::new();
        let plans = vec![
            HostPlan::new(Host::new("a").with_address("10.0.0.1"), lifecycle()),
            HostPlan::new(Host::new("a").with_address("10.0.0.2"), lifecycle()),
        ];

        let err = Orchestrator::new(&exec, options()).run(&plans).unwrap_err();

        assert!(matches!(err, ConvoyError::DuplicateHost { ref host } if host == "a"));
        assert!(exec.calls().is_empty());
    }
}
