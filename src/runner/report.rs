//! The record of one deployment invocation.
//!
//! A [`DeploymentRun`] is assembled by the orchestrator once every host has
//! reached a terminal state and is read-only from then on. It renders as
//! JSON for machines ([`DeploymentRun::to_json`]) and as a plain-text
//! summary for people ([`DeploymentRun::summary`]).

use std::collections::BTreeMap;
use std::fmt;
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::steps::{format_duration, Phase, StepResult, StepStatus};

/// Lifecycle of one host within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostState {
    Pending,
    Running,
    Succeeded,
    Failed,
    RolledBack,
}

impl HostState {
    /// Whether the host is done for this run.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            HostState::Succeeded | HostState::Failed | HostState::RolledBack
        )
    }
}

impl fmt::Display for HostState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HostState::Pending => "pending",
            HostState::Running => "running",
            HostState::Succeeded => "succeeded",
            HostState::Failed => "failed",
            HostState::RolledBack => "rolled back",
        };
        write!(f, "{}", s)
    }
}

/// Why a host did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The host could not be reached.
    ConnectionError,
    /// A non-critical step failed; the plan went on.
    StepFailure,
    /// A critical step failed.
    CriticalStepFailure,
    /// A step exceeded its timeout.
    Timeout,
    /// The run was cancelled.
    Cancelled,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::ConnectionError => "connection error",
            FailureKind::StepFailure => "step failure",
            FailureKind::CriticalStepFailure => "critical step failure",
            FailureKind::Timeout => "timeout",
            FailureKind::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// The failure that ended a host's plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostFailure {
    pub kind: FailureKind,

    /// Step that failed, when the failure belongs to one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,

    pub message: String,
}

impl fmt::Display for HostFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.step {
            Some(step) => write!(f, "{} in '{}': {}", self.kind, step, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

/// Everything that happened on one host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostReport {
    pub host: String,
    pub address: String,
    pub state: HostState,

    /// Forward results in plan order, then undo results in rollback order.
    pub results: Vec<StepResult>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<HostFailure>,

    /// Non-critical step failures that did not stop the plan.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub non_blocking_failures: Vec<HostFailure>,

    /// False when an undo action failed during rollback.
    pub rollback_complete: bool,

    pub duration_ms: u64,
}

impl HostReport {
    /// A host that is still waiting to be deployed.
    pub fn pending(host: &str, address: &str) -> Self {
        Self {
            host: host.to_string(),
            address: address.to_string(),
            state: HostState::Pending,
            results: Vec::new(),
            failure: None,
            non_blocking_failures: Vec::new(),
            rollback_complete: true,
            duration_ms: 0,
        }
    }

    pub fn forward_results(&self) -> impl Iterator<Item = &StepResult> {
        self.results.iter().filter(|r| r.phase == Phase::Forward)
    }

    pub fn undo_results(&self) -> impl Iterator<Item = &StepResult> {
        self.results.iter().filter(|r| r.phase == Phase::Undo)
    }

    pub fn succeeded(&self) -> bool {
        self.state == HostState::Succeeded
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    fn headline(&self) -> String {
        let steps = self.forward_results().count();
        let mut line = format!(
            "{} ({}) {} - {} step{}, {}",
            self.host,
            self.address,
            self.state,
            steps,
            if steps == 1 { "" } else { "s" },
            format_duration(self.duration())
        );
        if let Some(failure) = &self.failure {
            line.push_str(&format!("\n    {}", failure));
        }
        for failure in &self.non_blocking_failures {
            line.push_str(&format!("\n    {} (continued)", failure));
        }
        if !self.rollback_complete {
            line.push_str("\n    rollback incomplete, host needs attention");
        }
        line
    }
}

/// Overall result of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every host succeeded.
    Succeeded,
    /// Some hosts succeeded.
    Partial,
    /// No host succeeded.
    Failed,
}

impl RunOutcome {
    fn from_hosts<'a>(hosts: impl Iterator<Item = &'a HostReport>) -> Self {
        let (mut ok, mut total) = (0usize, 0usize);
        for host in hosts {
            total += 1;
            if host.succeeded() {
                ok += 1;
            }
        }
        if ok == total {
            RunOutcome::Succeeded
        } else if ok == 0 {
            RunOutcome::Failed
        } else {
            RunOutcome::Partial
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunOutcome::Succeeded => "succeeded",
            RunOutcome::Partial => "partial",
            RunOutcome::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// A unique run identifier.
///
/// Format: `run_{timestamp_ms}_{hex}`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunId {
    timestamp: DateTime<Utc>,
    suffix: [u8; 8],
}

static RUN_COUNTER: AtomicU64 = AtomicU64::new(0);

impl RunId {
    /// Generate a new run ID.
    pub fn new() -> Self {
        let now = Utc::now();
        let timestamp = DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now);

        let mut hasher = Sha256::new();
        hasher.update(now.timestamp_nanos_opt().unwrap_or_default().to_le_bytes());
        hasher.update(process::id().to_le_bytes());
        hasher.update(RUN_COUNTER.fetch_add(1, Ordering::Relaxed).to_le_bytes());
        let digest = hasher.finalize();

        let mut suffix = [0u8; 8];
        suffix.copy_from_slice(&digest[..8]);
        Self { timestamp, suffix }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Parse a run ID from a string.
    pub fn parse(s: &str) -> Option<Self> {
        let (millis, suffix_hex) = s.strip_prefix("run_")?.split_once('_')?;
        let timestamp = DateTime::from_timestamp_millis(millis.parse().ok()?)?;
        let bytes = hex::decode(suffix_hex).ok()?;
        let suffix: [u8; 8] = bytes.try_into().ok()?;
        Some(Self { timestamp, suffix })
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "run_{}_{}",
            self.timestamp.timestamp_millis(),
            hex::encode(self.suffix)
        )
    }
}

impl Serialize for RunId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for RunId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        RunId::parse(&s).ok_or_else(|| serde::de::Error::custom("Invalid run ID format"))
    }
}

/// The full record of one deployment invocation across all hosts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRun {
    id: RunId,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    dry_run: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cancelled: Option<String>,
    outcome: RunOutcome,
    hosts: BTreeMap<String, HostReport>,
}

impl DeploymentRun {
    /// Assemble a run from finished host reports.
    pub fn new(
        id: RunId,
        started_at: DateTime<Utc>,
        hosts: BTreeMap<String, HostReport>,
        dry_run: bool,
        cancelled: Option<String>,
    ) -> Self {
        let outcome = RunOutcome::from_hosts(hosts.values());
        Self {
            id,
            started_at,
            finished_at: Utc::now(),
            dry_run,
            cancelled,
            outcome,
            hosts,
        }
    }

    pub fn id(&self) -> &RunId {
        &self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }

    pub fn outcome(&self) -> RunOutcome {
        self.outcome
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Reason the run was cancelled, if it was.
    pub fn cancelled(&self) -> Option<&str> {
        self.cancelled.as_deref()
    }

    pub fn hosts(&self) -> &BTreeMap<String, HostReport> {
        &self.hosts
    }

    pub fn host(&self, name: &str) -> Option<&HostReport> {
        self.hosts.get(name)
    }

    /// Names of hosts that did not succeed.
    pub fn failed_hosts(&self) -> Vec<String> {
        self.hosts
            .values()
            .filter(|h| !h.succeeded())
            .map(|h| h.host.clone())
            .collect()
    }

    pub fn duration(&self) -> Duration {
        (self.finished_at - self.started_at)
            .to_std()
            .unwrap_or_default()
    }

    /// Count of hosts in each terminal state: (succeeded, rolled back, failed).
    pub fn counts(&self) -> (usize, usize, usize) {
        self.hosts
            .values()
            .fold((0, 0, 0), |(ok, rolled, failed), h| match h.state {
                HostState::Succeeded => (ok + 1, rolled, failed),
                HostState::RolledBack => (ok, rolled + 1, failed),
                _ => (ok, rolled, failed + 1),
            })
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Human-readable summary.
    pub fn summary(&self) -> String {
        let mut out = format!(
            "Deployment {}{}\n",
            self.id,
            if self.dry_run { " (dry run)" } else { "" }
        );

        for report in self.hosts.values() {
            out.push_str(&format!("\n  {}\n", report.headline()));
            for result in &report.results {
                out.push_str(&format!("    {}\n", result.summary_line()));
            }
        }

        if let Some(reason) = &self.cancelled {
            out.push_str(&format!("\nCancelled: {}\n", reason));
        }

        let (ok, rolled, failed) = self.counts();
        out.push_str(&format!(
            "\nOutcome: {} ({} succeeded, {} rolled back, {} failed) in {}\n",
            self.outcome,
            ok,
            rolled,
            failed,
            format_duration(self.duration())
        ));
        out
    }
}

/// Whether a result counts as a failed attempt at the step.
pub(crate) fn is_failure(result: &StepResult) -> bool {
    matches!(
        result.status,
        StepStatus::Failed | StepStatus::TimedOut | StepStatus::Unreachable
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(name: &str, state: HostState) -> HostReport {
        HostReport {
            state,
            ..HostReport::pending(name, name)
        }
    }

    fn run(states: &[HostState]) -> DeploymentRun {
        let hosts = states
            .iter()
            .enumerate()
            .map(|(i, s)| (format!("h{}", i), report(&format!("h{}", i), *s)))
            .collect();
        DeploymentRun::new(RunId::new(), Utc::now(), hosts, false, None)
    }

    #[test]
    fn outcome_follows_hosts() {
        use HostState::*;
        assert_eq!(run(&[Succeeded, Succeeded]).outcome(), RunOutcome::Succeeded);
        assert_eq!(run(&[Succeeded, RolledBack]).outcome(), RunOutcome::Partial);
        assert_eq!(run(&[Failed, RolledBack]).outcome(), RunOutcome::Failed);
        assert_eq!(run(&[]).outcome(), RunOutcome::Succeeded);
    }

    #[test]
    fn failed_hosts_lists_non_succeeded() {
        use HostState::*;
        let run = run(&[Succeeded, RolledBack, Failed]);
        assert_eq!(run.failed_hosts(), vec!["h1", "h2"]);
        assert_eq!(run.counts(), (1, 1, 1));
    }

    #[test]
    fn run_id_format_and_parse() {
        let id = RunId::new();
        let text = id.to_string();
        assert!(text.starts_with("run_"));
        assert_eq!(text.rsplit('_').next().unwrap().len(), 16);
        assert_eq!(RunId::parse(&text), Some(id));
        assert!(RunId::parse("run_abc_00").is_none());
        assert!(RunId::parse("sess_1_0011223344556677").is_none());
    }

    #[test]
    fn run_ids_are_unique() {
        assert_ne!(RunId::new(), RunId::new());
    }

    #[test]
    fn json_round_trips() {
        let run = run(&[HostState::Succeeded, HostState::Failed]);
        let json = run.to_json().unwrap();
        assert!(json.contains("\"outcome\": \"partial\""));
        let parsed: DeploymentRun = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, run);
    }

    #[test]
    fn summary_mentions_failure_and_rollback_state() {
        let mut failed = report("web2", HostState::Failed);
        failed.failure = Some(HostFailure {
            kind: FailureKind::CriticalStepFailure,
            step: Some("start".to_string()),
            message: "exited with status 125".to_string(),
        });
        failed.rollback_complete = false;
        let hosts = BTreeMap::from([("web2".to_string(), failed)]);
        let run = DeploymentRun::new(RunId::new(), Utc::now(), hosts, true, None);

        let summary = run.summary();
        assert!(summary.contains("(dry run)"));
        assert!(summary.contains("critical step failure in 'start': exited with status 125"));
        assert!(summary.contains("rollback incomplete"));
        assert!(summary.contains("Outcome: failed"));
    }
}
