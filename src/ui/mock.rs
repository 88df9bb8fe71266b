//! Mock UI implementation for testing.
//!
//! `MockUI` implements the `UserInterface` trait and captures all
//! interactions for later assertion.
//!
//! # Example
//!
//! ```
//! use convoy::ui::{MockUI, UserInterface};
//!
//! let mut ui = MockUI::new();
//! ui.message("Deploying 2 hosts");
//! ui.error("web2 rolled back");
//!
//! assert!(ui.has_message("Deploying 2 hosts"));
//! assert!(ui.has_error("web2 rolled back"));
//! ```

use super::{OutputMode, UserInterface};
use crate::runner::{DeploymentRun, HostReport, HostState, RunOutcome};
use crate::steps::StepResult;

/// Mock UI implementation for testing.
#[derive(Debug, Default)]
pub struct MockUI {
    mode: OutputMode,
    messages: Vec<String>,
    successes: Vec<String>,
    warnings: Vec<String>,
    errors: Vec<String>,
    headers: Vec<String>,
    hints: Vec<String>,
    steps: Vec<(String, String)>,
    hosts: Vec<(String, HostState)>,
    summaries: Vec<RunOutcome>,
    raw: Vec<String>,
}

impl MockUI {
    /// Create a new MockUI with Normal output mode.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new MockUI with a specific output mode.
    pub fn with_mode(mode: OutputMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn successes(&self) -> &[String] {
        &self.successes
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn hints(&self) -> &[String] {
        &self.hints
    }

    /// Step summary lines as `(host, line)`, in arrival order.
    pub fn steps(&self) -> &[(String, String)] {
        &self.steps
    }

    /// Hosts shown as finished, in arrival order.
    pub fn hosts(&self) -> &[(String, HostState)] {
        &self.hosts
    }

    /// Outcomes of the run summaries shown.
    pub fn summaries(&self) -> &[RunOutcome] {
        &self.summaries
    }

    /// Everything written with `raw`.
    pub fn raw_output(&self) -> &[String] {
        &self.raw
    }

    /// Check if a message containing the text was shown.
    pub fn has_message(&self, msg: &str) -> bool {
        self.messages.iter().any(|m| m.contains(msg))
    }

    pub fn has_success(&self, msg: &str) -> bool {
        self.successes.iter().any(|m| m.contains(msg))
    }

    pub fn has_warning(&self, msg: &str) -> bool {
        self.warnings.iter().any(|m| m.contains(msg))
    }

    pub fn has_error(&self, msg: &str) -> bool {
        self.errors.iter().any(|m| m.contains(msg))
    }

    pub fn has_hint(&self, msg: &str) -> bool {
        self.hints.iter().any(|m| m.contains(msg))
    }
}

impl UserInterface for MockUI {
    fn output_mode(&self) -> OutputMode {
        self.mode
    }

    fn message(&mut self, msg: &str) {
        self.messages.push(msg.to_string());
    }

    fn success(&mut self, msg: &str) {
        self.successes.push(msg.to_string());
    }

    fn warning(&mut self, msg: &str) {
        self.warnings.push(msg.to_string());
    }

    fn error(&mut self, msg: &str) {
        self.errors.push(msg.to_string());
    }

    fn show_header(&mut self, title: &str) {
        self.headers.push(title.to_string());
    }

    fn show_hint(&mut self, hint: &str) {
        self.hints.push(hint.to_string());
    }

    fn show_step(&mut self, host: &str, result: &StepResult) {
        self.steps.push((host.to_string(), result.summary_line()));
    }

    fn show_host(&mut self, report: &HostReport) {
        self.hosts.push((report.host.clone(), report.state));
    }

    fn show_run_summary(&mut self, run: &DeploymentRun) {
        self.summaries.push(run.outcome());
    }

    fn raw(&mut self, text: &str) {
        self.raw.push(text.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::Phase;

    #[test]
    fn captures_messages() {
        let mut ui = MockUI::new();

        ui.message("Deploying 3 host(s)");
        ui.success("web1 succeeded");
        ui.warning("web2: rolling back 2 step(s)");
        ui.error("web3 unreachable");

        assert_eq!(ui.messages(), &["Deploying 3 host(s)"]);
        assert_eq!(ui.successes(), &["web1 succeeded"]);
        assert_eq!(ui.warnings(), &["web2: rolling back 2 step(s)"]);
        assert_eq!(ui.errors(), &["web3 unreachable"]);
    }

    #[test]
    fn captures_steps_and_hosts() {
        let mut ui = MockUI::new();
        let result = StepResult::skipped("pull", Phase::Undo, String::new());
        ui.show_step("web1", &result);

        let mut report = HostReport::pending("web1", "10.0.0.1");
        report.state = HostState::RolledBack;
        ui.show_host(&report);

        assert_eq!(ui.steps()[0].1, "⊘ undo pull (no undo action)");
        assert_eq!(ui.hosts(), &[("web1".to_string(), HostState::RolledBack)]);
    }

    #[test]
    fn has_helpers_match_substrings() {
        let mut ui = MockUI::with_mode(OutputMode::Quiet);
        ui.show_hint("Run `convoy last` for details");
        assert!(ui.has_hint("convoy last"));
        assert!(!ui.has_hint("convoy history"));
        assert_eq!(ui.output_mode(), OutputMode::Quiet);
    }
}
