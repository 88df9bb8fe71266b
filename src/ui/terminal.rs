//! Styled terminal output.

use std::io::Write;

use console::Term;

use super::{should_use_colors, ConvoyTheme, OutputMode, UserInterface};
use crate::runner::{DeploymentRun, HostReport};
use crate::steps::{format_duration, StepResult};

/// Terminal UI implementation.
pub struct TerminalUI {
    term: Term,
    theme: ConvoyTheme,
    mode: OutputMode,
}

impl TerminalUI {
    pub fn new(mode: OutputMode) -> Self {
        let theme = if should_use_colors() {
            ConvoyTheme::new()
        } else {
            ConvoyTheme::plain()
        };

        Self {
            term: Term::stdout(),
            theme,
            mode,
        }
    }

    /// Use a fixed theme, e.g. plain for `--no-color`.
    pub fn with_theme(mut self, theme: ConvoyTheme) -> Self {
        self.theme = theme;
        self
    }

    fn indented_block(&mut self, label: &str, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        writeln!(self.term, "      {}", self.theme.dim.apply_to(label)).ok();
        for line in text.lines() {
            writeln!(self.term, "      {}", self.theme.dim.apply_to(line)).ok();
        }
    }
}

impl UserInterface for TerminalUI {
    fn output_mode(&self) -> OutputMode {
        self.mode
    }

    fn message(&mut self, msg: &str) {
        if self.mode.shows_status() {
            writeln!(self.term, "{}", msg).ok();
        }
    }

    fn success(&mut self, msg: &str) {
        if self.mode.shows_status() {
            writeln!(self.term, "{}", self.theme.format_success(msg)).ok();
        }
    }

    fn warning(&mut self, msg: &str) {
        if self.mode.shows_status() {
            writeln!(self.term, "{}", self.theme.format_warning(msg)).ok();
        }
    }

    fn error(&mut self, msg: &str) {
        writeln!(self.term, "{}", self.theme.format_error(msg)).ok();
    }

    fn show_header(&mut self, title: &str) {
        if self.mode.shows_status() {
            writeln!(self.term, "\n{}\n", self.theme.format_header(title)).ok();
        }
    }

    fn show_hint(&mut self, hint: &str) {
        if self.mode.shows_status() {
            writeln!(self.term, "  {}", self.theme.hint.apply_to(hint)).ok();
        }
    }

    fn show_step(&mut self, host: &str, result: &StepResult) {
        if !self.mode.shows_steps() {
            return;
        }
        writeln!(
            self.term,
            "  {} {}",
            self.theme.highlight.apply_to(format!("{:<12}", host)),
            self.theme
                .for_status(result.status)
                .apply_to(result.summary_line())
        )
        .ok();

        if self.mode.shows_command_output() {
            if !result.command.is_empty() {
                writeln!(self.term, "      {}", self.theme.command.apply_to(&result.command)).ok();
            }
            self.indented_block("stdout:", &result.stdout);
            self.indented_block("stderr:", &result.stderr);
        } else if !result.is_ok() {
            self.indented_block("stderr:", &result.stderr);
        }
    }

    fn show_host(&mut self, report: &HostReport) {
        if !self.mode.shows_status() {
            return;
        }
        let style = self.theme.for_host(report.state);
        writeln!(
            self.term,
            "  {} {} {}",
            self.theme.highlight.apply_to(format!("{:<12}", report.host)),
            style.apply_to(report.state.to_string()),
            self.theme.dim.apply_to(format_duration(report.duration()))
        )
        .ok();
        if let Some(failure) = &report.failure {
            writeln!(self.term, "  {:<12} {}", "", style.apply_to(failure)).ok();
        }
    }

    fn show_run_summary(&mut self, run: &DeploymentRun) {
        if !self.mode.shows_status() {
            return;
        }
        let (ok, rolled, failed) = run.counts();
        writeln!(self.term).ok();
        for report in run.hosts().values() {
            let marker = if report.succeeded() { "✓" } else { "✗" };
            let mut line = format!("{} {:<12} {}", marker, report.host, report.state);
            if !report.rollback_complete {
                line.push_str(" (rollback incomplete)");
            }
            writeln!(self.term, "  {}", self.theme.for_host(report.state).apply_to(line)).ok();
        }
        writeln!(
            self.term,
            "\n{} {} {}",
            self.theme.highlight.apply_to("Outcome:"),
            self.theme
                .for_outcome(run.outcome())
                .apply_to(run.outcome().to_string()),
            self.theme.dim.apply_to(format!(
                "· {} succeeded · {} rolled back · {} failed · {}",
                ok,
                rolled,
                failed,
                format_duration(run.duration())
            ))
        )
        .ok();
    }

    fn raw(&mut self, text: &str) {
        writeln!(self.term, "{}", text).ok();
    }
}
