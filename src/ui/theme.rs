//! Visual theme and styling.

use console::Style;

use crate::runner::{HostState, RunOutcome};
use crate::steps::StepStatus;

/// convoy's visual theme.
#[derive(Debug, Clone)]
pub struct ConvoyTheme {
    /// Style for success messages (green).
    pub success: Style,
    /// Style for warning messages (orange).
    pub warning: Style,
    /// Style for error messages (red bold).
    pub error: Style,
    /// Style for running elements and rollbacks (magenta).
    pub info: Style,
    /// Style for dim/secondary text.
    pub dim: Style,
    /// Style for host names (bold).
    pub highlight: Style,
    /// Style for headers (magenta bold).
    pub header: Style,
    /// Style for commands shown in output (dim italic).
    pub command: Style,
    /// Style for contextual hints (magenta dim).
    pub hint: Style,
}

impl Default for ConvoyTheme {
    fn default() -> Self {
        Self::new()
    }
}

impl ConvoyTheme {
    pub fn new() -> Self {
        Self {
            success: Style::new().green(),
            warning: Style::new().color256(208),
            error: Style::new().red().bold(),
            info: Style::new().magenta(),
            dim: Style::new().dim(),
            highlight: Style::new().bold(),
            header: Style::new().bold().magenta(),
            command: Style::new().dim().italic(),
            hint: Style::new().magenta().dim(),
        }
    }

    /// A theme without colors (for non-TTY or --no-color).
    pub fn plain() -> Self {
        Self {
            success: Style::new(),
            warning: Style::new(),
            error: Style::new(),
            info: Style::new(),
            dim: Style::new(),
            highlight: Style::new(),
            header: Style::new(),
            command: Style::new(),
            hint: Style::new(),
        }
    }

    pub fn format_success(&self, msg: &str) -> String {
        format!("{}", self.success.apply_to(format!("✓ {}", msg)))
    }

    pub fn format_warning(&self, msg: &str) -> String {
        format!("{}", self.warning.apply_to(format!("⚠ {}", msg)))
    }

    pub fn format_error(&self, msg: &str) -> String {
        format!("{}", self.error.apply_to(format!("✗ {}", msg)))
    }

    pub fn format_header(&self, title: &str) -> String {
        format!(
            "{} {}",
            self.header.apply_to("▶"),
            self.highlight.apply_to(title)
        )
    }

    pub fn for_status(&self, status: StepStatus) -> &Style {
        match status {
            StepStatus::Succeeded => &self.success,
            StepStatus::Skipped => &self.dim,
            StepStatus::TimedOut => &self.warning,
            StepStatus::Failed | StepStatus::Unreachable => &self.error,
        }
    }

    pub fn for_host(&self, state: HostState) -> &Style {
        match state {
            HostState::Succeeded => &self.success,
            HostState::RolledBack => &self.warning,
            HostState::Failed => &self.error,
            HostState::Pending | HostState::Running => &self.info,
        }
    }

    pub fn for_outcome(&self, outcome: RunOutcome) -> &Style {
        match outcome {
            RunOutcome::Succeeded => &self.success,
            RunOutcome::Partial => &self.warning,
            RunOutcome::Failed => &self.error,
        }
    }
}

/// Check if colors should be enabled.
pub fn should_use_colors() -> bool {
    // https://no-color.org/
    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    console::Term::stdout().is_term()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_theme_formats_icons() {
        let theme = ConvoyTheme::plain();
        assert_eq!(theme.format_success("done"), "✓ done");
        assert_eq!(theme.format_warning("careful"), "⚠ careful");
        assert_eq!(theme.format_error("broken"), "✗ broken");
        assert!(theme.format_header("shop").contains("shop"));
    }

    #[test]
    fn styles_by_state_do_not_panic() {
        let theme = ConvoyTheme::new();
        let _ = theme.for_host(HostState::RolledBack).apply_to("web1");
        let _ = theme.for_status(StepStatus::TimedOut).apply_to("pull");
        let _ = theme.for_outcome(RunOutcome::Partial).apply_to("partial");
    }
}
