//! User-facing output.
//!
//! This module provides:
//! - [`UserInterface`] trait for UI abstraction
//! - [`TerminalUI`] for styled terminal output
//! - [`MockUI`] for capturing output in tests
//!
//! # Example
//!
//! ```
//! use convoy::ui::{MockUI, UserInterface};
//!
//! let mut ui = MockUI::new();
//! ui.show_header("shop");
//! ui.success("Deployed");
//! assert_eq!(ui.successes(), &["Deployed".to_string()]);
//! ```

pub mod mock;
pub mod output;
pub mod terminal;
pub mod theme;

pub use mock::MockUI;
pub use output::OutputMode;
pub use terminal::TerminalUI;
pub use theme::{should_use_colors, ConvoyTheme};

use crate::runner::{DeploymentRun, HostReport};
use crate::steps::StepResult;

/// Trait for user interface interactions.
///
/// Progress arrives from worker threads, so implementations must be `Send`
/// to be shared behind a mutex.
pub trait UserInterface: Send {
    /// Get the current output mode.
    fn output_mode(&self) -> OutputMode;

    /// Display a message to the user.
    fn message(&mut self, msg: &str);

    /// Display a success message.
    fn success(&mut self, msg: &str);

    /// Display a warning message.
    fn warning(&mut self, msg: &str);

    /// Display an error message.
    fn error(&mut self, msg: &str);

    /// Show a header/banner.
    fn show_header(&mut self, title: &str);

    /// Show a follow-up suggestion.
    fn show_hint(&mut self, hint: &str);

    /// Show one finished step action on a host.
    fn show_step(&mut self, host: &str, result: &StepResult);

    /// Show a host that reached a terminal state.
    fn show_host(&mut self, report: &HostReport);

    /// Show the end-of-run summary.
    fn show_run_summary(&mut self, run: &DeploymentRun);

    /// Write machine-readable output, regardless of mode.
    fn raw(&mut self, text: &str);
}
