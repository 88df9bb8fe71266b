//! History command implementation.
//!
//! The `convoy history` command lists recorded runs, newest first.

use crate::cli::args::HistoryArgs;
use crate::error::Result;
use crate::runner::DeploymentRun;
use crate::steps::format_duration;
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult};
use super::project::Project;

/// The history command implementation.
pub struct HistoryCommand {
    project: Project,
    args: HistoryArgs,
}

impl HistoryCommand {
    /// Create a new history command.
    pub fn new(project: Project, args: HistoryArgs) -> Self {
        Self { project, args }
    }
}

fn history_line(run: &DeploymentRun) -> String {
    let (ok, rolled, failed) = run.counts();
    format!(
        "{}  {}  {:<9} {} ok / {} rolled back / {} failed  {}{}",
        run.id(),
        run.started_at().format("%Y-%m-%d %H:%M:%S"),
        run.outcome().to_string(),
        ok,
        rolled,
        failed,
        format_duration(run.duration()),
        if run.is_dry_run() { "  (dry run)" } else { "" }
    )
}

impl Command for HistoryCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let store = self.project.history_store_or_default()?;
        let runs = store.list(self.args.limit)?;

        if runs.is_empty() {
            ui.message("No runs recorded.");
            return Ok(CommandResult::success());
        }

        for run in &runs {
            ui.message(&history_line(run));
        }
        ui.show_hint("Run `convoy last` for the full report of the latest run");
        Ok(CommandResult::success())
    }
}
