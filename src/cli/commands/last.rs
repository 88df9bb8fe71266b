//! Last command implementation.
//!
//! The `convoy last` command shows the most recent run report.

use crate::cli::args::LastArgs;
use crate::error::Result;
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult};
use super::project::Project;

/// The last command implementation.
pub struct LastCommand {
    project: Project,
    args: LastArgs,
}

impl LastCommand {
    /// Create a new last command.
    pub fn new(project: Project, args: LastArgs) -> Self {
        Self { project, args }
    }
}

impl Command for LastCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let store = self.project.history_store_or_default()?;

        let Some(run) = store.latest()? else {
            ui.message("No runs recorded.");
            return Ok(CommandResult::success());
        };

        if self.args.json {
            ui.raw(&run.to_json().map_err(anyhow::Error::from)?);
        } else {
            ui.raw(run.summary().trim_end());
        }
        Ok(CommandResult::success())
    }
}
