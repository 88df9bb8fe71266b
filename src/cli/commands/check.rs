//! Check command implementation.
//!
//! The `convoy check` command validates the deployment file, reporting
//! every problem at once, and can optionally try to reach each host.

use crate::cli::args::CheckArgs;
use crate::config::validate_config;
use crate::error::Result;
use crate::plan::build_plans;
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult};
use super::project::{executor_for, Project};

/// The check command implementation.
pub struct CheckCommand {
    project: Project,
    args: CheckArgs,
}

impl CheckCommand {
    /// Create a new check command.
    pub fn new(project: Project, args: CheckArgs) -> Self {
        Self { project, args }
    }
}

impl Command for CheckCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let config = self.project.load()?;

        let errors = validate_config(&config);
        if !errors.is_empty() {
            for error in &errors {
                ui.error(&error.message);
            }
            ui.message(&format!("{} problem(s) found", errors.len()));
            return Ok(CommandResult::failure(2));
        }

        let plans = match build_plans(&config, &Default::default()) {
            Ok(plans) => plans,
            Err(e) => {
                ui.error(&e.to_string());
                ui.show_hint("Define the variable in `vars` or pass it with --var");
                return Ok(CommandResult::failure(2));
            }
        };

        let steps: usize = plans.iter().map(|p| p.steps.len()).sum();
        ui.success(&format!(
            "Configuration is valid: {} host(s), {} step(s)",
            plans.len(),
            steps
        ));

        if !self.args.connect {
            return Ok(CommandResult::success());
        }

        let executor = executor_for(&config.settings);
        let mut unreachable = 0;
        for plan in &plans {
            match executor.connect(&plan.host, config.settings.connect_timeout()) {
                Ok(()) => ui.success(&format!("{} reachable", plan.host.name)),
                Err(e) => {
                    unreachable += 1;
                    ui.error(&format!("{} unreachable: {}", plan.host.name, e));
                }
            }
        }

        if unreachable > 0 {
            Ok(CommandResult::failure(1))
        } else {
            Ok(CommandResult::success())
        }
    }
}
