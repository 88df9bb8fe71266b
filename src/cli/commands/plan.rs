//! Plan command implementation.
//!
//! The `convoy plan` command prints every host's steps with their commands
//! fully resolved, without connecting to anything.

use crate::cli::args::PlanArgs;
use crate::error::Result;
use crate::plan::{build_plans, select_hosts, HostPlan};
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult};
use super::project::{parse_vars, Project};

/// The plan command implementation.
pub struct PlanCommand {
    project: Project,
    args: PlanArgs,
}

impl PlanCommand {
    /// Create a new plan command.
    pub fn new(project: Project, args: PlanArgs) -> Self {
        Self { project, args }
    }
}

fn describe(plan: &HostPlan) -> Result<Vec<String>> {
    let mut lines = Vec::new();
    for (index, step) in plan.steps.iter().enumerate() {
        let mut flags = Vec::new();
        if step.is_critical() {
            flags.push("critical");
        }
        if !step.is_idempotent() {
            flags.push("run once");
        }
        let flags = if flags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", flags.join(", "))
        };

        lines.push(format!("  {}. {}{}", index + 1, step.name(), flags));
        lines.push(format!("       {}", step.forward().render(&plan.context)?));
        if let Some(undo) = step.undo_action() {
            lines.push(format!("     undo: {}", undo.render(&plan.context)?));
        }
    }
    Ok(lines)
}

impl Command for PlanCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let config = self.project.load_valid()?;
        let overrides = parse_vars(&self.args.vars)?;
        let plans = select_hosts(build_plans(&config, &overrides)?, &self.args.hosts)?;

        for plan in &plans {
            ui.show_header(&plan.host.to_string());
            for line in describe(plan)? {
                ui.message(&line);
            }
        }

        let steps: usize = plans.iter().map(|p| p.steps.len()).sum();
        ui.success(&format!("{} host(s), {} step(s)", plans.len(), steps));
        Ok(CommandResult::success())
    }
}
