//! Run command implementation.
//!
//! The `convoy run` command deploys every selected host and records the
//! resulting report in run history.

use std::sync::{Mutex, PoisonError};

use tracing::{debug, info, warn};

use crate::cli::args::RunArgs;
use crate::config::Settings;
use crate::error::Result;
use crate::plan::{build_plans, select_hosts};
use crate::runner::{
    CancellationToken, DeploymentRun, Orchestrator, RunOptions, RunOutcome, RunProgress,
};
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult};
use super::project::{executor_for, parse_vars, Project};

/// The run command implementation.
pub struct RunCommand {
    project: Project,
    args: RunArgs,
    cancel: CancellationToken,
}

impl RunCommand {
    /// Create a new run command.
    pub fn new(project: Project, args: RunArgs, cancel: CancellationToken) -> Self {
        Self {
            project,
            args,
            cancel,
        }
    }

    fn options(&self, settings: &Settings) -> RunOptions {
        let mut options = RunOptions::from_settings(settings);
        options.dry_run = self.args.dry_run;
        if let Some(max) = self.args.max_parallel {
            options.max_parallel = max;
        }
        if let Some(retries) = self.args.retries {
            options.retries = retries;
        }
        options
    }

    fn records_history(&self, settings: &Settings) -> bool {
        settings.history && !self.args.no_history && !self.args.dry_run
    }

    /// Status text that must stay off stdout while it carries JSON.
    fn notice(&self, ui: &mut dyn UserInterface, msg: &str) {
        if self.args.json {
            warn!("{}", msg);
        } else {
            ui.warning(msg);
        }
    }

    /// Hosts to deploy, or `None` when there is nothing to do.
    fn selected_hosts(
        &self,
        settings: &Settings,
        ui: &mut dyn UserInterface,
    ) -> Result<Option<Vec<String>>> {
        if !self.args.rerun_failed {
            return Ok(Some(self.args.hosts.clone()));
        }

        let store = self.project.history_store(settings)?;
        let Some(last) = store.latest()? else {
            self.notice(ui, "No previous run recorded; nothing to re-run");
            return Ok(None);
        };

        let failed: Vec<String> = last
            .failed_hosts()
            .into_iter()
            .filter(|h| self.args.hosts.is_empty() || self.args.hosts.contains(h))
            .collect();

        if failed.is_empty() {
            let msg = format!("Every host succeeded in {}; nothing to re-run", last.id());
            if self.args.json {
                info!("{}", msg);
            } else {
                ui.success(&msg);
            }
            return Ok(None);
        }

        if self.args.json {
            info!("re-running {} from {}", failed.join(", "), last.id());
        } else {
            ui.message(&format!("Re-running {} from {}", failed.join(", "), last.id()));
        }
        Ok(Some(failed))
    }

    fn record(&self, run: &DeploymentRun, settings: &Settings, ui: &mut dyn UserInterface) {
        let store = match self.project.history_store(settings) {
            Ok(store) => store,
            Err(e) => return self.notice(ui, &format!("Could not record run: {}", e)),
        };
        match store.save(run) {
            Ok(path) => debug!("recorded run at {}", path.display()),
            Err(e) => self.notice(ui, &format!("Could not record run: {}", e)),
        }
        if let Err(e) = store.prune(settings.history_retention) {
            warn!("failed to prune run history: {}", e);
        }
    }
}

impl Command for RunCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let config = self.project.load_valid()?;
        let overrides = parse_vars(&self.args.vars)?;
        let plans = build_plans(&config, &overrides)?;

        // With --json a no-op rerun still prints an (empty) report.
        let plans = match self.selected_hosts(&config.settings, ui)? {
            Some(selection) => select_hosts(plans, &selection)?,
            None if self.args.json => Vec::new(),
            None => return Ok(CommandResult::success()),
        };

        let executor = executor_for(&config.settings);
        let orchestrator = Orchestrator::new(&*executor, self.options(&config.settings))
            .with_cancellation(self.cancel.clone());

        if !self.args.json {
            ui.show_header(&format!(
                "Deploying {} to {} host(s){}",
                config.app_name.as_deref().unwrap_or("application"),
                plans.len(),
                if self.args.dry_run { " (dry run)" } else { "" }
            ));
        }

        let run = {
            let quiet = self.args.json;
            let shared = Mutex::new(&mut *ui);
            orchestrator.run_with_progress(&plans, &|event| {
                if quiet {
                    return;
                }
                let mut ui = shared.lock().unwrap_or_else(PoisonError::into_inner);
                show_progress(&mut **ui, event);
            })?
        };

        if self.records_history(&config.settings) && !plans.is_empty() {
            self.record(&run, &config.settings, ui);
        }

        if self.args.json {
            ui.raw(&run.to_json().map_err(anyhow::Error::from)?);
        } else {
            if let Some(reason) = run.cancelled() {
                ui.warning(&format!("Run cancelled: {}", reason));
            }
            ui.show_run_summary(&run);
            if run.outcome() != RunOutcome::Succeeded && !run.is_dry_run() {
                ui.show_hint("Re-run the hosts that did not succeed with `convoy run --rerun-failed`");
            }
        }

        Ok(match run.outcome() {
            RunOutcome::Succeeded => CommandResult::success(),
            RunOutcome::Partial | RunOutcome::Failed => CommandResult::failure(1),
        })
    }
}

fn show_progress(ui: &mut dyn UserInterface, event: RunProgress<'_>) {
    match event {
        RunProgress::HostStarted { host } => debug!("deploying {}", host),
        RunProgress::HostUnreachable { host, error } => {
            ui.warning(&format!("{}: unreachable ({})", host, error));
        }
        RunProgress::StepStarting { .. } => {}
        RunProgress::StepRetrying {
            host,
            step,
            attempt,
            error,
        } => {
            ui.warning(&format!(
                "{}: '{}' attempt {} failed ({}), retrying",
                host, step, attempt, error
            ));
        }
        RunProgress::StepFinished { host, result } => ui.show_step(host, result),
        RunProgress::RollbackStarting { host, steps } => {
            ui.warning(&format!("{}: rolling back {} step(s)", host, steps));
        }
        RunProgress::HostFinished { report } => ui.show_host(report),
    }
}
