//! The deployment step: one forward action with a declared undo.

use std::time::Duration;

use chrono::Utc;
use tracing::debug;

use super::result::{Phase, StepResult};
use super::template::{CommandTemplate, TemplateContext};
use crate::error::Result;
use crate::remote::{Host, RemoteExecutor};

/// A named unit of deployment work.
///
/// Steps are immutable once built: the builder methods consume the step,
/// and a constructed step only exposes getters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    name: String,
    forward: CommandTemplate,
    undo: Option<CommandTemplate>,
    critical: bool,
    idempotent: bool,
    timeout: Option<Duration>,
}

impl Step {
    /// Create a non-critical, idempotent step with no undo action.
    pub fn new(name: impl Into<String>, forward: CommandTemplate) -> Self {
        Self {
            name: name.into(),
            forward,
            undo: None,
            critical: false,
            idempotent: true,
            timeout: None,
        }
    }

    /// Parse `forward` and create a step from it.
    pub fn parse(name: impl Into<String>, forward: &str) -> Result<Self> {
        Ok(Self::new(name, CommandTemplate::parse(forward)?))
    }

    /// Set the undo action.
    pub fn with_undo(mut self, undo: CommandTemplate) -> Self {
        self.undo = if undo.is_blank() { None } else { Some(undo) };
        self
    }

    /// Mark whether a failure of this step forces a rollback.
    pub fn critical(mut self, critical: bool) -> Self {
        self.critical = critical;
        self
    }

    /// Mark whether the step is safe to run more than once.
    pub fn idempotent(mut self, idempotent: bool) -> Self {
        self.idempotent = idempotent;
        self
    }

    /// Override the run-level step timeout.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn forward(&self) -> &CommandTemplate {
        &self.forward
    }

    /// The undo action, or `None` for a no-op.
    pub fn undo_action(&self) -> Option<&CommandTemplate> {
        self.undo.as_ref()
    }

    pub fn is_critical(&self) -> bool {
        self.critical
    }

    pub fn is_idempotent(&self) -> bool {
        self.idempotent
    }

    /// Step timeout, falling back to `default`.
    pub fn timeout_or(&self, default: Option<Duration>) -> Option<Duration> {
        self.timeout.or(default)
    }

    /// Execute the forward action once.
    ///
    /// A non-zero exit, timeout or connection failure is reported in the
    /// returned result, never raised.
    pub fn run(
        &self,
        executor: &dyn RemoteExecutor,
        host: &Host,
        context: &TemplateContext,
        timeout: Option<Duration>,
    ) -> StepResult {
        execute_action(
            &self.name,
            Phase::Forward,
            &self.forward,
            executor,
            host,
            context,
            self.timeout_or(timeout),
        )
    }

    /// Execute the undo action once.
    ///
    /// A no-op undo records a skipped result without touching the host.
    pub fn undo(
        &self,
        executor: &dyn RemoteExecutor,
        host: &Host,
        context: &TemplateContext,
        timeout: Option<Duration>,
    ) -> StepResult {
        match &self.undo {
            Some(undo) => execute_action(
                &self.name,
                Phase::Undo,
                undo,
                executor,
                host,
                context,
                self.timeout_or(timeout),
            ),
            None => StepResult::skipped(&self.name, Phase::Undo, String::new()),
        }
    }

    /// Render the forward command without executing it.
    pub fn preview(&self, context: &TemplateContext) -> StepResult {
        match self.forward.render(context) {
            Ok(command) => StepResult::skipped(&self.name, Phase::Forward, command),
            Err(e) => StepResult::not_run(
                &self.name,
                Phase::Forward,
                self.forward.source().to_string(),
                e.to_string(),
            ),
        }
    }
}

fn execute_action(
    name: &str,
    phase: Phase,
    template: &CommandTemplate,
    executor: &dyn RemoteExecutor,
    host: &Host,
    context: &TemplateContext,
    timeout: Option<Duration>,
) -> StepResult {
    let command = match template.render(context) {
        Ok(command) => command,
        Err(e) => {
            return StepResult::not_run(name, phase, template.source().to_string(), e.to_string())
        }
    };

    debug!("{} {} on {}: {}", phase, name, host, command);
    let started_at = Utc::now();

    match executor.execute(host, &command, timeout) {
        Ok(output) => StepResult::from_output(name, phase, command, started_at, output),
        Err(e) => StepResult::from_exec_error(name, phase, command, started_at, &e),
    }
}
