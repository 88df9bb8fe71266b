//! Host plans: the steps bound to one target for one run.

use std::collections::HashMap;
use std::time::Duration;

use crate::config::{DeployConfig, HostConfig, StepConfig};
use crate::error::{ConvoyError, Result};
use crate::remote::Host;
use crate::steps::{CommandTemplate, Step, TemplateContext};

/// Ordered steps for one host, with the values its placeholders resolve to.
#[derive(Debug, Clone)]
pub struct HostPlan {
    pub host: Host,
    pub steps: Vec<Step>,
    pub context: TemplateContext,
}

impl HostPlan {
    /// Create a plan with a bare context for `host`.
    pub fn new(host: Host, steps: Vec<Step>) -> Self {
        let context = context_for(&host);
        Self {
            host,
            steps,
            context,
        }
    }

    /// Replace the template context.
    pub fn with_context(mut self, context: TemplateContext) -> Self {
        self.context = context;
        self
    }

    /// Placeholders no step on this host can resolve, as `(step, name)`.
    pub fn unresolved(&self) -> Vec<(String, String)> {
        let mut missing = Vec::new();
        for step in &self.steps {
            let templates = std::iter::once(step.forward()).chain(step.undo_action());
            for template in templates {
                for name in template.missing(&self.context) {
                    let entry = (step.name().to_string(), name);
                    if !missing.contains(&entry) {
                        missing.push(entry);
                    }
                }
            }
        }
        missing
    }
}

fn context_for(host: &Host) -> TemplateContext {
    let mut context =
        TemplateContext::new(&host.name).with_builtin("address", &host.address);
    if let Some(user) = &host.user {
        context = context.with_builtin("user", user);
    }
    context
}

/// Convert a step definition into a [`Step`].
pub fn build_step(config: &StepConfig) -> Result<Step> {
    let mut step = Step::parse(config.name.clone(), &config.forward)?
        .critical(config.critical)
        .idempotent(config.idempotent)
        .with_timeout(config.timeout.filter(|s| *s > 0).map(Duration::from_secs));
    if let Some(undo) = &config.undo {
        step = step.with_undo(CommandTemplate::parse(undo)?);
    }
    Ok(step)
}

fn host_steps<'a>(name: &str, host: &'a HostConfig, config: &'a DeployConfig) -> Result<&'a [StepConfig]> {
    match host.plan_ref() {
        Some(plan) => config
            .plans
            .get(plan)
            .map(Vec::as_slice)
            .ok_or_else(|| ConvoyError::ConfigValidationError {
                message: format!("Host '{}' uses plan '{}' which does not exist", name, plan),
            }),
        None => Ok(host.inline_steps()),
    }
}

/// Build a plan for every host in `config`, in host name order.
///
/// `overrides` take precedence over host and global variables.
///
/// # Errors
///
/// Fails on a malformed template, an unknown plan, or a placeholder that
/// cannot be resolved for some host.
pub fn build_plans(
    config: &DeployConfig,
    overrides: &HashMap<String, String>,
) -> Result<Vec<HostPlan>> {
    let mut plans = Vec::with_capacity(config.hosts.len());

    for (name, host_config) in &config.hosts {
        let details = host_config.details();
        let mut host = Host::new(name.clone());
        if let Some(address) = details.address {
            host = host.with_address(address);
        }
        if let Some(user) = details.user {
            host = host.with_user(user);
        }
        if let Some(port) = details.port {
            host = host.with_port(port);
        }

        let steps = host_steps(name, host_config, config)?
            .iter()
            .map(build_step)
            .collect::<Result<Vec<_>>>()?;

        let mut context = context_for(&host);
        context.vars = config.vars.clone();
        context.host_vars = details.vars;
        context.overrides = overrides.clone();

        let plan = HostPlan::new(host, steps).with_context(context);
        if let Some((_, missing)) = plan.unresolved().into_iter().next() {
            return Err(ConvoyError::UnresolvedPlaceholder {
                name: missing,
                host: name.clone(),
            });
        }
        plans.push(plan);
    }

    Ok(plans)
}

/// Keep only the plans for `names`, preserving plan order.
///
/// An empty `names` keeps everything.
///
/// # Errors
///
/// Returns `ConfigValidationError` for a name that matches no host.
pub fn select_hosts(plans: Vec<HostPlan>, names: &[String]) -> Result<Vec<HostPlan>> {
    if names.is_empty() {
        return Ok(plans);
    }
    if let Some(unknown) = names
        .iter()
        .find(|n| !plans.iter().any(|p| &p.host.name == *n))
    {
        return Err(ConvoyError::ConfigValidationError {
            message: format!("Unknown host '{}'", unknown),
        });
    }
    Ok(plans
        .into_iter()
        .filter(|p| names.contains(&p.host.name))
        .collect())
}
