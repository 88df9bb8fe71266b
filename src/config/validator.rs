//! Deployment file validation rules.
//!
//! - At least one host must be declared
//! - A host uses either a shared plan or inline steps, not both
//! - Plans referenced by hosts must exist
//! - Every host ends up with at least one step
//! - Steps need a name and a forward command, unique per step list
//! - Forward and undo commands must be well-formed templates

use std::collections::HashSet;

use crate::config::schema::{DeployConfig, HostConfig, StepConfig};
use crate::error::{ConvoyError, Result};
use crate::steps::CommandTemplate;

/// Validation error with context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Rule identifier
    pub rule: String,
    /// Human-readable error message
    pub message: String,
    /// Host name if error is host-specific
    pub host: Option<String>,
    /// Plan name if error is inside a shared plan
    pub plan: Option<String>,
    /// Step name if error is step-specific
    pub step: Option<String>,
}

impl ValidationError {
    fn new(rule: &str, message: String) -> Self {
        Self {
            rule: rule.to_string(),
            message,
            host: None,
            plan: None,
            step: None,
        }
    }

    fn for_host(mut self, host: &str) -> Self {
        self.host = Some(host.to_string());
        self
    }
}

/// Where a step list is declared, for error messages.
#[derive(Clone, Copy)]
enum Owner<'a> {
    Plan(&'a str),
    Host(&'a str),
}

impl Owner<'_> {
    fn describe(&self) -> String {
        match self {
            Owner::Plan(name) => format!("Plan '{}'", name),
            Owner::Host(name) => format!("Host '{}'", name),
        }
    }

    fn tag(&self, mut error: ValidationError) -> ValidationError {
        match self {
            Owner::Plan(name) => error.plan = Some(name.to_string()),
            Owner::Host(name) => error.host = Some(name.to_string()),
        }
        error
    }
}

/// Validate a deployment and return every problem found.
///
/// All rules run; nothing stops at the first error.
pub fn validate_config(config: &DeployConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if config.hosts.is_empty() {
        errors.push(ValidationError::new(
            "no-hosts",
            "No hosts are defined".to_string(),
        ));
    }

    for (name, steps) in &config.plans {
        errors.extend(validate_steps(steps, Owner::Plan(name)));
    }

    for (name, host) in &config.hosts {
        errors.extend(validate_host(name, host, config));
    }

    errors
}

fn validate_host(name: &str, host: &HostConfig, config: &DeployConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let inline = host.inline_steps();

    match host.plan_ref() {
        Some(plan) if !inline.is_empty() => {
            errors.push(
                ValidationError::new(
                    "plan-and-steps",
                    format!(
                        "Host '{}' declares both plan '{}' and inline steps",
                        name, plan
                    ),
                )
                .for_host(name),
            );
        }
        Some(plan) => match config.plans.get(plan) {
            None => errors.push(
                ValidationError::new(
                    "unknown-plan",
                    format!("Host '{}' uses plan '{}' which does not exist", name, plan),
                )
                .for_host(name),
            ),
            Some(steps) if steps.is_empty() => errors.push(
                ValidationError::new(
                    "empty-plan",
                    format!("Host '{}' uses plan '{}' which has no steps", name, plan),
                )
                .for_host(name),
            ),
            Some(_) => {}
        },
        None if inline.is_empty() => errors.push(
            ValidationError::new("empty-plan", format!("Host '{}' has no steps", name))
                .for_host(name),
        ),
        None => errors.extend(validate_steps(inline, Owner::Host(name))),
    }

    errors
}

fn validate_steps(steps: &[StepConfig], owner: Owner<'_>) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for (index, step) in steps.iter().enumerate() {
        let label = if step.name.trim().is_empty() {
            errors.push(owner.tag(ValidationError::new(
                "missing-name",
                format!("{} has an unnamed step at position {}", owner.describe(), index + 1),
            )));
            format!("#{}", index + 1)
        } else {
            if !seen.insert(step.name.as_str()) {
                let mut error = owner.tag(ValidationError::new(
                    "duplicate-step",
                    format!("{} declares step '{}' more than once", owner.describe(), step.name),
                ));
                error.step = Some(step.name.clone());
                errors.push(error);
            }
            step.name.clone()
        };

        if step.forward.trim().is_empty() {
            let mut error = owner.tag(ValidationError::new(
                "missing-command",
                format!("{} step '{}' has no forward command", owner.describe(), label),
            ));
            error.step = Some(label.clone());
            errors.push(error);
        }

        let templates = std::iter::once(step.forward.as_str()).chain(step.undo.as_deref());
        for source in templates {
            if let Err(e) = CommandTemplate::parse(source) {
                let mut error = owner.tag(ValidationError::new(
                    "template-syntax",
                    format!("{} step '{}': {}", owner.describe(), label, e),
                ));
                error.step = Some(label.clone());
                errors.push(error);
            }
        }
    }

    errors
}

/// Validate and return Result (for convenience).
///
/// # Errors
///
/// Returns `ConfigValidationError` if any validation rules fail.
pub fn validate(config: &DeployConfig) -> Result<()> {
    let errors = validate_config(config);

    if errors.is_empty() {
        Ok(())
    } else {
        let messages: Vec<_> = errors.iter().map(|e| e.message.clone()).collect();
        Err(ConvoyError::ConfigValidationError {
            message: messages.join("; "),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::HostDetails;

    fn step(name: &str, forward: &str) -> StepConfig {
        StepConfig {
            name: name.to_string(),
            forward: forward.to_string(),
            ..Default::default()
        }
    }

    fn config_with(host: HostConfig) -> DeployConfig {
        let mut config = DeployConfig::default();
        config.hosts.insert("web1".to_string(), host);
        config
    }

    fn rules(config: &DeployConfig) -> Vec<String> {
        validate_config(config).into_iter().map(|e| e.rule).collect()
    }

    #[test]
    fn valid_config_passes() {
        let config = config_with(HostConfig::Steps(vec![step("pull", "docker pull app")]));
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn requires_hosts() {
        assert_eq!(rules(&DeployConfig::default()), vec!["no-hosts"]);
    }

    #[test]
    fn unknown_plan_is_reported() {
        let config = config_with(HostConfig::Detailed(HostDetails {
            plan: Some("docker".to_string()),
            ..Default::default()
        }));
        let errors = validate_config(&config);
        assert_eq!(errors[0].rule, "unknown-plan");
        assert_eq!(errors[0].host.as_deref(), Some("web1"));
    }

    #[test]
    fn plan_and_inline_steps_conflict() {
        let mut config = config_with(HostConfig::Detailed(HostDetails {
            plan: Some("docker".to_string()),
            steps: vec![step("pull", "docker pull app")],
            ..Default::default()
        }));
        config
            .plans
            .insert("docker".to_string(), vec![step("pull", "docker pull app")]);
        assert_eq!(rules(&config), vec!["plan-and-steps"]);
    }

    #[test]
    fn host_without_steps_is_reported() {
        let config = config_with(HostConfig::Steps(vec![]));
        assert_eq!(rules(&config), vec!["empty-plan"]);
    }

    #[test]
    fn duplicate_and_unnamed_steps() {
        let config = config_with(HostConfig::Steps(vec![
            step("pull", "docker pull a"),
            step("pull", "docker pull b"),
            step("", "echo hi"),
        ]));
        let errors = rules(&config);
        assert!(errors.contains(&"duplicate-step".to_string()));
        assert!(errors.contains(&"missing-name".to_string()));
    }

    #[test]
    fn missing_forward_command() {
        let config = config_with(HostConfig::Steps(vec![step("pull", " ")]));
        let errors = validate_config(&config);
        assert_eq!(errors[0].rule, "missing-command");
        assert_eq!(errors[0].step.as_deref(), Some("pull"));
    }

    #[test]
    fn bad_templates_in_plans_are_reported() {
        let mut config = config_with(HostConfig::Detailed(HostDetails {
            plan: Some("docker".to_string()),
            ..Default::default()
        }));
        let mut bad = step("stop", "docker stop ${name");
        bad.undo = Some("docker start ${}".to_string());
        config.plans.insert("docker".to_string(), vec![bad]);

        let errors = validate_config(&config);
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.rule == "template-syntax"));
        assert_eq!(errors[0].plan.as_deref(), Some("docker"));
    }

    #[test]
    fn collects_errors_across_hosts() {
        let mut config = config_with(HostConfig::Steps(vec![]));
        config
            .hosts
            .insert("web2".to_string(), HostConfig::Steps(vec![step("x", "")]));

        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("web1"));
        assert!(err.contains("web2"));
    }
}
