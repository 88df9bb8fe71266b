//! Configuration schema definitions for convoy.
//!
//! This module contains the struct definitions that map to the
//! `convoy.yml` file format.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::remote::SshSettings;

/// Root configuration structure for convoy.yml
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    /// Application name (for display purposes)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,

    /// Variables available to every host's step templates
    #[serde(
        deserialize_with = "scalar_map",
        serialize_with = "sorted_map",
        skip_serializing_if = "HashMap::is_empty"
    )]
    pub vars: HashMap<String, String>,

    /// Global settings
    pub settings: Settings,

    /// Named step sequences that hosts can share
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub plans: BTreeMap<String, Vec<StepConfig>>,

    /// Deployment targets
    pub hosts: BTreeMap<String, HostConfig>,
}

/// Global settings that apply to every host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// How commands reach the hosts
    pub transport: Transport,

    /// Maximum hosts deployed at once (0 = all hosts at once)
    pub max_parallel: usize,

    /// Default per-step timeout in seconds (0 = none)
    pub step_timeout: u64,

    /// Connection timeout in seconds (0 = transport default)
    pub connect_timeout: u64,

    /// Extra attempts for failed idempotent steps
    pub retries: u32,

    /// Seconds to wait between attempts
    pub retry_delay: u64,

    /// Record finished runs in the history directory
    pub history: bool,

    /// History directory (defaults to ~/.convoy/runs)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_dir: Option<PathBuf>,

    /// Number of run reports to keep
    pub history_retention: usize,

    /// ssh client options
    pub ssh: SshSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            transport: Transport::Ssh,
            max_parallel: 0,
            step_timeout: default_step_timeout(),
            connect_timeout: default_connect_timeout(),
            retries: 0,
            retry_delay: default_retry_delay(),
            history: true,
            history_dir: None,
            history_retention: default_history_retention(),
            ssh: SshSettings::default(),
        }
    }
}

fn default_step_timeout() -> u64 {
    300
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_retry_delay() -> u64 {
    2
}

fn default_history_retention() -> usize {
    50
}

fn default_true() -> bool {
    true
}

fn is_true(v: &bool) -> bool {
    *v
}

fn is_false(v: &bool) -> bool {
    !v
}

fn secs(value: u64) -> Option<Duration> {
    (value > 0).then(|| Duration::from_secs(value))
}

impl Settings {
    /// Default step timeout, `None` when disabled.
    pub fn step_timeout(&self) -> Option<Duration> {
        secs(self.step_timeout)
    }

    /// Connection timeout, `None` when disabled.
    pub fn connect_timeout(&self) -> Option<Duration> {
        secs(self.connect_timeout)
    }

    /// Delay between retry attempts.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay)
    }
}

/// Command transport
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Run commands over the system ssh client
    #[default]
    Ssh,
    /// Run commands on this machine
    Local,
}

/// Definition of a single deployment step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepConfig {
    /// Step name (unique within a host's plan)
    pub name: String,

    /// Command that performs the step
    #[serde(alias = "forward_command", alias = "command")]
    pub forward: String,

    /// Command that reverts the step (omitted = no-op)
    #[serde(alias = "undo_command", skip_serializing_if = "Option::is_none")]
    pub undo: Option<String>,

    /// Failure forces a rollback of the host
    #[serde(skip_serializing_if = "is_false")]
    pub critical: bool,

    /// Safe to run again (allows retries)
    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub idempotent: bool,

    /// Per-step timeout in seconds, overriding settings.step_timeout
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl Default for StepConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            forward: String::new(),
            undo: None,
            critical: false,
            idempotent: true,
            timeout: None,
        }
    }
}

/// A deployment target: either a bare list of steps or a detailed entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HostConfig {
    /// `host: [steps...]`
    Steps(Vec<StepConfig>),
    /// `host: { address, plan, vars, ... }`
    Detailed(HostDetails),
}

/// Detailed host entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostDetails {
    /// Network address (defaults to the host name)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    /// Login user
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// Port
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Name of a shared plan from `plans`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,

    /// Inline steps
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<StepConfig>,

    /// Host variables (override global vars)
    #[serde(
        deserialize_with = "scalar_map",
        serialize_with = "sorted_map",
        skip_serializing_if = "HashMap::is_empty"
    )]
    pub vars: HashMap<String, String>,
}

impl HostConfig {
    /// Details for this host (empty for the bare-list form).
    pub fn details(&self) -> HostDetails {
        match self {
            HostConfig::Steps(_) => HostDetails::default(),
            HostConfig::Detailed(details) => details.clone(),
        }
    }

    /// The shared plan this host references, if any.
    pub fn plan_ref(&self) -> Option<&str> {
        match self {
            HostConfig::Steps(_) => None,
            HostConfig::Detailed(details) => details.plan.as_deref(),
        }
    }

    /// Steps declared inline on the host.
    pub fn inline_steps(&self) -> &[StepConfig] {
        match self {
            HostConfig::Steps(steps) => steps,
            HostConfig::Detailed(details) => &details.steps,
        }
    }
}

/// Accept strings, numbers and booleans as variable values.
fn scalar_map<'de, D>(deserializer: D) -> Result<HashMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    use serde_yaml::Value;

    let raw: Option<HashMap<String, Value>> = Option::deserialize(deserializer)?;
    raw.unwrap_or_default()
        .into_iter()
        .map(|(key, value)| {
            let text = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                other => {
                    return Err(D::Error::custom(format!(
                        "variable '{}' must be a scalar, got {:?}",
                        key, other
                    )))
                }
            };
            Ok((key, text))
        })
        .collect()
}

fn sorted_map<S>(map: &HashMap<String, String>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    map.iter().collect::<BTreeMap<_, _>>().serialize(serializer)
}
