//! Built-in step plans.
//!
//! `convoy init` writes a deployment built from these, and they double as
//! ready-made fixtures for tests.

use std::collections::{BTreeMap, HashMap};

use crate::config::schema::{DeployConfig, HostConfig, HostDetails, StepConfig};

/// Name the container lifecycle plan is registered under.
pub const CONTAINER_PLAN: &str = "docker";

fn step(name: &str, forward: &str, undo: Option<&str>, critical: bool) -> StepConfig {
    StepConfig {
        name: name.to_string(),
        forward: forward.to_string(),
        undo: undo.map(str::to_string),
        critical,
        ..Default::default()
    }
}

/// Replace a running container with a freshly pulled image.
///
/// The old container is renamed to `<container>-previous` instead of being
/// deleted, so a failed start can put it back. Expects the `account`,
/// `image`, `tag`, `container` and `ports` variables.
pub fn container_lifecycle() -> Vec<StepConfig> {
    vec![
        step(
            "stop",
            "docker stop ${container}",
            Some("docker start ${container}"),
            false,
        ),
        step(
            "remove",
            "docker rm -f ${container}-previous >/dev/null 2>&1; docker rename ${container} ${container}-previous",
            Some("docker rename ${container}-previous ${container}"),
            false,
        ),
        step("pull", "docker pull ${account}/${image}:${tag}", None, true),
        step(
            "start",
            "docker run -p ${ports} -d --name ${container} ${account}/${image}:${tag}",
            Some("docker rm -f ${container}"),
            true,
        ),
    ]
}

/// Variables the container lifecycle plan needs.
pub fn container_vars(image: &str, account: &str, ports: &str) -> HashMap<String, String> {
    [
        ("image", image),
        ("account", account),
        ("tag", "latest"),
        ("container", image),
        ("ports", ports),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// A complete starter deployment with one placeholder host.
pub fn starter_config(app_name: &str, image: &str, account: &str, ports: &str) -> DeployConfig {
    let mut hosts = BTreeMap::new();
    hosts.insert(
        "web1".to_string(),
        HostConfig::Detailed(HostDetails {
            address: Some("web1.example.com".to_string()),
            plan: Some(CONTAINER_PLAN.to_string()),
            ..Default::default()
        }),
    );

    DeployConfig {
        app_name: Some(app_name.to_string()),
        vars: container_vars(image, account, ports),
        plans: BTreeMap::from([(CONTAINER_PLAN.to_string(), container_lifecycle())]),
        hosts,
        ..Default::default()
    }
}
