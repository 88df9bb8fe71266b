//! Deployment file discovery and loading.
//!
//! A project keeps its deployment in `convoy.yml` (or `convoy.yaml`) at the
//! project root. An optional `convoy.local.yml` beside it is deep-merged on
//! top and is meant to stay out of version control.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::merger::merge_configs;
use crate::config::schema::DeployConfig;
use crate::error::{ConvoyError, Result};

/// Name of the primary deployment file.
pub const CONFIG_FILE: &str = "convoy.yml";

/// Accepted alternate spelling.
const CONFIG_FILE_ALT: &str = "convoy.yaml";

/// Name of the local overlay.
pub const LOCAL_CONFIG_FILE: &str = "convoy.local.yml";

/// Deployment files found for a project, in merge order.
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    /// `convoy.yml` or `convoy.yaml`
    pub project: Option<PathBuf>,

    /// `convoy.local.yml`
    pub project_local: Option<PathBuf>,
}

impl ConfigPaths {
    /// Discover deployment files in `project_root`.
    pub fn discover(project_root: &Path) -> Self {
        let project = [CONFIG_FILE, CONFIG_FILE_ALT]
            .iter()
            .map(|name| project_root.join(name))
            .find(|path| path.is_file());
        let local = project_root.join(LOCAL_CONFIG_FILE);

        Self {
            project,
            project_local: local.is_file().then_some(local),
        }
    }

    /// Existing files, lowest priority first.
    pub fn all_existing(&self) -> Vec<&PathBuf> {
        self.project.iter().chain(self.project_local.iter()).collect()
    }

    pub fn has_project_config(&self) -> bool {
        self.project.is_some()
    }
}

/// Walk up from `start` looking for a directory holding `convoy.yml`.
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(CONFIG_FILE).is_file() || dir.join(CONFIG_FILE_ALT).is_file())
        .map(Path::to_path_buf)
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConvoyError::ConfigNotFound {
                path: path.to_path_buf(),
            }
        } else {
            ConvoyError::Io(e)
        }
    })
}

/// Load and parse a single deployment file.
///
/// # Errors
///
/// Returns `ConfigNotFound` if the file doesn't exist and
/// `ConfigParseError` if it isn't a valid deployment file.
pub fn load_config_file(path: &Path) -> Result<DeployConfig> {
    parse_config(&read(path)?, path)
}

/// Parse YAML content into a [`DeployConfig`].
///
/// `source_path` is only used for error reporting.
pub fn parse_config(content: &str, source_path: &Path) -> Result<DeployConfig> {
    if content.trim().is_empty() {
        return Ok(DeployConfig::default());
    }
    serde_yaml::from_str(content).map_err(|e| ConvoyError::ConfigParseError {
        path: source_path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Load a file as a raw YAML value, ready for merging.
pub fn load_config_value(path: &Path) -> Result<serde_yaml::Value> {
    let content = read(path)?;
    if content.trim().is_empty() {
        return Ok(serde_yaml::Value::Mapping(Default::default()));
    }
    serde_yaml::from_str(&content).map_err(|e| ConvoyError::ConfigParseError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Load `convoy.yml` with `convoy.local.yml` merged on top.
///
/// # Errors
///
/// Returns `ConfigNotFound` if the project has no `convoy.yml`.
pub fn load_merged_config(project_root: &Path) -> Result<DeployConfig> {
    let paths = ConfigPaths::discover(project_root);
    let Some(primary) = paths.project.clone() else {
        return Err(ConvoyError::ConfigNotFound {
            path: project_root.join(CONFIG_FILE),
        });
    };

    let layers = paths
        .all_existing()
        .into_iter()
        .map(|path| load_config_value(path))
        .collect::<Result<Vec<_>>>()?;

    serde_yaml::from_value(merge_configs(&layers)).map_err(|e| ConvoyError::ConfigParseError {
        path: primary,
        message: format!("Failed to parse merged config: {}", e),
    })
}

/// Load the deployment for a project.
///
/// An explicit `config_override` is loaded on its own with no overlay.
pub fn load_config(project_root: &Path, config_override: Option<&Path>) -> Result<DeployConfig> {
    match config_override {
        Some(path) => load_config_file(path),
        None => load_merged_config(project_root),
    }
}
