//! Shared setup for commands that read the deployment file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::config::{load_config, validate, DeployConfig, Settings, Transport};
use crate::error::{ConvoyError, Result};
use crate::history::RunStore;
use crate::remote::{LocalExecutor, RemoteExecutor, SshExecutor};

/// Where a command finds its deployment file.
#[derive(Debug, Clone)]
pub struct Project {
    root: PathBuf,
    config_override: Option<PathBuf>,
}

impl Project {
    pub fn new(root: &Path, config_override: Option<&Path>) -> Self {
        Self {
            root: root.to_path_buf(),
            config_override: config_override.map(Path::to_path_buf),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Load the deployment file without validating it.
    pub fn load(&self) -> Result<DeployConfig> {
        load_config(&self.root, self.config_override.as_deref())
    }

    /// Load the deployment file and reject it if validation fails.
    pub fn load_valid(&self) -> Result<DeployConfig> {
        let config = self.load()?;
        validate(&config)?;
        Ok(config)
    }

    /// Run history as configured by `settings`.
    ///
    /// A relative `history_dir` is taken from the project root.
    pub fn history_store(&self, settings: &Settings) -> Result<RunStore> {
        Ok(match &settings.history_dir {
            Some(dir) if dir.is_relative() => RunStore::new(self.root.join(dir)),
            Some(dir) => RunStore::new(dir.clone()),
            None => RunStore::new(RunStore::default_dir()?),
        })
    }

    /// Run history for commands that also work outside a project.
    pub fn history_store_or_default(&self) -> Result<RunStore> {
        match self.load() {
            Ok(config) => self.history_store(&config.settings),
            Err(ConvoyError::ConfigNotFound { .. }) => Ok(RunStore::new(RunStore::default_dir()?)),
            Err(e) => Err(e),
        }
    }
}

/// Parse `KEY=VALUE` overrides given on the command line.
pub fn parse_vars(vars: &[String]) -> Result<HashMap<String, String>> {
    vars.iter()
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                Ok((key.trim().to_string(), value.to_string()))
            }
            _ => Err(ConvoyError::ConfigValidationError {
                message: format!("Invalid --var '{}': expected KEY=VALUE", pair),
            }),
        })
        .collect()
}

/// The executor matching the configured transport.
pub fn executor_for(settings: &Settings) -> Box<dyn RemoteExecutor> {
    match settings.transport {
        Transport::Ssh => Box::new(SshExecutor::new(
            settings.ssh.clone(),
            settings.connect_timeout(),
        )),
        Transport::Local => Box::new(LocalExecutor::new()),
    }
}
