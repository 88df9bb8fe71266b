//! Deployment file loading, parsing, and validation.
//!
//! - Schema definitions in [`schema`]
//! - File discovery and loading in [`loader`]
//! - Deep merging in [`merger`]
//! - Validation in [`validator`]
//! - Built-in step plans in [`presets`]
//!
//! # Example
//!
//! ```
//! use convoy::config::{load_merged_config, validate};
//! use tempfile::TempDir;
//! use std::fs;
//!
//! let temp = TempDir::new().unwrap();
//! fs::write(
//!     temp.path().join("convoy.yml"),
//!     "hosts:\n  web1:\n    - name: ping\n      forward: uptime\n",
//! )
//! .unwrap();
//!
//! let config = load_merged_config(temp.path()).unwrap();
//! validate(&config).unwrap();
//! assert_eq!(config.hosts.len(), 1);
//! ```
//!
//! # File Locations
//!
//! 1. Project deployment (`convoy.yml` or `convoy.yaml`)
//! 2. Local overrides (`convoy.local.yml`), merged on top

pub mod loader;
pub mod merger;
pub mod presets;
pub mod schema;
pub mod validator;

pub use loader::{
    find_project_root, load_config, load_config_file, load_config_value, load_merged_config,
    parse_config, ConfigPaths, CONFIG_FILE, LOCAL_CONFIG_FILE,
};
pub use merger::{deep_merge, merge_configs};
pub use presets::{container_lifecycle, container_vars, starter_config, CONTAINER_PLAN};
pub use schema::{DeployConfig, HostConfig, HostDetails, Settings, StepConfig, Transport};
pub use validator::{validate, validate_config, ValidationError};
