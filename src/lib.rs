//! convoy - Sequential remote deployments with per-host rollback.
//!
//! convoy runs an ordered list of shell steps on every target host. Hosts
//! are deployed independently on a bounded pool of workers; when a step
//! fails on one host, the steps that already succeeded there are undone in
//! reverse order while the other hosts carry on.
//!
//! # Modules
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`config`] - Loading, merging and validating `convoy.yml`
//! - [`error`] - Error types and result aliases
//! - [`history`] - Run reports kept on disk
//! - [`plan`] - Binding steps and variables to hosts
//! - [`remote`] - Running commands on hosts
//! - [`runner`] - The orchestrator and its run reports
//! - [`steps`] - Command templates, steps and step results
//! - [`ui`] - Terminal output
//!
//! # Example
//!
//! ```
//! use convoy::plan::HostPlan;
//! use convoy::remote::{Host, MockExecutor, MockResponse};
//! use convoy::runner::{HostState, Orchestrator, RunOptions};
//! use convoy::steps::{CommandTemplate, Step};
//!
//! let steps = vec![
//!     Step::parse("stop", "docker stop app")
//!         .unwrap()
//!         .with_undo(CommandTemplate::parse("docker start app").unwrap()),
//!     Step::parse("pull", "docker pull acme/app:latest")
//!         .unwrap()
//!         .critical(true),
//! ];
//! let plans = vec![
//!     HostPlan::new(Host::new("web1"), steps.clone()),
//!     HostPlan::new(Host::new("web2"), steps),
//! ];
//!
//! let exec = MockExecutor::new();
//! exec.respond(Some("web2"), "docker pull", MockResponse::exit(1));
//!
//! let run = Orchestrator::new(&exec, RunOptions::default()).run(&plans).unwrap();
//! assert_eq!(run.host("web1").unwrap().state, HostState::Succeeded);
//! assert_eq!(run.host("web2").unwrap().state, HostState::RolledBack);
//! assert_eq!(exec.calls_for("web2").last().unwrap(), "docker start app");
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod history;
pub mod plan;
pub mod remote;
pub mod runner;
pub mod steps;
pub mod ui;

pub use error::{ConvoyError, Result};
