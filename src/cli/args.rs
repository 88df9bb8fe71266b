//! CLI argument definitions.
//!
//! This module defines all CLI arguments using clap's derive macros.
//! The main entry point is the [`Cli`] struct.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// convoy - Sequential remote deployments with per-host rollback.
#[derive(Debug, Parser)]
#[command(name = "convoy")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to deployment file (overrides convoy.yml + convoy.local.yml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to project root (overrides current directory)
    #[arg(short, long, global = true)]
    pub project: Option<PathBuf>,

    /// Show remote command output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Print errors only; rely on the exit code
    #[arg(long, global = true)]
    pub silent: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Deploy to every host (default if no command specified)
    Run(RunArgs),

    /// Show the resolved commands for each host without running them
    Plan(PlanArgs),

    /// Validate the deployment file and optionally test connectivity
    Check(CheckArgs),

    /// Show the most recent run report
    Last(LastArgs),

    /// List recorded runs
    History(HistoryArgs),

    /// Write a starter convoy.yml
    Init(InitArgs),
}

/// Arguments for the `run` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct RunArgs {
    /// Deploy only these hosts (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub hosts: Vec<String>,

    /// Override a variable (KEY=VALUE, repeatable)
    #[arg(long = "var", value_name = "KEY=VALUE")]
    pub vars: Vec<String>,

    /// Resolve and record every step without executing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,

    /// Deploy only the hosts that did not succeed in the last run
    #[arg(long)]
    pub rerun_failed: bool,

    /// Don't record this run in history
    #[arg(long)]
    pub no_history: bool,

    /// Maximum hosts deployed at once (overrides settings.max_parallel)
    #[arg(long, value_name = "N")]
    pub max_parallel: Option<usize>,

    /// Retries for failed idempotent steps (overrides settings.retries)
    #[arg(long, value_name = "N")]
    pub retries: Option<u32>,
}

/// Arguments for the `plan` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct PlanArgs {
    /// Show only these hosts (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub hosts: Vec<String>,

    /// Override a variable (KEY=VALUE, repeatable)
    #[arg(long = "var", value_name = "KEY=VALUE")]
    pub vars: Vec<String>,
}

/// Arguments for the `check` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct CheckArgs {
    /// Also try to reach every host
    #[arg(long)]
    pub connect: bool,
}

/// Arguments for the `last` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct LastArgs {
    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `history` command.
#[derive(Debug, Clone, clap::Args)]
pub struct HistoryArgs {
    /// Number of runs to show
    #[arg(short = 'n', long, default_value_t = 10)]
    pub limit: usize,
}

impl Default for HistoryArgs {
    fn default() -> Self {
        Self { limit: 10 }
    }
}

/// Arguments for the `init` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct InitArgs {
    /// Image to deploy (defaults to the project directory name)
    #[arg(long)]
    pub image: Option<String>,

    /// Registry account the image lives under
    #[arg(long, default_value = "library")]
    pub account: String,

    /// Port mapping passed to `docker run -p`
    #[arg(long, default_value = "80:80")]
    pub ports: String,

    /// Overwrite an existing convoy.yml
    #[arg(long)]
    pub force: bool,
}
