//! CLI command implementations.
//!
//! Each command implements the [`Command`] trait, which provides a uniform
//! interface for executing commands and reporting results.
//!
//! # Architecture
//!
//! Commands are dispatched via [`CommandDispatcher`], which routes CLI
//! subcommands to their implementations. This allows:
//! - Single binary with subcommands (`convoy run`, `convoy plan`)
//! - Shared config loading through [`project::Project`]
//! - Consistent global flag handling

pub mod check;
pub mod dispatcher;
pub mod history;
pub mod init;
pub mod last;
pub mod plan;
pub mod project;
pub mod run;

pub use dispatcher::{Command, CommandDispatcher, CommandResult};
