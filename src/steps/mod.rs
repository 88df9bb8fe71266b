//! Deployment steps.
//!
//! This module provides the building blocks a host plan is made of:
//!
//! - [`CommandTemplate`] - A command with named `${placeholders}`
//! - [`Step`] - A forward action with a declared undo action
//! - [`StepResult`] - What one action did on one host
//!
//! # Example
//!
//! ```
//! use convoy::remote::{Host, MockExecutor};
//! use convoy::steps::{CommandTemplate, Step, StepStatus, TemplateContext};
//!
//! let step = Step::parse("stop", "docker stop ${name}")
//!     .unwrap()
//!     .with_undo(CommandTemplate::parse("docker start ${name}").unwrap());
//!
//! let mut ctx = TemplateContext::new("web1");
//! ctx.vars.insert("name".to_string(), "app".to_string());
//!
//! let exec = MockExecutor::new();
//! let result = step.run(&exec, &Host::new("web1"), &ctx, None);
//! assert_eq!(result.status, StepStatus::Succeeded);
//! assert_eq!(result.command, "docker stop app");
//! ```

pub mod result;
pub mod step;
pub mod template;

pub use result::{format_duration, Phase, StepResult, StepStatus};
pub use step::Step;
pub use template::{shell_quote, CommandTemplate, Segment, TemplateContext};
