//! Deployment orchestration.
//!
//! The [`Orchestrator`] takes one [`HostPlan`](crate::plan::HostPlan) per
//! host, runs them on a bounded pool of worker threads and returns a
//! [`DeploymentRun`] once every host has reached a terminal state.

pub mod cancel;
mod host;
pub mod orchestrator;
pub mod report;

pub use cancel::CancellationToken;
pub use orchestrator::{Orchestrator, RunOptions, RunProgress};
pub use report::{
    DeploymentRun, FailureKind, HostFailure, HostReport, HostState, RunId, RunOutcome,
};
