//! Run history.
//!
//! Finished [`DeploymentRun`](crate::runner::DeploymentRun) reports are kept
//! as JSON files so `convoy last` can show them and `convoy run
//! --rerun-failed` can pick up the hosts that did not succeed.

pub mod store;

pub use store::RunStore;
