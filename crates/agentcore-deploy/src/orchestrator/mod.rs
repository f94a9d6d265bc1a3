//! Resource lifecycle orchestration
//!
//! Runs a catalog of [`ResourceHandler`](crate::handler::ResourceHandler)s
//! as an ordered plan:
//!
//! - [`teardown`]: dependents first, best-effort, then purge the registry
//! - [`deploy`]: dependencies first, fail-fast, get-or-create
//! - [`status`]: read-only view of what the registry records

mod deploy;
mod plan;
mod report;
mod status;
mod teardown;

pub use deploy::{DeployFailure, deploy};
pub use plan::{Plan, owned_keys, resolve};
pub use report::{Deployment, Mode, Report, StatusEntry, StepOutcome, StepReport, status_table};
pub use status::{preview, status};
pub use teardown::{REGISTRY_STEP, TeardownOptions, teardown};
