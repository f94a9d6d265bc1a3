//! Shared test utilities for agentcore-deploy
//!
//! ## Modules
//!
//! - [`aws`]: AWS region detection and unique names for live tests
//! - [`env`]: Temporary configuration files

pub mod aws;
pub mod env;

pub use aws::{get_test_region, test_project, test_run_id};
pub use env::EnvFixture;
