//! agentcore-deploy-common - Shared types and utilities
//!
//! This crate provides the pieces shared by the deployer and its test
//! helpers, without any AWS SDK dependencies to keep it lightweight.
//!
//! ## Modules
//!
//! - [`defaults`]: Default configuration values and resource naming
//! - [`env_file`]: dotenv-style configuration file parsing
//! - [`error`]: Configuration errors
//! - [`params`]: Registry parameter layout (canonical and legacy paths)
//! - [`resource_kind`]: Resource types and their deploy/teardown ordering

pub mod defaults;
pub mod env_file;
pub mod error;
pub mod params;
pub mod resource_kind;

// Re-export commonly used types
pub use env_file::EnvFile;
pub use error::ConfigError;
pub use params::{ParameterLayout, RegistryKey};
pub use resource_kind::{ChildKind, ResourceKind};
