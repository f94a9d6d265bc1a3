//! Key-value backends for the registry

use anyhow::Result;
use async_trait::async_trait;

/// A flat string key-value store addressed by parameter path.
///
/// Implementations map "not found" to `Ok(None)`; any other failure is an
/// error and the [`Registry`](super::Registry) decides what to do with it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ParameterStore: Send + Sync {
    async fn get(&self, path: &str) -> Result<Option<String>>;

    /// Store a value, overwriting any existing one
    async fn put(&self, path: &str, value: &str) -> Result<()>;

    /// Remove a value. Removing an absent path succeeds.
    async fn delete(&self, path: &str) -> Result<()>;
}
