//! Resource handlers
//!
//! One [`ResourceHandler`] per managed resource instance. A handler knows how
//! to find its identifier ([`Locator`]), check that it exists, create the
//! resource during deploy, and take it apart during teardown: list its
//! children, delete them (recursing into nested children), then delete the
//! resource itself. Ordering across handlers is the orchestrator's job.

mod bucket;
mod catalog;
mod function;
mod gateway;
mod identity_pool;
mod knowledge_base;
mod memory;
mod role;
mod runtime;

pub use bucket::StorageBucketHandler;
pub use catalog::{Catalog, build_catalog};
pub use function::FunctionHandler;
pub use gateway::GatewayHandler;
pub use identity_pool::IdentityPoolHandler;
pub use knowledge_base::KnowledgeBaseHandler;
pub use memory::MemoryHandler;
pub use role::RoleHandler;
pub use runtime::RuntimeHandler;

use agentcore_deploy_common::{ChildKind, RegistryKey, ResourceKind};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// A dependent resource that must go before its parent.
///
/// The parent identifier travels with the child so the child can be deleted
/// without resolving the parent again.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Child {
    pub kind: ChildKind,
    pub parent: String,
    pub id: String,
}

impl Child {
    pub fn new(kind: ChildKind, parent: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind,
            parent: parent.into(),
            id: id.into(),
        }
    }
}

impl std::fmt::Display for Child {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} (of {})", self.kind, self.id, self.parent)
    }
}

/// How a handler finds its resource identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// Stored in the registry under this key
    Registry(RegistryKey),
    /// Deterministic name, checked with `exists`
    Derived(String),
}

/// Result of a successful create
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provisioned {
    pub id: String,
    /// Extra registry values produced alongside the identifier
    pub outputs: Vec<(RegistryKey, String)>,
}

impl Provisioned {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            outputs: Vec::new(),
        }
    }

    pub fn with_output(mut self, key: RegistryKey, value: impl Into<String>) -> Self {
        self.outputs.push((key, value.into()));
        self
    }
}

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("{handler} requires {key}, which no earlier step produced")]
    MissingOutput { handler: String, key: String },

    #[error("{0} is not created by deploy")]
    NotDeployable(String),

    #[error("{handler} cannot delete child {child}")]
    UnsupportedChild { handler: String, child: Child },

    #[error("{failed} of {total} child deletes failed; first error: {first}")]
    ChildDeletes {
        failed: usize,
        total: usize,
        first: String,
    },
}

/// Values produced by earlier deploy steps, keyed by logical registry name.
///
/// Identifiers that were reused rather than created are recorded too, so a
/// later step sees the same view either way.
///
/// A step also claims each identifier the moment the vendor allocates it,
/// before any readiness wait or follow-up call. The orchestrator stores
/// claims even when the step fails, so teardown can still find what a
/// half-finished create left behind.
#[derive(Debug, Default)]
pub struct DeployContext {
    outputs: BTreeMap<String, String>,
    claims: Mutex<Vec<(RegistryKey, String)>>,
    cancel: CancellationToken,
}

impl DeployContext {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            outputs: BTreeMap::new(),
            claims: Mutex::default(),
            cancel,
        }
    }

    pub fn cancel(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn record(&mut self, key: &RegistryKey, value: impl Into<String>) {
        self.outputs.insert(key.name().to_string(), value.into());
    }

    pub fn get(&self, key: &RegistryKey) -> Option<&str> {
        self.outputs.get(key.name()).map(String::as_str)
    }

    /// Look up a value an earlier step must have produced
    pub fn require(&self, handler: &str, key: &RegistryKey) -> Result<&str, HandlerError> {
        self.get(key).ok_or_else(|| HandlerError::MissingOutput {
            handler: handler.to_string(),
            key: key.name().to_string(),
        })
    }

    /// Note a freshly allocated identifier under its registry key
    pub fn claim(&self, key: &RegistryKey, id: impl Into<String>) {
        self.claims
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((key.clone(), id.into()));
    }

    /// Claims made since the last call, oldest first
    pub fn take_claims(&mut self) -> Vec<(RegistryKey, String)> {
        std::mem::take(self.claims.get_mut().unwrap_or_else(PoisonError::into_inner))
    }
}

/// A single managed resource instance.
///
/// Implementations must treat a not-found response from `delete`,
/// `delete_child` and the listing methods as success, returning an empty
/// list where appropriate. Every other vendor error is returned; the
/// orchestrator decides whether it is fatal.
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    /// Display name, unique within a catalog
    fn name(&self) -> &str;

    fn kind(&self) -> ResourceKind;

    fn locator(&self) -> &Locator;

    /// Registry keys written alongside the identifier, purged with it
    fn auxiliary_keys(&self) -> Vec<RegistryKey> {
        Vec::new()
    }

    /// Whether the deploy plan includes this handler
    fn deployable(&self) -> bool {
        true
    }

    /// Whether the resource exists. Lookup failures read as absent.
    async fn exists(&self, id: &str) -> bool;

    async fn create(&self, _ctx: &DeployContext) -> Result<Provisioned> {
        Err(HandlerError::NotDeployable(self.name().to_string()).into())
    }

    async fn delete(&self, id: &str) -> Result<()>;

    async fn list_children(&self, _id: &str) -> Result<Vec<Child>> {
        Ok(Vec::new())
    }

    /// Children of a child, deleted before it
    async fn list_nested(&self, _child: &Child) -> Result<Vec<Child>> {
        Ok(Vec::new())
    }

    async fn delete_child(&self, child: &Child) -> Result<()> {
        Err(HandlerError::UnsupportedChild {
            handler: self.name().to_string(),
            child: child.clone(),
        }
        .into())
    }

    /// How many children of this kind one `delete_children` call takes
    fn batch_size(&self, _kind: ChildKind) -> usize {
        1
    }

    /// Delete a batch of children of the same kind.
    ///
    /// Every child is attempted even after a failure.
    async fn delete_children(&self, children: &[Child]) -> Result<()> {
        let mut failed = 0;
        let mut first = None;
        for child in children {
            if let Err(e) = self.delete_child(child).await {
                warn!(handler = %self.name(), child = %child, error = ?e, "Failed to delete child");
                failed += 1;
                first.get_or_insert_with(|| format!("{e:#}"));
            }
        }
        match first {
            None => Ok(()),
            Some(first) => Err(HandlerError::ChildDeletes {
                failed,
                total: children.len(),
                first,
            }
            .into()),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::config::DeployConfig;
    use agentcore_deploy_common::EnvFile;
    use std::sync::Arc;

    const DEPLOY_ENV: &str = r#"
DEMO_ADMIN_PHONE=+5511999990001
DEMO_PROFESSOR_PHONE=+5511999990002
DEMO_STUDENT_PHONE=+5511999990003
AGENT_CONTAINER_URI=123456789012.dkr.ecr.us-east-1.amazonaws.com/agent:latest
KB_ROLE_ARN=arn:aws:iam::123456789012:role/kb
KB_COLLECTION_ARN=arn:aws:aoss:us-east-1:123456789012:collection/abc
"#;

    /// Default project, with everything deploy needs
    pub fn deploy_config() -> Arc<DeployConfig> {
        Arc::new(DeployConfig::for_deploy(&EnvFile::parse(DEPLOY_ENV).unwrap()).unwrap())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentcore_deploy_common::ParameterLayout;

    #[test]
    fn context_records_by_logical_name() {
        let layout = ParameterLayout::new("octank");
        let mut ctx = DeployContext::default();
        ctx.record(&layout.gateway_url(), "https://gw.example");

        assert_eq!(ctx.get(&layout.gateway_url()), Some("https://gw.example"));
        assert!(matches!(
            ctx.require("Runtime", &layout.memory_id()),
            Err(HandlerError::MissingOutput { key, .. }) if key == "memory_id"
        ));
    }

    #[test]
    fn claims_drain_in_order() {
        let layout = ParameterLayout::new("octank");
        let mut ctx = DeployContext::default();
        ctx.claim(&layout.gateway_user_pool_id(), "us-east-1_POOL");
        ctx.claim(&layout.gateway_id(), "gw-1");

        let claims = ctx.take_claims();
        let names: Vec<_> = claims.iter().map(|(k, v)| (k.name(), v.as_str())).collect();
        assert_eq!(names, [("gateway_user_pool_id", "us-east-1_POOL"), ("gateway_id", "gw-1")]);
        assert!(ctx.take_claims().is_empty());
        assert_eq!(ctx.get(&layout.gateway_id()), None);
    }

    #[test]
    fn child_display_names_parent() {
        let child = Child::new(ChildKind::GatewayTarget, "gw-123", "t-1");
        assert_eq!(child.to_string(), "gateway_target t-1 (of gw-123)");
    }
}
