//! Managed resource types and their ordering
//!
//! Teardown removes dependents before their dependencies; deploy creates
//! dependencies first. Both orders are expressed as priorities so every
//! plan sorts the same way.

use serde::Serialize;
use std::fmt;

/// Types of resources managed by agentcore-deploy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Agent runtime (uses the gateway, memory and knowledge base)
    Runtime,
    /// Gateway with its targets (targets invoke functions)
    Gateway,
    /// Serverless function with its execution role
    Function,
    /// User pool with its clients, resource servers and domain
    IdentityPool,
    /// Standalone IAM role
    Role,
    /// Knowledge base with its data sources (data sources read the bucket)
    KnowledgeBase,
    /// Storage bucket holding the knowledge base documents
    StorageBucket,
    /// Agent memory
    Memory,
    /// Registry parameters written by every other step
    RegistryEntries,
}

impl ResourceKind {
    /// Every kind in teardown order.
    pub const TEARDOWN_ORDER: [ResourceKind; 9] = [
        ResourceKind::Runtime,
        ResourceKind::Gateway,
        ResourceKind::Function,
        ResourceKind::IdentityPool,
        ResourceKind::Role,
        ResourceKind::KnowledgeBase,
        ResourceKind::StorageBucket,
        ResourceKind::Memory,
        ResourceKind::RegistryEntries,
    ];

    /// Deployable kinds in provisioning order.
    pub const DEPLOY_ORDER: [ResourceKind; 6] = [
        ResourceKind::KnowledgeBase,
        ResourceKind::Memory,
        ResourceKind::Gateway,
        ResourceKind::Runtime,
        ResourceKind::IdentityPool,
        ResourceKind::Function,
    ];

    /// Get teardown priority (lower number = delete first)
    ///
    /// - 0: Runtime (nothing depends on it)
    /// - 1: Gateway, targets first
    /// - 2: Functions, execution roles first
    /// - 3: Identity pools, clients and domain first
    /// - 4: Standalone roles, policies first
    /// - 5: Knowledge base, data sources first
    /// - 6: Storage bucket, objects first (data sources must be gone)
    /// - 7: Memory
    /// - 8: Registry entries (read by every step above)
    pub fn teardown_priority(self) -> u8 {
        match self {
            ResourceKind::Runtime => 0,
            ResourceKind::Gateway => 1,
            ResourceKind::Function => 2,
            ResourceKind::IdentityPool => 3,
            ResourceKind::Role => 4,
            ResourceKind::KnowledgeBase => 5,
            ResourceKind::StorageBucket => 6,
            ResourceKind::Memory => 7,
            ResourceKind::RegistryEntries => 8,
        }
    }

    /// Get deploy priority (lower number = create first)
    ///
    /// Returns `None` for kinds that are only created as a side effect of
    /// another step (roles, the bucket) or never created (registry entries).
    pub fn deploy_priority(self) -> Option<u8> {
        match self {
            ResourceKind::KnowledgeBase => Some(0),
            ResourceKind::Memory => Some(1),
            ResourceKind::Gateway => Some(2),
            ResourceKind::Runtime => Some(3),
            ResourceKind::IdentityPool => Some(4),
            ResourceKind::Function => Some(5),
            ResourceKind::Role | ResourceKind::StorageBucket | ResourceKind::RegistryEntries => {
                None
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Runtime => "runtime",
            ResourceKind::Gateway => "gateway",
            ResourceKind::Function => "function",
            ResourceKind::IdentityPool => "identity_pool",
            ResourceKind::Role => "role",
            ResourceKind::KnowledgeBase => "knowledge_base",
            ResourceKind::StorageBucket => "storage_bucket",
            ResourceKind::Memory => "memory",
            ResourceKind::RegistryEntries => "registry_entries",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kinds of child resources deleted before their parent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChildKind {
    /// Gateway target
    GatewayTarget,
    /// Knowledge base data source
    DataSource,
    /// User pool app client
    UserPoolClient,
    /// User pool resource server
    ResourceServer,
    /// Hosted domain assigned to a user pool
    UserPoolDomain,
    /// Execution role of a function (has nested policies)
    ExecutionRole,
    /// Managed policy attached to a role
    AttachedPolicy,
    /// Inline policy document of a role
    InlinePolicy,
    /// Object stored in a bucket
    BucketObject,
}

impl ChildKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChildKind::GatewayTarget => "gateway_target",
            ChildKind::DataSource => "data_source",
            ChildKind::UserPoolClient => "user_pool_client",
            ChildKind::ResourceServer => "resource_server",
            ChildKind::UserPoolDomain => "user_pool_domain",
            ChildKind::ExecutionRole => "execution_role",
            ChildKind::AttachedPolicy => "attached_policy",
            ChildKind::InlinePolicy => "inline_policy",
            ChildKind::BucketObject => "bucket_object",
        }
    }
}

impl fmt::Display for ChildKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_teardown_order_is_sorted_by_priority() {
        let priorities: Vec<u8> = ResourceKind::TEARDOWN_ORDER
            .iter()
            .map(|k| k.teardown_priority())
            .collect();
        let mut sorted = priorities.clone();
        sorted.sort_unstable();
        assert_eq!(priorities, sorted);
    }

    #[test]
    fn test_deploy_order_is_sorted_by_priority() {
        let priorities: Vec<u8> = ResourceKind::DEPLOY_ORDER
            .iter()
            .filter_map(|k| k.deploy_priority())
            .collect();
        assert_eq!(priorities, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_runtime_before_gateway_and_memory() {
        assert!(
            ResourceKind::Runtime.teardown_priority() < ResourceKind::Gateway.teardown_priority(),
            "Runtime must be removed before the gateway it calls"
        );
        assert!(
            ResourceKind::Runtime.teardown_priority() < ResourceKind::Memory.teardown_priority()
        );
    }

    #[test]
    fn test_knowledge_base_before_bucket() {
        assert!(
            ResourceKind::KnowledgeBase.teardown_priority()
                < ResourceKind::StorageBucket.teardown_priority(),
            "Data sources must be gone before the bucket they read"
        );
    }

    #[test]
    fn test_registry_entries_last() {
        let last = ResourceKind::TEARDOWN_ORDER.last().copied();
        assert_eq!(last, Some(ResourceKind::RegistryEntries));
        assert_eq!(ResourceKind::RegistryEntries.deploy_priority(), None);
    }

    #[test]
    fn test_dependencies_deployed_before_dependents() {
        let kb = ResourceKind::KnowledgeBase.deploy_priority();
        let memory = ResourceKind::Memory.deploy_priority();
        let runtime = ResourceKind::Runtime.deploy_priority();
        assert!(kb < memory);
        assert!(memory < runtime);
        assert!(ResourceKind::Gateway.deploy_priority() < runtime);
    }
}
