//! Registry parameter layout
//!
//! Every identifier the deployer writes lives under
//! `/app/<project>/agentcore/<field>`. Earlier deployments of the default
//! project used a handful of other paths; those are kept as legacy paths so
//! lookups still find them and cleanup still purges them.

use crate::defaults::DEFAULT_PROJECT;

/// Logical key names
pub mod keys {
    pub const KNOWLEDGE_BASE_ID: &str = "knowledge_base_id";
    pub const MEMORY_ID: &str = "memory_id";
    pub const GATEWAY_ID: &str = "gateway_id";
    pub const GATEWAY_URL: &str = "gateway_url";
    pub const GATEWAY_USER_POOL_ID: &str = "gateway_user_pool_id";
    pub const CLIENT_ID: &str = "client_id";
    pub const CLIENT_SECRET: &str = "client_secret";
    pub const SCOPE: &str = "scope";
    pub const RUNTIME_ARN: &str = "runtime_arn";
    pub const RUNTIME_ID: &str = "runtime_id";
    pub const END_USER_POOL_ID: &str = "end_user_pool_id";
    pub const END_USER_POOL_DOMAIN: &str = "end_user_pool_domain";
}

/// A logical registry key with its parameter paths.
///
/// The first path is canonical and is the only one ever written. The rest
/// are legacy paths, tried in order on lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryKey {
    name: String,
    paths: Vec<String>,
}

impl RegistryKey {
    pub fn new(name: impl Into<String>, canonical: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            paths: vec![canonical.into()],
        }
    }

    /// Append a legacy path
    pub fn with_legacy(mut self, path: impl Into<String>) -> Self {
        self.paths.push(path.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn canonical(&self) -> &str {
        &self.paths[0]
    }

    /// All paths, canonical first
    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    pub fn legacy(&self) -> &[String] {
        &self.paths[1..]
    }
}

/// Builds the registry keys for one project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterLayout {
    project: String,
}

impl ParameterLayout {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
        }
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    /// `/app/<project>/<component>/<field>`
    pub fn path(&self, component: &str, field: &str) -> String {
        format!("/app/{}/{}/{}", self.project, component, field)
    }

    fn key(&self, name: &str) -> RegistryKey {
        RegistryKey::new(name, self.path("agentcore", name))
    }

    /// Legacy paths only belong to the default project.
    fn legacy_enabled(&self) -> bool {
        self.project == DEFAULT_PROJECT
    }

    fn with_legacy(&self, key: RegistryKey, legacy: &[&str]) -> RegistryKey {
        if !self.legacy_enabled() {
            return key;
        }
        legacy
            .iter()
            .fold(key, |key, path| key.with_legacy(*path))
    }

    pub fn knowledge_base_id(&self) -> RegistryKey {
        self.with_legacy(
            self.key(keys::KNOWLEDGE_BASE_ID),
            &["/app/octank_assistant/agentcore/kb_id"],
        )
    }

    pub fn memory_id(&self) -> RegistryKey {
        self.with_legacy(
            self.key(keys::MEMORY_ID),
            &[
                "/app/octankedu/agentcore/memory_id",
                "/app/octank_edu_multi_agent/memory_id",
            ],
        )
    }

    pub fn gateway_id(&self) -> RegistryKey {
        self.with_legacy(
            self.key(keys::GATEWAY_ID),
            &["/app/octank/agentcore/gatewayID"],
        )
    }

    pub fn gateway_url(&self) -> RegistryKey {
        self.with_legacy(
            self.key(keys::GATEWAY_URL),
            &["/app/octank/agentcore/gatewayURL"],
        )
    }

    /// The authorizer pool. Earlier deployments kept it at the bare
    /// `user_pool_id` path.
    pub fn gateway_user_pool_id(&self) -> RegistryKey {
        self.with_legacy(
            self.key(keys::GATEWAY_USER_POOL_ID),
            &["/app/octank/agentcore/user_pool_id"],
        )
    }

    pub fn client_id(&self) -> RegistryKey {
        self.key(keys::CLIENT_ID)
    }

    pub fn client_secret(&self) -> RegistryKey {
        self.key(keys::CLIENT_SECRET)
    }

    pub fn scope(&self) -> RegistryKey {
        self.key(keys::SCOPE)
    }

    pub fn runtime_arn(&self) -> RegistryKey {
        self.key(keys::RUNTIME_ARN)
    }

    pub fn runtime_id(&self) -> RegistryKey {
        self.key(keys::RUNTIME_ID)
    }

    /// The pool holding persona groups and demo users. No legacy path.
    pub fn end_user_pool_id(&self) -> RegistryKey {
        self.key(keys::END_USER_POOL_ID)
    }

    /// Hosted UI domain prefix of the end-user pool
    pub fn end_user_pool_domain(&self) -> RegistryKey {
        self.key(keys::END_USER_POOL_DOMAIN)
    }

    /// Key holding the ARN of a deployed function
    pub fn function(&self, function_name: &str) -> RegistryKey {
        self.key(&format!("function_{function_name}"))
    }
}
