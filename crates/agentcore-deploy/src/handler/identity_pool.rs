//! Cognito user pools
//!
//! Two pools are tracked. The end-user pool is a deploy step of its own. The
//! gateway authorizer pool is created by the gateway step and only torn down
//! here.

use super::{Child, DeployContext, Locator, Provisioned, ResourceHandler};
use crate::aws::CognitoOperations;
use crate::aws::cognito::{DemoUser, PERSONA_GROUPS, default_domain_prefix};
use crate::config::{DemoPhones, DeployConfig};
use agentcore_deploy_common::defaults::{DEMO_USER_PASSWORD, user_pool_name};
use agentcore_deploy_common::{ChildKind, ParameterLayout, RegistryKey, ResourceKind};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PoolRole {
    EndUser,
    GatewayAuthorizer,
}

pub struct IdentityPoolHandler {
    cognito: Arc<dyn CognitoOperations>,
    config: Arc<DeployConfig>,
    layout: ParameterLayout,
    role: PoolRole,
    key: RegistryKey,
    locator: Locator,
}

impl IdentityPoolHandler {
    /// Pool holding the persona groups and demo users
    pub fn end_user(cognito: Arc<dyn CognitoOperations>, config: Arc<DeployConfig>) -> Self {
        let key = config.layout().end_user_pool_id();
        Self::build(cognito, config, PoolRole::EndUser, key)
    }

    /// Pool issuing tokens for gateway callers
    pub fn gateway_authorizer(cognito: Arc<dyn CognitoOperations>, config: Arc<DeployConfig>) -> Self {
        let key = config.layout().gateway_user_pool_id();
        Self::build(cognito, config, PoolRole::GatewayAuthorizer, key)
    }

    fn build(
        cognito: Arc<dyn CognitoOperations>,
        config: Arc<DeployConfig>,
        role: PoolRole,
        key: RegistryKey,
    ) -> Self {
        Self {
            layout: config.layout(),
            locator: Locator::Registry(key.clone()),
            cognito,
            config,
            role,
            key,
        }
    }
}

/// One demo user per persona
fn demo_users(project: &str, phones: &DemoPhones) -> Vec<DemoUser> {
    [
        ("admin", "administrator", "Admin", &phones.admin),
        ("professor", "professor", "Professor", &phones.professor),
        ("student", "student", "Student", &phones.student),
    ]
    .into_iter()
    .map(|(handle, persona, given_name, phone)| DemoUser {
        username: format!("{handle}_demo"),
        email: format!("{handle}@{project}.edu"),
        phone: phone.clone(),
        given_name: given_name.to_string(),
        family_name: "Demo".to_string(),
        persona: persona.to_string(),
    })
    .collect()
}

#[async_trait]
impl ResourceHandler for IdentityPoolHandler {
    fn name(&self) -> &str {
        match self.role {
            PoolRole::EndUser => "UserPool",
            PoolRole::GatewayAuthorizer => "GatewayUserPool",
        }
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::IdentityPool
    }

    fn locator(&self) -> &Locator {
        &self.locator
    }

    /// The domain is written last, so a pool without one is unfinished
    fn auxiliary_keys(&self) -> Vec<RegistryKey> {
        match self.role {
            PoolRole::EndUser => vec![self.layout.end_user_pool_domain()],
            PoolRole::GatewayAuthorizer => Vec::new(),
        }
    }

    fn deployable(&self) -> bool {
        self.role == PoolRole::EndUser
    }

    async fn exists(&self, id: &str) -> bool {
        self.cognito.user_pool_exists(id).await
    }

    /// Create the pool, or finish one an earlier run left behind. Groups and
    /// demo users tolerate already existing.
    async fn create(&self, ctx: &DeployContext) -> Result<Provisioned> {
        let inputs = self.config.inputs()?;
        let name = user_pool_name(&self.config.project);

        let pool_id = match self.cognito.find_user_pool(&name).await? {
            Some(id) => {
                info!(pool = %name, user_pool_id = %id, "Finishing existing user pool");
                id
            }
            None => self.cognito.create_end_user_pool(&name).await?,
        };
        ctx.claim(&self.key, &pool_id);

        let domain = match self.cognito.domain(&pool_id).await? {
            Some(domain) => domain,
            None => {
                let domain = self
                    .config
                    .user_pool_domain_prefix
                    .clone()
                    .unwrap_or_else(|| default_domain_prefix(&pool_id));
                self.cognito.create_domain(&pool_id, &domain).await?;
                domain
            }
        };

        self.cognito.create_groups(&pool_id, &PERSONA_GROUPS).await?;
        for user in demo_users(&self.config.project, &inputs.demo_phones) {
            self.cognito
                .create_demo_user(&pool_id, &user, DEMO_USER_PASSWORD)
                .await?;
        }

        Ok(Provisioned::new(pool_id).with_output(self.layout.end_user_pool_domain(), domain))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.cognito.delete_user_pool(id).await
    }

    /// Clients, then resource servers, then the domain if one is assigned
    async fn list_children(&self, id: &str) -> Result<Vec<Child>> {
        let clients = self.cognito.list_clients(id).await?;
        let servers = self.cognito.list_resource_servers(id).await?;
        let domain = self.cognito.domain(id).await?;

        Ok(clients
            .into_iter()
            .map(|c| Child::new(ChildKind::UserPoolClient, id, c))
            .chain(
                servers
                    .into_iter()
                    .map(|s| Child::new(ChildKind::ResourceServer, id, s)),
            )
            .chain(domain.map(|d| Child::new(ChildKind::UserPoolDomain, id, d)))
            .collect())
    }

    async fn delete_child(&self, child: &Child) -> Result<()> {
        match child.kind {
            ChildKind::UserPoolClient => self.cognito.delete_client(&child.parent, &child.id).await,
            ChildKind::ResourceServer => {
                self.cognito
                    .delete_resource_server(&child.parent, &child.id)
                    .await
            }
            ChildKind::UserPoolDomain => self.cognito.delete_domain(&child.parent, &child.id).await,
            _ => anyhow::bail!("{} cannot delete {}", self.name(), child),
        }
    }
}
