//! AgentCore memory with long-term strategies

use super::{DeployContext, Locator, Provisioned, ResourceHandler};
use crate::aws::AgentCoreOperations;
use crate::aws::agentcore::{MemorySpec, StrategyKind, StrategySpec};
use crate::config::DeployConfig;
use agentcore_deploy_common::defaults::{DEFAULT_MEMORY_EVENT_EXPIRY_DAYS, memory_name};
use agentcore_deploy_common::ResourceKind;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

pub struct MemoryHandler {
    agentcore: Arc<dyn AgentCoreOperations>,
    config: Arc<DeployConfig>,
    locator: Locator,
}

impl MemoryHandler {
    pub fn new(agentcore: Arc<dyn AgentCoreOperations>, config: Arc<DeployConfig>) -> Self {
        Self {
            locator: Locator::Registry(config.layout().memory_id()),
            agentcore,
            config,
        }
    }

    fn spec(&self) -> MemorySpec {
        memory_spec(&self.config.project)
    }
}

/// Session summaries, user preferences and semantic facts, each under its
/// own per-actor namespace
fn memory_spec(project: &str) -> MemorySpec {
    let namespace = |suffix: &str| format!("/{project}-edu/{{actorId}}/{suffix}");
    MemorySpec {
        name: memory_name(project),
        description: "Memory for the multi-agent educational assistant".to_string(),
        event_expiry_days: DEFAULT_MEMORY_EVENT_EXPIRY_DAYS,
        strategies: vec![
            StrategySpec {
                kind: StrategyKind::Summary,
                name: "SessionSummaries".to_string(),
                namespace: namespace("{sessionId}"),
            },
            StrategySpec {
                kind: StrategyKind::UserPreference,
                name: "UserPreferences".to_string(),
                namespace: namespace("preferences"),
            },
            StrategySpec {
                kind: StrategyKind::Semantic,
                name: "UserFacts".to_string(),
                namespace: namespace("facts"),
            },
        ],
    }
}

#[async_trait]
impl ResourceHandler for MemoryHandler {
    fn name(&self) -> &str {
        "Memory"
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Memory
    }

    fn locator(&self) -> &Locator {
        &self.locator
    }

    async fn exists(&self, id: &str) -> bool {
        self.agentcore.memory_exists(id).await
    }

    async fn create(&self, ctx: &DeployContext) -> Result<Provisioned> {
        let spec = self.spec();
        let id = match self.agentcore.find_memory(&spec.name).await? {
            Some(id) => {
                info!(memory = %spec.name, memory_id = %id, "Finishing existing memory");
                id
            }
            None => self.agentcore.create_memory(&spec).await?,
        };
        ctx.claim(&self.config.layout().memory_id(), &id);
        self.agentcore.wait_for_memory(&id, ctx.cancel()).await?;
        Ok(Provisioned::new(id))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.agentcore.delete_memory(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::agentcore::MockAgentCoreOperations;
    use crate::handler::test_support::deploy_config;
    use mockall::predicate::eq;

    #[test]
    fn namespaces_are_per_actor() {
        let spec = memory_spec("octank");
        assert_eq!(spec.name, "OctankEduMultiAgentMemory");
        assert_eq!(spec.event_expiry_days, 90);
        let namespaces: Vec<_> = spec.strategies.iter().map(|s| s.namespace.as_str()).collect();
        assert_eq!(
            namespaces,
            [
                "/octank-edu/{actorId}/{sessionId}",
                "/octank-edu/{actorId}/preferences",
                "/octank-edu/{actorId}/facts",
            ]
        );
    }

    #[tokio::test]
    async fn memory_is_claimed_before_it_is_active() {
        let mut agentcore = MockAgentCoreOperations::new();
        agentcore.expect_find_memory().returning(|_| Ok(None));
        agentcore
            .expect_create_memory()
            .withf(|spec| spec.strategies.len() == 3)
            .returning(|_| Ok("mem-1".into()));
        agentcore
            .expect_wait_for_memory()
            .withf(|id, _| id == "mem-1")
            .returning(|_, _| Err(anyhow::anyhow!("memory mem-1 failed")));
        let handler = MemoryHandler::new(Arc::new(agentcore), deploy_config());

        let mut ctx = DeployContext::default();
        assert!(handler.create(&ctx).await.is_err());

        let claims = ctx.take_claims();
        let claims: Vec<_> = claims.iter().map(|(k, v)| (k.name(), v.as_str())).collect();
        assert_eq!(claims, [("memory_id", "mem-1")]);
    }

    #[tokio::test]
    async fn memory_with_the_same_name_is_adopted() {
        let mut agentcore = MockAgentCoreOperations::new();
        agentcore
            .expect_find_memory()
            .with(eq("OctankEduMultiAgentMemory"))
            .returning(|_| Ok(Some("mem-old".into())));
        agentcore.expect_create_memory().never();
        agentcore.expect_wait_for_memory().returning(|_, _| Ok(()));
        let handler = MemoryHandler::new(Arc::new(agentcore), deploy_config());

        let provisioned = handler.create(&DeployContext::default()).await.unwrap();
        assert_eq!(provisioned, Provisioned::new("mem-old"));
    }
}
