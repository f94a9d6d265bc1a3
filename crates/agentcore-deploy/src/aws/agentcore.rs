//! AgentCore control plane: gateways, gateway targets, runtimes and memories

use crate::aws::context::{AwsContext, FromAwsContext};
use crate::aws::error::{NotFoundExt, ignore_not_found};
use crate::wait::{Readiness, WaitConfig, wait_until_ready};
use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_bedrockagentcorecontrol::Client;
use aws_sdk_bedrockagentcorecontrol::types::{
    AgentRuntimeArtifact, AuthorizerConfiguration, AuthorizerType, ContainerConfiguration,
    CredentialProviderConfiguration, CredentialProviderType, CustomJwtAuthorizerConfiguration,
    GatewayProtocolType, McpLambdaTargetConfiguration, McpTargetConfiguration, MemoryStrategyInput,
    NetworkConfiguration, NetworkMode, SchemaDefinition, SchemaType, SemanticMemoryStrategyInput,
    SummaryMemoryStrategyInput, TargetConfiguration, ToolDefinition, ToolSchema,
    UserPreferenceMemoryStrategyInput,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// AgentCore control plane client
#[derive(Clone)]
pub struct AgentCoreClient {
    client: Client,
}

/// An MCP gateway guarded by a Cognito JWT authorizer
#[derive(Debug, Clone)]
pub struct GatewaySpec {
    pub name: String,
    pub role_arn: String,
    pub discovery_url: String,
    pub allowed_client: String,
}

/// A deployed gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gateway {
    pub id: String,
    pub url: String,
}

/// A tool exposed through a Lambda gateway target
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// Required string parameters as (name, description)
    pub parameters: Vec<(String, String)>,
}

/// A container-based agent runtime
#[derive(Debug, Clone)]
pub struct RuntimeSpec {
    pub name: String,
    pub container_uri: String,
    pub role_arn: String,
    pub environment: Vec<(String, String)>,
}

/// A deployed agent runtime
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentRuntime {
    pub id: String,
    pub arn: String,
}

/// Long-term memory strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    Summary,
    UserPreference,
    Semantic,
}

#[derive(Debug, Clone)]
pub struct StrategySpec {
    pub kind: StrategyKind,
    pub name: String,
    pub namespace: String,
}

#[derive(Debug, Clone)]
pub struct MemorySpec {
    pub name: String,
    pub description: String,
    pub event_expiry_days: i32,
    pub strategies: Vec<StrategySpec>,
}

impl FromAwsContext for AgentCoreClient {
    fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.agentcore_client(),
        }
    }
}

impl AgentCoreClient {
    // Gateways

    /// Gateway status, or `None` if the gateway does not exist
    pub async fn gateway_status(&self, gateway_id: &str) -> Result<Option<String>> {
        let response = self
            .client
            .get_gateway()
            .gateway_identifier(gateway_id)
            .send()
            .await
            .not_found_as_none()
            .with_context(|| format!("Failed to get gateway {gateway_id}"))?;
        Ok(response.map(|r| r.status().as_str().to_string()))
    }

    pub async fn gateway_exists(&self, gateway_id: &str) -> bool {
        match self.gateway_status(gateway_id).await {
            Ok(status) => status.is_some(),
            Err(e) => {
                debug!(gateway_id = %gateway_id, error = ?e, "Gateway lookup failed");
                false
            }
        }
    }

    /// Find a gateway by name
    pub async fn find_gateway(&self, name: &str) -> Result<Option<String>> {
        let mut next_token = None;
        loop {
            let response = self
                .client
                .list_gateways()
                .set_next_token(next_token.take())
                .send()
                .await
                .context("Failed to list gateways")?;

            if let Some(gateway) = response.items().iter().find(|g| g.name() == name) {
                return Ok(Some(gateway.gateway_id().to_string()));
            }

            match response.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => return Ok(None),
            }
        }
    }

    /// Start creating a gateway, returning its ID
    pub async fn create_gateway(&self, spec: &GatewaySpec) -> Result<String> {
        let authorizer = CustomJwtAuthorizerConfiguration::builder()
            .discovery_url(&spec.discovery_url)
            .allowed_clients(&spec.allowed_client)
            .build()
            .context("Failed to build JWT authorizer")?;

        info!(gateway = %spec.name, "Creating gateway");

        let response = self
            .client
            .create_gateway()
            .name(&spec.name)
            .role_arn(&spec.role_arn)
            .protocol_type(GatewayProtocolType::Mcp)
            .authorizer_type(AuthorizerType::CustomJwt)
            .authorizer_configuration(AuthorizerConfiguration::CustomJwtAuthorizer(authorizer))
            .description("AgentCore gateway for the WhatsApp tool")
            .send()
            .await
            .with_context(|| format!("Failed to create gateway {}", spec.name))?;

        Ok(response.gateway_id().to_string())
    }

    /// Wait until a gateway is READY
    pub async fn wait_for_gateway(
        &self,
        gateway_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Gateway> {
        let client = self.clone();
        wait_until_ready(
            WaitConfig::default(),
            cancel,
            || {
                let client = client.clone();
                let id = gateway_id.to_string();
                async move {
                    let status = client
                        .gateway_status(&id)
                        .await?
                        .unwrap_or_else(|| "CREATING".to_string());
                    Ok(Readiness::from_status(&status, &["READY"]))
                }
            },
            gateway_id,
        )
        .await?;

        let url = self
            .client
            .get_gateway()
            .gateway_identifier(gateway_id)
            .send()
            .await
            .context("Failed to get gateway")?
            .gateway_url()
            .context("Gateway has no URL")?
            .to_string();

        info!(gateway_id = %gateway_id, gateway_url = %url, "Gateway ready");
        Ok(Gateway {
            id: gateway_id.to_string(),
            url,
        })
    }

    /// Attach a Lambda function as an MCP target authenticated with the gateway role
    pub async fn create_lambda_target(
        &self,
        gateway_id: &str,
        target_name: &str,
        lambda_arn: &str,
        tools: &[ToolSpec],
    ) -> Result<String> {
        let definitions = tools
            .iter()
            .map(tool_definition)
            .collect::<Result<Vec<_>>>()?;

        let lambda = McpLambdaTargetConfiguration::builder()
            .lambda_arn(lambda_arn)
            .tool_schema(ToolSchema::InlinePayload(definitions))
            .build()
            .context("Failed to build Lambda target")?;

        let credentials = CredentialProviderConfiguration::builder()
            .credential_provider_type(CredentialProviderType::GatewayIamRole)
            .build()
            .context("Failed to build credential provider")?;

        let response = self
            .client
            .create_gateway_target()
            .gateway_identifier(gateway_id)
            .name(target_name)
            .description("Lambda target")
            .target_configuration(TargetConfiguration::Mcp(McpTargetConfiguration::Lambda(lambda)))
            .credential_provider_configurations(credentials)
            .send()
            .await
            .with_context(|| format!("Failed to create gateway target {target_name}"))?;

        let target_id = response.target_id().to_string();
        info!(gateway_id = %gateway_id, target_id = %target_id, "Gateway target created");
        Ok(target_id)
    }

    /// Target IDs of a gateway. A missing gateway has no targets.
    pub async fn list_targets(&self, gateway_id: &str) -> Result<Vec<String>> {
        let mut targets = Vec::new();
        let mut next_token = None;
        loop {
            let Some(response) = self
                .client
                .list_gateway_targets()
                .gateway_identifier(gateway_id)
                .set_next_token(next_token.take())
                .send()
                .await
                .not_found_as_none()
                .context("Failed to list gateway targets")?
            else {
                break;
            };

            targets.extend(response.items().iter().map(|t| t.target_id().to_string()));

            match response.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }
        Ok(targets)
    }

    pub async fn delete_target(&self, gateway_id: &str, target_id: &str) -> Result<()> {
        ignore_not_found(
            self.client
                .delete_gateway_target()
                .gateway_identifier(gateway_id)
                .target_id(target_id)
                .send()
                .await,
        )
        .with_context(|| format!("Failed to delete gateway target {target_id}"))?;
        debug!(gateway_id = %gateway_id, target_id = %target_id, "Gateway target deleted");
        Ok(())
    }

    pub async fn delete_gateway(&self, gateway_id: &str) -> Result<()> {
        ignore_not_found(
            self.client
                .delete_gateway()
                .gateway_identifier(gateway_id)
                .send()
                .await,
        )
        .with_context(|| format!("Failed to delete gateway {gateway_id}"))?;
        info!(gateway_id = %gateway_id, "Gateway deleted");
        Ok(())
    }

    // Runtimes

    /// Runtime status, or `None` if the runtime does not exist
    pub async fn runtime_status(&self, runtime_id: &str) -> Result<Option<String>> {
        let response = self
            .client
            .get_agent_runtime()
            .agent_runtime_id(runtime_id)
            .send()
            .await
            .not_found_as_none()
            .with_context(|| format!("Failed to get agent runtime {runtime_id}"))?;
        Ok(response.map(|r| r.status().as_str().to_string()))
    }

    pub async fn runtime_exists(&self, runtime_id: &str) -> bool {
        match self.runtime_status(runtime_id).await {
            Ok(status) => status.is_some(),
            Err(e) => {
                debug!(runtime_id = %runtime_id, error = ?e, "Runtime lookup failed");
                false
            }
        }
    }

    /// Find a runtime by name
    pub async fn find_runtime(&self, name: &str) -> Result<Option<AgentRuntime>> {
        let mut next_token = None;
        loop {
            let response = self
                .client
                .list_agent_runtimes()
                .set_next_token(next_token.take())
                .send()
                .await
                .context("Failed to list agent runtimes")?;

            if let Some(runtime) = response
                .agent_runtimes()
                .iter()
                .find(|r| r.agent_runtime_name() == name)
            {
                return Ok(Some(AgentRuntime {
                    id: runtime.agent_runtime_id().to_string(),
                    arn: runtime.agent_runtime_arn().to_string(),
                }));
            }

            match response.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => return Ok(None),
            }
        }
    }

    /// Start creating a runtime from a container image
    pub async fn create_runtime(&self, spec: &RuntimeSpec) -> Result<AgentRuntime> {
        let container = ContainerConfiguration::builder()
            .container_uri(&spec.container_uri)
            .build()
            .context("Failed to build container configuration")?;
        let network = NetworkConfiguration::builder()
            .network_mode(NetworkMode::Public)
            .build()
            .context("Failed to build network configuration")?;

        info!(runtime = %spec.name, image = %spec.container_uri, "Creating agent runtime");

        let response = spec
            .environment
            .iter()
            .fold(
                self.client
                    .create_agent_runtime()
                    .agent_runtime_name(&spec.name)
                    .agent_runtime_artifact(AgentRuntimeArtifact::ContainerConfiguration(container))
                    .role_arn(&spec.role_arn)
                    .network_configuration(network),
                |request, (k, v)| request.environment_variables(k, v),
            )
            .send()
            .await
            .with_context(|| format!("Failed to create agent runtime {}", spec.name))?;

        Ok(AgentRuntime {
            id: response.agent_runtime_id().to_string(),
            arn: response.agent_runtime_arn().to_string(),
        })
    }

    /// Wait until a runtime is READY
    pub async fn wait_for_runtime(&self, runtime_id: &str, cancel: &CancellationToken) -> Result<()> {
        let client = self.clone();
        wait_until_ready(
            WaitConfig::default(),
            cancel,
            || {
                let client = client.clone();
                let id = runtime_id.to_string();
                async move {
                    let status = client
                        .runtime_status(&id)
                        .await?
                        .unwrap_or_else(|| "CREATING".to_string());
                    Ok(Readiness::from_status(&status, &["READY"]))
                }
            },
            runtime_id,
        )
        .await?;

        info!(runtime_id = %runtime_id, "Agent runtime ready");
        Ok(())
    }

    pub async fn delete_runtime(&self, runtime_id: &str) -> Result<()> {
        ignore_not_found(
            self.client
                .delete_agent_runtime()
                .agent_runtime_id(runtime_id)
                .send()
                .await,
        )
        .with_context(|| format!("Failed to delete agent runtime {runtime_id}"))?;
        info!(runtime_id = %runtime_id, "Agent runtime deleted");
        Ok(())
    }

    // Memories

    /// Memory status, or `None` if the memory does not exist
    pub async fn memory_status(&self, memory_id: &str) -> Result<Option<String>> {
        let response = self
            .client
            .get_memory()
            .memory_id(memory_id)
            .send()
            .await
            .not_found_as_none()
            .with_context(|| format!("Failed to get memory {memory_id}"))?;
        Ok(response
            .as_ref()
            .and_then(|r| r.memory())
            .map(|m| m.status().as_str().to_string()))
    }

    pub async fn memory_exists(&self, memory_id: &str) -> bool {
        match self.memory_status(memory_id).await {
            Ok(status) => status.is_some(),
            Err(e) => {
                debug!(memory_id = %memory_id, error = ?e, "Memory lookup failed");
                false
            }
        }
    }

    /// Find a memory by name. Memory IDs are the name plus a generated suffix.
    pub async fn find_memory(&self, name: &str) -> Result<Option<String>> {
        let prefix = format!("{name}-");
        let mut next_token = None;
        loop {
            let response = self
                .client
                .list_memories()
                .set_next_token(next_token.take())
                .send()
                .await
                .context("Failed to list memories")?;

            if let Some(id) = response
                .memories()
                .iter()
                .filter_map(|m| m.id())
                .find(|id| id.starts_with(&prefix))
            {
                return Ok(Some(id.to_string()));
            }

            match response.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => return Ok(None),
            }
        }
    }

    /// Start creating a memory with long-term strategies, returning its ID
    pub async fn create_memory(&self, spec: &MemorySpec) -> Result<String> {
        let mut request = self
            .client
            .create_memory()
            .name(&spec.name)
            .description(&spec.description)
            .event_expiry_duration(spec.event_expiry_days);
        for strategy in &spec.strategies {
            request = request.memory_strategies(strategy_input(strategy)?);
        }

        info!(memory = %spec.name, strategies = spec.strategies.len(), "Creating memory");

        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to create memory {}", spec.name))?;
        response
            .memory()
            .map(|m| m.id().to_string())
            .context("No memory returned from CreateMemory")
    }

    /// Wait until a memory is ACTIVE
    pub async fn wait_for_memory(&self, memory_id: &str, cancel: &CancellationToken) -> Result<()> {
        let client = self.clone();
        wait_until_ready(
            WaitConfig::default(),
            cancel,
            || {
                let client = client.clone();
                let id = memory_id.to_string();
                async move {
                    let status = client
                        .memory_status(&id)
                        .await?
                        .unwrap_or_else(|| "CREATING".to_string());
                    Ok(Readiness::from_status(&status, &["ACTIVE"]))
                }
            },
            memory_id,
        )
        .await?;

        info!(memory_id = %memory_id, "Memory active");
        Ok(())
    }

    pub async fn delete_memory(&self, memory_id: &str) -> Result<()> {
        ignore_not_found(self.client.delete_memory().memory_id(memory_id).send().await)
            .with_context(|| format!("Failed to delete memory {memory_id}"))?;
        info!(memory_id = %memory_id, "Memory deleted");
        Ok(())
    }
}

/// AgentCore operations the resource handlers rely on.
///
/// Implemented by [`AgentCoreClient`]; mocked in handler tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AgentCoreOperations: Send + Sync {
    async fn gateway_exists(&self, gateway_id: &str) -> bool;
    async fn find_gateway(&self, name: &str) -> Result<Option<String>>;
    async fn create_gateway(&self, spec: &GatewaySpec) -> Result<String>;
    async fn wait_for_gateway(&self, gateway_id: &str, cancel: &CancellationToken) -> Result<Gateway>;
    async fn create_lambda_target(
        &self,
        gateway_id: &str,
        target_name: &str,
        lambda_arn: &str,
        tools: &[ToolSpec],
    ) -> Result<String>;
    async fn list_targets(&self, gateway_id: &str) -> Result<Vec<String>>;
    async fn delete_target(&self, gateway_id: &str, target_id: &str) -> Result<()>;
    async fn delete_gateway(&self, gateway_id: &str) -> Result<()>;

    async fn runtime_exists(&self, runtime_id: &str) -> bool;
    async fn find_runtime(&self, name: &str) -> Result<Option<AgentRuntime>>;
    async fn create_runtime(&self, spec: &RuntimeSpec) -> Result<AgentRuntime>;
    async fn wait_for_runtime(&self, runtime_id: &str, cancel: &CancellationToken) -> Result<()>;
    async fn delete_runtime(&self, runtime_id: &str) -> Result<()>;

    async fn memory_exists(&self, memory_id: &str) -> bool;
    async fn find_memory(&self, name: &str) -> Result<Option<String>>;
    async fn create_memory(&self, spec: &MemorySpec) -> Result<String>;
    async fn wait_for_memory(&self, memory_id: &str, cancel: &CancellationToken) -> Result<()>;
    async fn delete_memory(&self, memory_id: &str) -> Result<()>;
}

#[async_trait]
impl AgentCoreOperations for AgentCoreClient {
    async fn gateway_exists(&self, gateway_id: &str) -> bool {
        AgentCoreClient::gateway_exists(self, gateway_id).await
    }

    async fn find_gateway(&self, name: &str) -> Result<Option<String>> {
        AgentCoreClient::find_gateway(self, name).await
    }

    async fn create_gateway(&self, spec: &GatewaySpec) -> Result<String> {
        AgentCoreClient::create_gateway(self, spec).await
    }

    async fn wait_for_gateway(&self, gateway_id: &str, cancel: &CancellationToken) -> Result<Gateway> {
        AgentCoreClient::wait_for_gateway(self, gateway_id, cancel).await
    }

    async fn create_lambda_target(
        &self,
        gateway_id: &str,
        target_name: &str,
        lambda_arn: &str,
        tools: &[ToolSpec],
    ) -> Result<String> {
        AgentCoreClient::create_lambda_target(self, gateway_id, target_name, lambda_arn, tools).await
    }

    async fn list_targets(&self, gateway_id: &str) -> Result<Vec<String>> {
        AgentCoreClient::list_targets(self, gateway_id).await
    }

    async fn delete_target(&self, gateway_id: &str, target_id: &str) -> Result<()> {
        AgentCoreClient::delete_target(self, gateway_id, target_id).await
    }

    async fn delete_gateway(&self, gateway_id: &str) -> Result<()> {
        AgentCoreClient::delete_gateway(self, gateway_id).await
    }

    async fn runtime_exists(&self, runtime_id: &str) -> bool {
        AgentCoreClient::runtime_exists(self, runtime_id).await
    }

    async fn find_runtime(&self, name: &str) -> Result<Option<AgentRuntime>> {
        AgentCoreClient::find_runtime(self, name).await
    }

    async fn create_runtime(&self, spec: &RuntimeSpec) -> Result<AgentRuntime> {
        AgentCoreClient::create_runtime(self, spec).await
    }

    async fn wait_for_runtime(&self, runtime_id: &str, cancel: &CancellationToken) -> Result<()> {
        AgentCoreClient::wait_for_runtime(self, runtime_id, cancel).await
    }

    async fn delete_runtime(&self, runtime_id: &str) -> Result<()> {
        AgentCoreClient::delete_runtime(self, runtime_id).await
    }

    async fn memory_exists(&self, memory_id: &str) -> bool {
        AgentCoreClient::memory_exists(self, memory_id).await
    }

    async fn find_memory(&self, name: &str) -> Result<Option<String>> {
        AgentCoreClient::find_memory(self, name).await
    }

    async fn create_memory(&self, spec: &MemorySpec) -> Result<String> {
        AgentCoreClient::create_memory(self, spec).await
    }

    async fn wait_for_memory(&self, memory_id: &str, cancel: &CancellationToken) -> Result<()> {
        AgentCoreClient::wait_for_memory(self, memory_id, cancel).await
    }

    async fn delete_memory(&self, memory_id: &str) -> Result<()> {
        AgentCoreClient::delete_memory(self, memory_id).await
    }
}

fn tool_definition(tool: &ToolSpec) -> Result<ToolDefinition> {
    let mut schema = SchemaDefinition::builder().r#type(SchemaType::Object);
    for (name, description) in &tool.parameters {
        let property = SchemaDefinition::builder()
            .r#type(SchemaType::String)
            .description(description)
            .build()
            .context("Failed to build tool parameter")?;
        schema = schema.properties(name, property).required(name);
    }

    ToolDefinition::builder()
        .name(&tool.name)
        .description(&tool.description)
        .input_schema(schema.build().context("Failed to build tool schema")?)
        .build()
        .context("Failed to build tool definition")
}

fn strategy_input(strategy: &StrategySpec) -> Result<MemoryStrategyInput> {
    let input = match strategy.kind {
        StrategyKind::Summary => MemoryStrategyInput::SummaryMemoryStrategy(
            SummaryMemoryStrategyInput::builder()
                .name(&strategy.name)
                .namespace_templates(&strategy.namespace)
                .build()
                .context("Failed to build summary strategy")?,
        ),
        StrategyKind::UserPreference => MemoryStrategyInput::UserPreferenceMemoryStrategy(
            UserPreferenceMemoryStrategyInput::builder()
                .name(&strategy.name)
                .namespace_templates(&strategy.namespace)
                .build()
                .context("Failed to build user preference strategy")?,
        ),
        StrategyKind::Semantic => MemoryStrategyInput::SemanticMemoryStrategy(
            SemanticMemoryStrategyInput::builder()
                .name(&strategy.name)
                .namespace_templates(&strategy.namespace)
                .build()
                .context("Failed to build semantic strategy")?,
        ),
    };
    Ok(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_definition_requires_every_parameter() {
        let tool = ToolSpec {
            name: "send_whatsapp_message".into(),
            description: "Send a WhatsApp text message".into(),
            parameters: vec![
                ("phone_number".into(), "Recipient in E.164 format".into()),
                ("message".into(), "Message text".into()),
            ],
        };
        let definition = tool_definition(&tool).unwrap();
        assert_eq!(definition.name(), "send_whatsapp_message");

        let schema = definition.input_schema().unwrap();
        assert_eq!(schema.r#type(), &SchemaType::Object);
        assert_eq!(schema.required(), ["phone_number", "message"]);
        assert_eq!(schema.properties().map(|p| p.len()), Some(2));
    }

    #[test]
    fn each_strategy_kind_maps_to_its_input() {
        let spec = |kind| StrategySpec {
            kind,
            name: "s".into(),
            namespace: "/octank-edu/{actorId}/facts".into(),
        };
        assert!(matches!(
            strategy_input(&spec(StrategyKind::Summary)).unwrap(),
            MemoryStrategyInput::SummaryMemoryStrategy(_)
        ));
        assert!(matches!(
            strategy_input(&spec(StrategyKind::UserPreference)).unwrap(),
            MemoryStrategyInput::UserPreferenceMemoryStrategy(_)
        ));
        assert!(matches!(
            strategy_input(&spec(StrategyKind::Semantic)).unwrap(),
            MemoryStrategyInput::SemanticMemoryStrategy(_)
        ));
    }
}
