//! MCP gateway exposing the WhatsApp tool
//!
//! Creating the gateway also sets up everything it depends on that is not a
//! deploy step of its own: its IAM role, the authorizer user pool with a
//! resource server and machine-to-machine client, and the tool function.
//! Every piece is get-or-create, so a run that failed halfway is finished
//! by the next one.

use super::{Child, DeployContext, Locator, Provisioned, ResourceHandler};
use crate::aws::agentcore::{GatewaySpec, ToolSpec};
use crate::aws::iam::{RoleSpec, service_trust_policy};
use crate::aws::lambda::FunctionSpec;
use crate::aws::{AgentCoreOperations, CognitoOperations, IamOperations, LambdaOperations};
use crate::config::DeployConfig;
use agentcore_deploy_common::defaults::{
    function_role_name, gateway_client_name, gateway_name, gateway_pool_name,
    gateway_resource_server_id, gateway_role_name, tool_function_name,
};
use agentcore_deploy_common::{ChildKind, ParameterLayout, RegistryKey, ResourceKind};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

const AGENTCORE_SERVICE: &str = "bedrock-agentcore.amazonaws.com";
const LAMBDA_SERVICE: &str = "lambda.amazonaws.com";
const LAMBDA_BASIC_EXECUTION: &str =
    "arn:aws:iam::aws:policy/service-role/AWSLambdaBasicExecutionRole";

/// OAuth scopes offered by the gateway's resource server
const GATEWAY_SCOPES: [(&str, &str); 2] = [
    ("gateway:read", "Read access"),
    ("gateway:write", "Write access"),
];

pub struct GatewayHandler {
    agentcore: Arc<dyn AgentCoreOperations>,
    cognito: Arc<dyn CognitoOperations>,
    iam: Arc<dyn IamOperations>,
    lambda: Arc<dyn LambdaOperations>,
    config: Arc<DeployConfig>,
    layout: ParameterLayout,
    locator: Locator,
}

impl GatewayHandler {
    pub fn new(
        agentcore: Arc<dyn AgentCoreOperations>,
        cognito: Arc<dyn CognitoOperations>,
        iam: Arc<dyn IamOperations>,
        lambda: Arc<dyn LambdaOperations>,
        config: Arc<DeployConfig>,
    ) -> Self {
        let layout = config.layout();
        Self {
            locator: Locator::Registry(layout.gateway_id()),
            agentcore,
            cognito,
            iam,
            lambda,
            config,
            layout,
        }
    }

    fn project(&self) -> &str {
        &self.config.project
    }

    fn gateway_role(&self) -> RoleSpec {
        let policy = serde_json::json!({
            "Version": "2012-10-17",
            "Statement": [
                {
                    "Effect": "Allow",
                    "Action": ["lambda:InvokeFunction"],
                    "Resource": "*"
                },
                {
                    "Effect": "Allow",
                    "Action": ["bedrock-agentcore:*"],
                    "Resource": "*"
                }
            ]
        });
        RoleSpec {
            name: gateway_role_name(self.project()),
            description: "Role assumed by the AgentCore gateway to invoke its targets".to_string(),
            trust_policy: service_trust_policy(AGENTCORE_SERVICE),
            managed_policies: Vec::new(),
            inline_policy: Some(("agentcore-gateway".to_string(), policy.to_string())),
        }
    }

    /// Get or create the tool function and its execution role
    async fn ensure_tool_function(&self, ctx: &DeployContext) -> Result<String> {
        let function_name = tool_function_name(self.project());
        let role = RoleSpec {
            name: function_role_name(&function_name),
            description: format!("Execution role for {function_name}"),
            trust_policy: service_trust_policy(LAMBDA_SERVICE),
            managed_policies: vec![LAMBDA_BASIC_EXECUTION.to_string()],
            inline_policy: None,
        };
        let role_arn = self.iam.ensure_role(&role, ctx.cancel()).await?;

        let spec = FunctionSpec {
            name: function_name,
            role_arn,
            handler: "lambda_function.lambda_handler".to_string(),
            package: self.config.packages.tool.clone(),
            timeout_secs: 30,
            environment: vec![(
                "WHATSAPP_PHONE_NUMBER_ID".to_string(),
                self.config.whatsapp_phone_number_id.clone(),
            )],
        };
        self.lambda.ensure_function(&spec, ctx.cancel()).await
    }
}

/// The single tool the gateway exposes
pub fn whatsapp_tool() -> ToolSpec {
    ToolSpec {
        name: "send_whatsapp_message".to_string(),
        description: "Send a WhatsApp text message to a user".to_string(),
        parameters: vec![
            (
                "phone_number".to_string(),
                "Recipient WhatsApp number in E.164 format, e.g. +5511999999999".to_string(),
            ),
            (
                "message".to_string(),
                "Text of the message to send".to_string(),
            ),
        ],
    }
}

fn qualified_scopes(resource_server: &str) -> Vec<String> {
    GATEWAY_SCOPES
        .iter()
        .map(|(scope, _)| format!("{resource_server}/{scope}"))
        .collect()
}

#[async_trait]
impl ResourceHandler for GatewayHandler {
    fn name(&self) -> &str {
        "Gateway"
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Gateway
    }

    fn locator(&self) -> &Locator {
        &self.locator
    }

    fn auxiliary_keys(&self) -> Vec<RegistryKey> {
        vec![
            self.layout.gateway_url(),
            self.layout.client_id(),
            self.layout.client_secret(),
            self.layout.scope(),
        ]
    }

    async fn exists(&self, id: &str) -> bool {
        self.agentcore.gateway_exists(id).await
    }

    async fn create(&self, ctx: &DeployContext) -> Result<Provisioned> {
        let project = self.project();
        let role_arn = self.iam.ensure_role(&self.gateway_role(), ctx.cancel()).await?;

        let pool_id = self
            .cognito
            .ensure_authorizer_pool(&gateway_pool_name(project))
            .await?;
        ctx.claim(&self.layout.gateway_user_pool_id(), &pool_id);

        let resource_server = gateway_resource_server_id(project);
        self.cognito
            .ensure_resource_server(
                &pool_id,
                &resource_server,
                &format!("{project}-gateway"),
                &GATEWAY_SCOPES,
            )
            .await?;
        let scopes = qualified_scopes(&resource_server);
        let credentials = self
            .cognito
            .ensure_m2m_client(&pool_id, &gateway_client_name(project), &scopes)
            .await?;

        let tool_key = self.layout.function(&tool_function_name(project));
        let function_arn = self.ensure_tool_function(ctx).await?;
        ctx.claim(&tool_key, &function_arn);

        let name = gateway_name(project);
        let gateway_id = match self.agentcore.find_gateway(&name).await? {
            Some(id) => {
                info!(gateway = %name, gateway_id = %id, "Finishing existing gateway");
                id
            }
            None => {
                self.agentcore
                    .create_gateway(&GatewaySpec {
                        name,
                        role_arn,
                        discovery_url: self.cognito.discovery_url(&pool_id),
                        allowed_client: credentials.client_id.clone(),
                    })
                    .await?
            }
        };
        ctx.claim(&self.layout.gateway_id(), &gateway_id);
        let gateway = self.agentcore.wait_for_gateway(&gateway_id, ctx.cancel()).await?;

        if self.agentcore.list_targets(&gateway.id).await?.is_empty() {
            let target_name = format!("WppLambdaFunction-{}", chrono::Utc::now().timestamp());
            let target_id = self
                .agentcore
                .create_lambda_target(&gateway.id, &target_name, &function_arn, &[whatsapp_tool()])
                .await?;
            info!(gateway_id = %gateway.id, target_id = %target_id, "Gateway wired to tool function");
        }

        Ok(Provisioned::new(gateway.id)
            .with_output(self.layout.gateway_url(), gateway.url)
            .with_output(self.layout.gateway_user_pool_id(), pool_id)
            .with_output(self.layout.client_id(), credentials.client_id)
            .with_output(self.layout.client_secret(), credentials.client_secret)
            .with_output(self.layout.scope(), scopes.join(" "))
            .with_output(tool_key, function_arn))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.agentcore.delete_gateway(id).await
    }

    async fn list_children(&self, id: &str) -> Result<Vec<Child>> {
        Ok(self
            .agentcore
            .list_targets(id)
            .await?
            .into_iter()
            .map(|target| Child::new(ChildKind::GatewayTarget, id, target))
            .collect())
    }

    async fn delete_child(&self, child: &Child) -> Result<()> {
        anyhow::ensure!(
            child.kind == ChildKind::GatewayTarget,
            "Gateway cannot delete {}",
            child
        );
        self.agentcore.delete_target(&child.parent, &child.id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::agentcore::{Gateway, MockAgentCoreOperations};
    use crate::aws::cognito::{ClientCredentials, MockCognitoOperations};
    use crate::aws::iam::MockIamOperations;
    use crate::aws::lambda::MockLambdaOperations;
    use crate::handler::test_support::deploy_config;
    use mockall::predicate::eq;

    const TOOL_ARN: &str = "arn:aws:lambda:us-east-1:123456789012:function:octank-whatsapp-tool";

    /// Dependencies that already exist or are created without trouble
    fn dependencies() -> (MockCognitoOperations, MockIamOperations, MockLambdaOperations) {
        let mut cognito = MockCognitoOperations::new();
        cognito
            .expect_ensure_authorizer_pool()
            .with(eq("octank-gateway-pool"))
            .returning(|_| Ok("us-east-1_GATEWAYPOOL".into()));
        cognito
            .expect_ensure_resource_server()
            .returning(|_, _, _, _| Ok(()));
        cognito.expect_ensure_m2m_client().returning(|_, _, _| {
            Ok(ClientCredentials {
                client_id: "client-1".into(),
                client_secret: "secret-1".into(),
            })
        });
        cognito
            .expect_discovery_url()
            .returning(|pool| format!("https://cognito.example/{pool}"));

        let mut iam = MockIamOperations::new();
        iam.expect_ensure_role()
            .returning(|spec, _| Ok(format!("arn:aws:iam::123456789012:role/{}", spec.name)));

        let mut lambda = MockLambdaOperations::new();
        lambda
            .expect_ensure_function()
            .withf(|spec, _| spec.name == "octank-whatsapp-tool")
            .returning(|_, _| Ok(TOOL_ARN.into()));

        (cognito, iam, lambda)
    }

    fn handler(agentcore: MockAgentCoreOperations) -> GatewayHandler {
        let (cognito, iam, lambda) = dependencies();
        GatewayHandler::new(
            Arc::new(agentcore),
            Arc::new(cognito),
            Arc::new(iam),
            Arc::new(lambda),
            deploy_config(),
        )
    }

    fn ready(agentcore: &mut MockAgentCoreOperations) {
        agentcore.expect_wait_for_gateway().returning(|id, _| {
            Ok(Gateway {
                id: id.to_string(),
                url: format!("https://{id}.gateway.example/mcp"),
            })
        });
    }

    #[test]
    fn scopes_are_qualified_by_resource_server() {
        assert_eq!(
            qualified_scopes("octank-gateway-id").join(" "),
            "octank-gateway-id/gateway:read octank-gateway-id/gateway:write"
        );
    }

    #[test]
    fn whatsapp_tool_takes_phone_and_message() {
        let tool = whatsapp_tool();
        assert_eq!(tool.name, "send_whatsapp_message");
        let names: Vec<_> = tool.parameters.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["phone_number", "message"]);
    }

    #[tokio::test]
    async fn failed_target_leaves_everything_claimed() {
        let mut agentcore = MockAgentCoreOperations::new();
        agentcore.expect_find_gateway().returning(|_| Ok(None));
        agentcore
            .expect_create_gateway()
            .withf(|spec| spec.name == "octankforLambda" && spec.allowed_client == "client-1")
            .returning(|_| Ok("gw-1".into()));
        ready(&mut agentcore);
        agentcore.expect_list_targets().returning(|_| Ok(vec![]));
        agentcore
            .expect_create_lambda_target()
            .returning(|_, _, _, _| Err(anyhow::anyhow!("ValidationException")));

        let mut ctx = DeployContext::default();
        let result = handler(agentcore).create(&ctx).await;

        assert!(result.is_err());
        let claims: Vec<(String, String)> = ctx
            .take_claims()
            .into_iter()
            .map(|(k, v)| (k.name().to_string(), v))
            .collect();
        assert_eq!(
            claims,
            [
                ("gateway_user_pool_id".to_string(), "us-east-1_GATEWAYPOOL".to_string()),
                ("function_octank-whatsapp-tool".to_string(), TOOL_ARN.to_string()),
                ("gateway_id".to_string(), "gw-1".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn gateway_is_claimed_before_waiting_for_it() {
        let mut agentcore = MockAgentCoreOperations::new();
        agentcore.expect_find_gateway().returning(|_| Ok(None));
        agentcore
            .expect_create_gateway()
            .returning(|_| Ok("gw-1".into()));
        agentcore
            .expect_wait_for_gateway()
            .returning(|_, _| Err(anyhow::anyhow!("gw-1 did not become ready")));
        agentcore.expect_create_lambda_target().never();

        let mut ctx = DeployContext::default();
        assert!(handler(agentcore).create(&ctx).await.is_err());

        assert!(
            ctx.take_claims()
                .iter()
                .any(|(k, v)| k.name() == "gateway_id" && v == "gw-1")
        );
    }

    #[tokio::test]
    async fn existing_gateway_is_finished_without_duplicates() {
        let mut agentcore = MockAgentCoreOperations::new();
        agentcore
            .expect_find_gateway()
            .with(eq("octankforLambda"))
            .returning(|_| Ok(Some("gw-old".into())));
        agentcore.expect_create_gateway().never();
        ready(&mut agentcore);
        agentcore
            .expect_list_targets()
            .with(eq("gw-old"))
            .returning(|_| Ok(vec!["t-1".into()]));
        agentcore.expect_create_lambda_target().never();

        let provisioned = handler(agentcore)
            .create(&DeployContext::default())
            .await
            .unwrap();

        assert_eq!(provisioned.id, "gw-old");
        let outputs: Vec<(&str, &str)> = provisioned
            .outputs
            .iter()
            .map(|(k, v)| (k.name(), v.as_str()))
            .collect();
        assert_eq!(
            outputs,
            [
                ("gateway_url", "https://gw-old.gateway.example/mcp"),
                ("gateway_user_pool_id", "us-east-1_GATEWAYPOOL"),
                ("client_id", "client-1"),
                ("client_secret", "secret-1"),
                ("scope", "octank-gateway-id/gateway:read octank-gateway-id/gateway:write"),
                ("function_octank-whatsapp-tool", TOOL_ARN),
            ]
        );
    }

    #[tokio::test]
    async fn targets_are_the_children() {
        let mut agentcore = MockAgentCoreOperations::new();
        agentcore
            .expect_list_targets()
            .with(eq("gw-1"))
            .returning(|_| Ok(vec!["t-1".into(), "t-2".into()]));
        agentcore
            .expect_list_targets()
            .with(eq("gw-gone"))
            .returning(|_| Ok(vec![]));
        let handler = handler(agentcore);

        assert_eq!(
            handler.list_children("gw-1").await.unwrap(),
            [
                Child::new(ChildKind::GatewayTarget, "gw-1", "t-1"),
                Child::new(ChildKind::GatewayTarget, "gw-1", "t-2"),
            ]
        );
        assert!(handler.list_children("gw-gone").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn only_targets_are_deleted_as_children() {
        let mut agentcore = MockAgentCoreOperations::new();
        agentcore
            .expect_delete_target()
            .with(eq("gw-1"), eq("t-1"))
            .times(1)
            .returning(|_, _| Ok(()));
        let handler = handler(agentcore);

        handler
            .delete_child(&Child::new(ChildKind::GatewayTarget, "gw-1", "t-1"))
            .await
            .unwrap();
        assert!(
            handler
                .delete_child(&Child::new(ChildKind::DataSource, "gw-1", "ds-1"))
                .await
                .is_err()
        );
    }
}
