//! Lambda functions and their execution roles

use super::role::{delete_policy_child, policy_children};
use super::{Child, DeployContext, HandlerError, Locator, Provisioned, ResourceHandler};
use crate::aws::iam::{RoleSpec, service_trust_policy};
use crate::aws::lambda::{FunctionSpec, role_name_from_arn};
use crate::aws::{IamOperations, LambdaOperations};
use crate::config::DeployConfig;
use agentcore_deploy_common::defaults::{function_role_name, handler_function_name, tool_function_name};
use agentcore_deploy_common::{ChildKind, ParameterLayout, RegistryKey, ResourceKind};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

const LAMBDA_SERVICE: &str = "lambda.amazonaws.com";
const LAMBDA_BASIC_EXECUTION: &str =
    "arn:aws:iam::aws:policy/service-role/AWSLambdaBasicExecutionRole";

/// A function whose ARN is kept in the registry.
///
/// The tool function is created by the gateway step, so only the message
/// handler function is deployable here. Both are torn down the same way:
/// execution role (after its policies), then the function.
pub struct FunctionHandler {
    lambda: Arc<dyn LambdaOperations>,
    iam: Arc<dyn IamOperations>,
    config: Arc<DeployConfig>,
    layout: ParameterLayout,
    display_name: &'static str,
    function_name: String,
    locator: Locator,
    deployable: bool,
}

impl FunctionHandler {
    /// The WhatsApp tool behind the gateway target
    pub fn tool(
        lambda: Arc<dyn LambdaOperations>,
        iam: Arc<dyn IamOperations>,
        config: Arc<DeployConfig>,
    ) -> Self {
        let function_name = tool_function_name(&config.project);
        Self::build(lambda, iam, config, "ToolFunction", function_name, false)
    }

    /// The inbound WhatsApp message handler
    pub fn message_handler(
        lambda: Arc<dyn LambdaOperations>,
        iam: Arc<dyn IamOperations>,
        config: Arc<DeployConfig>,
    ) -> Self {
        let function_name = handler_function_name(&config.project);
        Self::build(lambda, iam, config, "HandlerFunction", function_name, true)
    }

    fn build(
        lambda: Arc<dyn LambdaOperations>,
        iam: Arc<dyn IamOperations>,
        config: Arc<DeployConfig>,
        display_name: &'static str,
        function_name: String,
        deployable: bool,
    ) -> Self {
        let layout = config.layout();
        Self {
            locator: Locator::Registry(layout.function(&function_name)),
            lambda,
            iam,
            config,
            layout,
            display_name,
            function_name,
            deployable,
        }
    }

    fn role_spec(&self) -> RoleSpec {
        let policy = serde_json::json!({
            "Version": "2012-10-17",
            "Statement": [
                {
                    "Effect": "Allow",
                    "Action": ["bedrock-agentcore:InvokeAgentRuntime"],
                    "Resource": "*"
                },
                {
                    "Effect": "Allow",
                    "Action": ["cognito-idp:ListUsers", "cognito-idp:AdminGetUser"],
                    "Resource": "*"
                }
            ]
        });
        RoleSpec {
            name: function_role_name(&self.function_name),
            description: format!("Execution role for {}", self.function_name),
            trust_policy: service_trust_policy(LAMBDA_SERVICE),
            managed_policies: vec![LAMBDA_BASIC_EXECUTION.to_string()],
            inline_policy: Some(("agentcore-invoke".to_string(), policy.to_string())),
        }
    }

    /// Output of an earlier step, falling back to the configured value
    fn upstream<'a>(
        &self,
        ctx: &'a DeployContext,
        key: &RegistryKey,
        fallback: Option<&'a str>,
    ) -> Result<&'a str, HandlerError> {
        ctx.get(key)
            .or(fallback)
            .ok_or_else(|| HandlerError::MissingOutput {
                handler: self.display_name.to_string(),
                key: key.name().to_string(),
            })
    }
}

#[async_trait]
impl ResourceHandler for FunctionHandler {
    fn name(&self) -> &str {
        self.display_name
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Function
    }

    fn locator(&self) -> &Locator {
        &self.locator
    }

    fn deployable(&self) -> bool {
        self.deployable
    }

    async fn exists(&self, id: &str) -> bool {
        match self.lambda.get_function(id).await {
            Ok(info) => info.is_some(),
            Err(e) => {
                debug!(function = %id, error = ?e, "Function lookup failed");
                false
            }
        }
    }

    async fn create(&self, ctx: &DeployContext) -> Result<Provisioned> {
        let runtime_arn = self.upstream(
            ctx,
            &self.layout.runtime_arn(),
            self.config.agent_runtime_arn.as_deref(),
        )?;
        let user_pool_id = self.upstream(
            ctx,
            &self.layout.end_user_pool_id(),
            self.config.user_pool_id.as_deref(),
        )?;

        let role_arn = self.iam.ensure_role(&self.role_spec(), ctx.cancel()).await?;

        let spec = FunctionSpec {
            name: self.function_name.clone(),
            role_arn,
            handler: "lambda_function.lambda_handler".to_string(),
            package: self.config.packages.handler.clone(),
            timeout_secs: 60,
            environment: vec![
                ("AGENT_RUNTIME_ARN".to_string(), runtime_arn.to_string()),
                ("USER_POOL_ID".to_string(), user_pool_id.to_string()),
                (
                    "WHATSAPP_PHONE_NUMBER_ID".to_string(),
                    self.config.whatsapp_phone_number_id.clone(),
                ),
            ],
        };
        let arn = self.lambda.ensure_function(&spec, ctx.cancel()).await?;
        Ok(Provisioned::new(arn))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.lambda.delete_function(id).await
    }

    async fn list_children(&self, id: &str) -> Result<Vec<Child>> {
        let Some(function) = self.lambda.get_function(id).await? else {
            return Ok(Vec::new());
        };
        let Some(role_arn) = function.role else {
            return Ok(Vec::new());
        };
        let role_name = role_name_from_arn(&role_arn)
            .with_context(|| format!("Unrecognised role ARN {role_arn}"))?;
        Ok(vec![Child::new(ChildKind::ExecutionRole, id, role_name)])
    }

    async fn list_nested(&self, child: &Child) -> Result<Vec<Child>> {
        match child.kind {
            ChildKind::ExecutionRole => policy_children(self.iam.as_ref(), &child.id).await,
            _ => Ok(Vec::new()),
        }
    }

    async fn delete_child(&self, child: &Child) -> Result<()> {
        if child.kind == ChildKind::ExecutionRole {
            return self.iam.delete_role(&child.id).await;
        }
        if delete_policy_child(self.iam.as_ref(), child).await? {
            Ok(())
        } else {
            anyhow::bail!("{} cannot delete {}", self.display_name, child)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::iam::{MockIamOperations, RolePolicies};
    use crate::aws::lambda::{FunctionInfo, MockLambdaOperations};
    use crate::handler::test_support::deploy_config;
    use mockall::predicate::eq;

    const ARN: &str = "arn:aws:lambda:us-east-1:123456789012:function:octank-whatsapp-handler";
    const ROLE: &str = "octank-whatsapp-handler-role";

    fn handler(lambda: MockLambdaOperations, iam: MockIamOperations) -> FunctionHandler {
        FunctionHandler::message_handler(Arc::new(lambda), Arc::new(iam), deploy_config())
    }

    #[tokio::test]
    async fn execution_role_is_the_only_child() {
        let mut lambda = MockLambdaOperations::new();
        lambda.expect_get_function().with(eq(ARN)).returning(|_| {
            Ok(Some(FunctionInfo {
                arn: ARN.into(),
                role: Some(format!("arn:aws:iam::123456789012:role/{ROLE}")),
            }))
        });

        let children = handler(lambda, MockIamOperations::new())
            .list_children(ARN)
            .await
            .unwrap();

        assert_eq!(children, [Child::new(ChildKind::ExecutionRole, ARN, ROLE)]);
    }

    #[tokio::test]
    async fn role_policies_nest_under_the_role() {
        let mut iam = MockIamOperations::new();
        iam.expect_list_role_policies().with(eq(ROLE)).returning(|_| {
            Ok(RolePolicies {
                attached: vec![LAMBDA_BASIC_EXECUTION.into()],
                inline: vec!["agentcore-invoke".into()],
            })
        });
        let handler = handler(MockLambdaOperations::new(), iam);

        let role = Child::new(ChildKind::ExecutionRole, ARN, ROLE);
        let nested = handler.list_nested(&role).await.unwrap();

        assert_eq!(
            nested,
            [
                Child::new(ChildKind::AttachedPolicy, ROLE, LAMBDA_BASIC_EXECUTION),
                Child::new(ChildKind::InlinePolicy, ROLE, "agentcore-invoke"),
            ]
        );
        let policy = Child::new(ChildKind::InlinePolicy, ROLE, "agentcore-invoke");
        assert!(handler.list_nested(&policy).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn role_and_its_policies_are_deleted_through_iam() {
        let mut iam = MockIamOperations::new();
        iam.expect_detach_policy()
            .with(eq(ROLE), eq(LAMBDA_BASIC_EXECUTION))
            .times(1)
            .returning(|_, _| Ok(()));
        iam.expect_delete_role()
            .with(eq(ROLE))
            .times(1)
            .returning(|_| Ok(()));
        let handler = handler(MockLambdaOperations::new(), iam);

        handler
            .delete_child(&Child::new(ChildKind::AttachedPolicy, ROLE, LAMBDA_BASIC_EXECUTION))
            .await
            .unwrap();
        handler
            .delete_child(&Child::new(ChildKind::ExecutionRole, ARN, ROLE))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn missing_function_has_no_children() {
        let mut lambda = MockLambdaOperations::new();
        lambda.expect_get_function().returning(|_| Ok(None));

        let children = handler(lambda, MockIamOperations::new())
            .list_children(ARN)
            .await
            .unwrap();

        assert!(children.is_empty());
    }

    #[tokio::test]
    async fn function_without_role_has_no_children() {
        let mut lambda = MockLambdaOperations::new();
        lambda.expect_get_function().returning(|_| {
            Ok(Some(FunctionInfo {
                arn: ARN.into(),
                role: None,
            }))
        });

        let children = handler(lambda, MockIamOperations::new())
            .list_children(ARN)
            .await
            .unwrap();

        assert!(children.is_empty());
    }

    #[tokio::test]
    async fn lookup_failure_reads_as_absent() {
        let mut lambda = MockLambdaOperations::new();
        lambda
            .expect_get_function()
            .returning(|_| Err(anyhow::anyhow!("throttled")));

        assert!(!handler(lambda, MockIamOperations::new()).exists(ARN).await);
    }

    #[tokio::test]
    async fn handler_environment_carries_the_end_user_pool() {
        let mut lambda = MockLambdaOperations::new();
        lambda
            .expect_ensure_function()
            .withf(|spec, _| {
                spec.environment
                    .iter()
                    .any(|(k, v)| k == "USER_POOL_ID" && v == "us-east-1_ENDUSER")
            })
            .returning(|_, _| Ok(ARN.into()));
        let mut iam = MockIamOperations::new();
        iam.expect_ensure_role()
            .withf(|spec, _| spec.name == ROLE)
            .returning(|_, _| Ok(format!("arn:aws:iam::123456789012:role/{ROLE}")));
        let handler = handler(lambda, iam);

        let layout = ParameterLayout::new("octank");
        let mut ctx = DeployContext::default();
        ctx.record(&layout.runtime_arn(), "arn:runtime/rt-1");
        ctx.record(&layout.end_user_pool_id(), "us-east-1_ENDUSER");

        let provisioned = handler.create(&ctx).await.unwrap();

        assert_eq!(provisioned.id, ARN);
    }
}
