//! AgentCore runtime hosting the assistant container

use super::{DeployContext, Locator, Provisioned, ResourceHandler};
use crate::aws::agentcore::RuntimeSpec;
use crate::aws::iam::{RoleSpec, service_trust_policy};
use crate::aws::{AgentCoreOperations, IamOperations};
use crate::config::DeployConfig;
use agentcore_deploy_common::defaults::{runtime_name, runtime_role_name};
use agentcore_deploy_common::{ParameterLayout, RegistryKey, ResourceKind};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

const AGENTCORE_SERVICE: &str = "bedrock-agentcore.amazonaws.com";

pub struct RuntimeHandler {
    agentcore: Arc<dyn AgentCoreOperations>,
    iam: Arc<dyn IamOperations>,
    config: Arc<DeployConfig>,
    layout: ParameterLayout,
    locator: Locator,
}

impl RuntimeHandler {
    pub fn new(
        agentcore: Arc<dyn AgentCoreOperations>,
        iam: Arc<dyn IamOperations>,
        config: Arc<DeployConfig>,
    ) -> Self {
        let layout = config.layout();
        Self {
            locator: Locator::Registry(layout.runtime_id()),
            agentcore,
            iam,
            config,
            layout,
        }
    }

    fn role_spec(&self) -> RoleSpec {
        let policy = serde_json::json!({
            "Version": "2012-10-17",
            "Statement": [
                {
                    "Effect": "Allow",
                    "Action": [
                        "bedrock:InvokeModel",
                        "bedrock:InvokeModelWithResponseStream",
                        "bedrock:Retrieve",
                        "bedrock-agentcore:*",
                        "ecr:BatchGetImage",
                        "ecr:GetDownloadUrlForLayer",
                        "ecr:GetAuthorizationToken",
                        "logs:CreateLogGroup",
                        "logs:CreateLogStream",
                        "logs:PutLogEvents",
                        "xray:PutTraceSegments",
                        "cloudwatch:PutMetricData"
                    ],
                    "Resource": "*"
                }
            ]
        });
        RoleSpec {
            name: runtime_role_name(&self.config.project),
            description: "Execution role for the AgentCore runtime".to_string(),
            trust_policy: service_trust_policy(AGENTCORE_SERVICE),
            managed_policies: Vec::new(),
            inline_policy: Some(("agentcore-runtime".to_string(), policy.to_string())),
        }
    }
}

#[async_trait]
impl ResourceHandler for RuntimeHandler {
    fn name(&self) -> &str {
        "Runtime"
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Runtime
    }

    fn locator(&self) -> &Locator {
        &self.locator
    }

    fn auxiliary_keys(&self) -> Vec<RegistryKey> {
        vec![self.layout.runtime_arn()]
    }

    async fn exists(&self, id: &str) -> bool {
        self.agentcore.runtime_exists(id).await
    }

    async fn create(&self, ctx: &DeployContext) -> Result<Provisioned> {
        let inputs = self.config.inputs()?;
        let memory_id = ctx.require(self.name(), &self.layout.memory_id())?;
        let gateway_url = ctx.require(self.name(), &self.layout.gateway_url())?;

        let name = runtime_name(&self.config.project);
        let runtime = match self.agentcore.find_runtime(&name).await? {
            Some(runtime) => {
                info!(runtime = %name, runtime_id = %runtime.id, "Finishing existing runtime");
                runtime
            }
            None => {
                let role_arn = self.iam.ensure_role(&self.role_spec(), ctx.cancel()).await?;
                let spec = RuntimeSpec {
                    name,
                    container_uri: inputs.agent_container_uri.clone(),
                    role_arn,
                    environment: vec![
                        ("MEMORY_ID".to_string(), memory_id.to_string()),
                        ("GATEWAY_URL".to_string(), gateway_url.to_string()),
                        (
                            "WHATSAPP_PHONE_NUMBER_ID".to_string(),
                            self.config.whatsapp_phone_number_id.clone(),
                        ),
                        ("AWS_REGION".to_string(), self.config.region().to_string()),
                    ],
                };
                self.agentcore.create_runtime(&spec).await?
            }
        };
        ctx.claim(&self.layout.runtime_id(), &runtime.id);
        ctx.claim(&self.layout.runtime_arn(), &runtime.arn);
        self.agentcore.wait_for_runtime(&runtime.id, ctx.cancel()).await?;

        Ok(Provisioned::new(runtime.id).with_output(self.layout.runtime_arn(), runtime.arn))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.agentcore.delete_runtime(id).await
    }
}
