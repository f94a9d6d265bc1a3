//! IAM role and policy management for gateways, runtimes and functions

use crate::aws::context::{AwsContext, FromAwsContext};
use crate::aws::error::{NotFoundExt, ignore_not_found};
use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_iam::Client;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Time for a new role to become assumable by other services
const ROLE_PROPAGATION_DELAY: Duration = Duration::from_secs(10);

/// IAM client for managing roles
#[derive(Clone)]
pub struct IamClient {
    client: Client,
}

/// A role to create if it does not already exist
#[derive(Debug, Clone)]
pub struct RoleSpec {
    pub name: String,
    pub description: String,
    pub trust_policy: String,
    pub managed_policies: Vec<String>,
    pub inline_policy: Option<(String, String)>,
}

/// Policies referenced by a role
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RolePolicies {
    /// ARNs of attached managed policies
    pub attached: Vec<String>,
    /// Names of inline policies
    pub inline: Vec<String>,
}

/// Trust policy allowing one service principal to assume a role
pub fn service_trust_policy(service: &str) -> String {
    serde_json::json!({
        "Version": "2012-10-17",
        "Statement": [
            {
                "Effect": "Allow",
                "Principal": { "Service": service },
                "Action": "sts:AssumeRole"
            }
        ]
    })
    .to_string()
}

impl FromAwsContext for IamClient {
    fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.iam_client(),
        }
    }
}

impl IamClient {
    /// ARN of a role, or `None` if the role does not exist
    pub async fn role_arn(&self, role_name: &str) -> Result<Option<String>> {
        let response = self
            .client
            .get_role()
            .role_name(role_name)
            .send()
            .await
            .not_found_as_none()
            .with_context(|| format!("Failed to get IAM role {role_name}"))?;

        Ok(response
            .as_ref()
            .and_then(|r| r.role())
            .map(|role| role.arn().to_string()))
    }

    /// Check if a role exists
    pub async fn role_exists(&self, role_name: &str) -> bool {
        match self.role_arn(role_name).await {
            Ok(arn) => arn.is_some(),
            Err(e) => {
                debug!(role_name = %role_name, error = ?e, "Role lookup failed");
                false
            }
        }
    }

    /// Get or create a role, returning its ARN.
    ///
    /// A newly created role is given time to propagate before returning so
    /// the caller can hand it to another service straight away.
    pub async fn ensure_role(&self, spec: &RoleSpec, cancel: &CancellationToken) -> Result<String> {
        if let Some(arn) = self.role_arn(&spec.name).await? {
            debug!(role_name = %spec.name, "Reusing existing IAM role");
            return Ok(arn);
        }

        info!(role_name = %spec.name, "Creating IAM role");

        let response = self
            .client
            .create_role()
            .role_name(&spec.name)
            .assume_role_policy_document(&spec.trust_policy)
            .description(&spec.description)
            .send()
            .await
            .with_context(|| format!("Failed to create IAM role {}", spec.name))?;

        let arn = response
            .role()
            .map(|role| role.arn().to_string())
            .context("No role returned from CreateRole")?;

        for policy_arn in &spec.managed_policies {
            self.client
                .attach_role_policy()
                .role_name(&spec.name)
                .policy_arn(policy_arn)
                .send()
                .await
                .with_context(|| format!("Failed to attach {policy_arn} to {}", spec.name))?;
            debug!(role_name = %spec.name, policy_arn = %policy_arn, "Managed policy attached");
        }

        if let Some((policy_name, document)) = &spec.inline_policy {
            self.client
                .put_role_policy()
                .role_name(&spec.name)
                .policy_name(policy_name)
                .policy_document(document)
                .send()
                .await
                .with_context(|| format!("Failed to put inline policy on {}", spec.name))?;
            debug!(role_name = %spec.name, policy_name = %policy_name, "Inline policy attached");
        }

        tokio::select! {
            _ = tokio::time::sleep(ROLE_PROPAGATION_DELAY) => {}
            _ = cancel.cancelled() => anyhow::bail!("Cancelled while waiting for role {} to propagate", spec.name),
        }

        info!(role_name = %spec.name, arn = %arn, "IAM role created");
        Ok(arn)
    }

    /// List the managed and inline policies of a role.
    ///
    /// A missing role has no policies.
    pub async fn list_role_policies(&self, role_name: &str) -> Result<RolePolicies> {
        let mut policies = RolePolicies::default();

        let mut marker: Option<String> = None;
        loop {
            let Some(page) = self
                .client
                .list_attached_role_policies()
                .role_name(role_name)
                .set_marker(marker.take())
                .send()
                .await
                .not_found_as_none()
                .context("Failed to list attached role policies")?
            else {
                return Ok(policies);
            };

            policies.attached.extend(
                page.attached_policies()
                    .iter()
                    .filter_map(|p| p.policy_arn())
                    .map(str::to_string),
            );

            if !page.is_truncated() {
                break;
            }
            marker = page.marker().map(str::to_string);
        }

        loop {
            let Some(page) = self
                .client
                .list_role_policies()
                .role_name(role_name)
                .set_marker(marker.take())
                .send()
                .await
                .not_found_as_none()
                .context("Failed to list inline role policies")?
            else {
                break;
            };

            policies.inline.extend(page.policy_names().iter().cloned());

            if !page.is_truncated() {
                break;
            }
            marker = page.marker().map(str::to_string);
        }

        Ok(policies)
    }

    /// Detach a managed policy from a role
    pub async fn detach_policy(&self, role_name: &str, policy_arn: &str) -> Result<()> {
        ignore_not_found(
            self.client
                .detach_role_policy()
                .role_name(role_name)
                .policy_arn(policy_arn)
                .send()
                .await,
        )
        .with_context(|| format!("Failed to detach {policy_arn} from {role_name}"))?;
        debug!(role_name = %role_name, policy_arn = %policy_arn, "Managed policy detached");
        Ok(())
    }

    /// Delete an inline policy from a role
    pub async fn delete_inline_policy(&self, role_name: &str, policy_name: &str) -> Result<()> {
        ignore_not_found(
            self.client
                .delete_role_policy()
                .role_name(role_name)
                .policy_name(policy_name)
                .send()
                .await,
        )
        .with_context(|| format!("Failed to delete inline policy {policy_name} from {role_name}"))?;
        debug!(role_name = %role_name, policy_name = %policy_name, "Inline policy deleted");
        Ok(())
    }

    /// Delete a role. Policies must already be gone.
    pub async fn delete_role(&self, role_name: &str) -> Result<()> {
        ignore_not_found(self.client.delete_role().role_name(role_name).send().await)
            .with_context(|| format!("Failed to delete IAM role {role_name}"))?;
        info!(role_name = %role_name, "IAM role deleted");
        Ok(())
    }
}

/// IAM operations the resource handlers rely on
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IamOperations: Send + Sync {
    async fn role_exists(&self, role_name: &str) -> bool;
    async fn ensure_role(&self, spec: &RoleSpec, cancel: &CancellationToken) -> Result<String>;
    async fn list_role_policies(&self, role_name: &str) -> Result<RolePolicies>;
    async fn detach_policy(&self, role_name: &str, policy_arn: &str) -> Result<()>;
    async fn delete_inline_policy(&self, role_name: &str, policy_name: &str) -> Result<()>;
    async fn delete_role(&self, role_name: &str) -> Result<()>;
}

#[async_trait]
impl IamOperations for IamClient {
    async fn role_exists(&self, role_name: &str) -> bool {
        IamClient::role_exists(self, role_name).await
    }

    async fn ensure_role(&self, spec: &RoleSpec, cancel: &CancellationToken) -> Result<String> {
        IamClient::ensure_role(self, spec, cancel).await
    }

    async fn list_role_policies(&self, role_name: &str) -> Result<RolePolicies> {
        IamClient::list_role_policies(self, role_name).await
    }

    async fn detach_policy(&self, role_name: &str, policy_arn: &str) -> Result<()> {
        IamClient::detach_policy(self, role_name, policy_arn).await
    }

    async fn delete_inline_policy(&self, role_name: &str, policy_name: &str) -> Result<()> {
        IamClient::delete_inline_policy(self, role_name, policy_name).await
    }

    async fn delete_role(&self, role_name: &str) -> Result<()> {
        IamClient::delete_role(self, role_name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trust_policy_names_service() {
        let policy: serde_json::Value =
            serde_json::from_str(&service_trust_policy("lambda.amazonaws.com")).unwrap();
        assert_eq!(
            policy["Statement"][0]["Principal"]["Service"],
            "lambda.amazonaws.com"
        );
        assert_eq!(policy["Statement"][0]["Action"], "sts:AssumeRole");
    }
}
