//! Standalone IAM roles (gateway and runtime)

use super::{Child, Locator, ResourceHandler};
use crate::aws::IamOperations;
use agentcore_deploy_common::{ChildKind, ResourceKind};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// A role created as a side effect of another step, found by its
/// deterministic name.
pub struct RoleHandler {
    iam: Arc<dyn IamOperations>,
    name: String,
    locator: Locator,
}

impl RoleHandler {
    pub fn new(iam: Arc<dyn IamOperations>, display_name: impl Into<String>, role_name: impl Into<String>) -> Self {
        Self {
            iam,
            name: display_name.into(),
            locator: Locator::Derived(role_name.into()),
        }
    }
}

/// Attached and inline policies of a role, as children of that role
pub(super) async fn policy_children(iam: &dyn IamOperations, role_name: &str) -> Result<Vec<Child>> {
    let policies = iam.list_role_policies(role_name).await?;
    Ok(policies
        .attached
        .into_iter()
        .map(|arn| Child::new(ChildKind::AttachedPolicy, role_name, arn))
        .chain(
            policies
                .inline
                .into_iter()
                .map(|name| Child::new(ChildKind::InlinePolicy, role_name, name)),
        )
        .collect())
}

/// Detach or delete a policy child. Returns `false` for other kinds.
pub(super) async fn delete_policy_child(iam: &dyn IamOperations, child: &Child) -> Result<bool> {
    match child.kind {
        ChildKind::AttachedPolicy => iam.detach_policy(&child.parent, &child.id).await?,
        ChildKind::InlinePolicy => iam.delete_inline_policy(&child.parent, &child.id).await?,
        _ => return Ok(false),
    }
    Ok(true)
}

#[async_trait]
impl ResourceHandler for RoleHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Role
    }

    fn locator(&self) -> &Locator {
        &self.locator
    }

    fn deployable(&self) -> bool {
        false
    }

    async fn exists(&self, id: &str) -> bool {
        self.iam.role_exists(id).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.iam.delete_role(id).await
    }

    async fn list_children(&self, id: &str) -> Result<Vec<Child>> {
        policy_children(self.iam.as_ref(), id).await
    }

    async fn delete_child(&self, child: &Child) -> Result<()> {
        if delete_policy_child(self.iam.as_ref(), child).await? {
            Ok(())
        } else {
            anyhow::bail!("{} cannot delete {}", self.name, child)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::iam::{MockIamOperations, RolePolicies};
    use mockall::predicate::eq;

    const ROLE: &str = "agentcore-octank-gateway-role";

    fn handler(iam: MockIamOperations) -> RoleHandler {
        RoleHandler::new(Arc::new(iam), "GatewayRole", ROLE)
    }

    #[tokio::test]
    async fn attached_policies_come_before_inline_ones() {
        let mut iam = MockIamOperations::new();
        iam.expect_list_role_policies().with(eq(ROLE)).returning(|_| {
            Ok(RolePolicies {
                attached: vec!["arn:aws:iam::aws:policy/ReadOnlyAccess".into()],
                inline: vec!["agentcore-gateway".into()],
            })
        });

        let children = handler(iam).list_children(ROLE).await.unwrap();

        assert_eq!(
            children,
            [
                Child::new(ChildKind::AttachedPolicy, ROLE, "arn:aws:iam::aws:policy/ReadOnlyAccess"),
                Child::new(ChildKind::InlinePolicy, ROLE, "agentcore-gateway"),
            ]
        );
    }

    #[tokio::test]
    async fn policies_are_detached_or_deleted_by_kind() {
        let mut iam = MockIamOperations::new();
        iam.expect_detach_policy()
            .with(eq(ROLE), eq("arn:aws:iam::aws:policy/ReadOnlyAccess"))
            .times(1)
            .returning(|_, _| Ok(()));
        iam.expect_delete_inline_policy()
            .with(eq(ROLE), eq("agentcore-gateway"))
            .times(1)
            .returning(|_, _| Ok(()));
        let handler = handler(iam);

        handler
            .delete_child(&Child::new(
                ChildKind::AttachedPolicy,
                ROLE,
                "arn:aws:iam::aws:policy/ReadOnlyAccess",
            ))
            .await
            .unwrap();
        handler
            .delete_child(&Child::new(ChildKind::InlinePolicy, ROLE, "agentcore-gateway"))
            .await
            .unwrap();
        assert!(
            handler
                .delete_child(&Child::new(ChildKind::BucketObject, ROLE, "key"))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn missing_role_has_no_policies() {
        let mut iam = MockIamOperations::new();
        iam.expect_list_role_policies()
            .returning(|_| Ok(RolePolicies::default()));

        assert!(handler(iam).list_children(ROLE).await.unwrap().is_empty());
    }
}
