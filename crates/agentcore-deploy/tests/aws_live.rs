//! Tests against a real AWS account
//!
//! Run with:
//! ```
//! AWS_PROFILE=your_profile cargo test --test aws_live -- --ignored
//! ```

use agentcore_deploy::aws::{AwsContext, FromAwsContext, SsmParameterStore, get_current_account_id};
use agentcore_deploy::config::DeployConfig;
use agentcore_deploy::handler::build_catalog;
use agentcore_deploy::orchestrator::{Deployment, status};
use agentcore_deploy::registry::Registry;
use agentcore_deploy_common::{EnvFile, ParameterLayout};
use agentcore_deploy_test_utils::{get_test_region, test_project};
use std::sync::Arc;

#[tokio::test]
#[ignore]
async fn ssm_registry_round_trip() {
    let ctx = AwsContext::new(&get_test_region()).await;
    let registry = Registry::new(Arc::new(SsmParameterStore::from_context(&ctx)));
    let key = ParameterLayout::new(test_project()).gateway_id();

    assert_eq!(registry.get(key.canonical()).await, None);

    registry.store(&key, "gw-live-test").await;
    assert_eq!(registry.get(key.canonical()).await.as_deref(), Some("gw-live-test"));

    let summary = registry.purge(std::slice::from_ref(&key)).await;
    assert_eq!(summary.found, 1);
    assert_eq!(registry.get(key.canonical()).await, None);
}

#[tokio::test]
#[ignore]
async fn fresh_project_is_not_deployed() {
    let region = get_test_region();
    let env = EnvFile::default().with_overrides([("AWS_REGION", region.clone()), ("PROJECT", test_project())]);
    let config = Arc::new(DeployConfig::from_env(&env).expect("Should build config"));

    let ctx = AwsContext::new(&region).await;
    let account = get_current_account_id(&ctx).await.expect("Should resolve account");
    let registry = Registry::new(Arc::new(SsmParameterStore::from_context(&ctx)));
    let catalog = build_catalog(&ctx, config, &account);

    let entries = status(&catalog, &registry).await;
    assert_eq!(entries.len(), catalog.len());
    // The bucket is named per account, not per project
    for entry in entries.iter().filter(|e| e.name != "StorageBucket") {
        assert_eq!(entry.deployment, Deployment::NotDeployed, "{} should not exist", entry.name);
    }
}
