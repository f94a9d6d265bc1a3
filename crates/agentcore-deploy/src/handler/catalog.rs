//! The full set of handlers for one deployment

use super::{
    FunctionHandler, GatewayHandler, IdentityPoolHandler, KnowledgeBaseHandler, MemoryHandler,
    ResourceHandler, RoleHandler, RuntimeHandler, StorageBucketHandler,
};
use crate::aws::{
    AccountId, AgentCoreClient, AgentCoreOperations, AwsContext, CognitoClient,
    CognitoOperations, FromAwsContext, IamClient, IamOperations, KnowledgeBaseClient,
    KnowledgeBaseOperations, LambdaClient, LambdaOperations, S3Client, StorageOperations,
};
use crate::config::DeployConfig;
use agentcore_deploy_common::defaults::{bucket_name, gateway_role_name, runtime_role_name};
use std::sync::Arc;

/// Handlers in teardown order. The orchestrator derives both plans from it.
pub type Catalog = Vec<Box<dyn ResourceHandler>>;

pub fn build_catalog(aws: &AwsContext, config: Arc<DeployConfig>, account: &AccountId) -> Catalog {
    let agentcore: Arc<dyn AgentCoreOperations> = Arc::new(AgentCoreClient::from_context(aws));
    let cognito: Arc<dyn CognitoOperations> = Arc::new(CognitoClient::from_context(aws));
    let iam: Arc<dyn IamOperations> = Arc::new(IamClient::from_context(aws));
    let lambda: Arc<dyn LambdaOperations> = Arc::new(LambdaClient::from_context(aws));
    let s3: Arc<dyn StorageOperations> = Arc::new(S3Client::from_context(aws));
    let kb: Arc<dyn KnowledgeBaseOperations> = Arc::new(KnowledgeBaseClient::from_context(aws));
    let bucket = bucket_name(config.region(), account);
    let project = config.project.clone();

    vec![
        Box::new(RuntimeHandler::new(agentcore.clone(), iam.clone(), config.clone())),
        Box::new(GatewayHandler::new(
            agentcore.clone(),
            cognito.clone(),
            iam.clone(),
            lambda.clone(),
            config.clone(),
        )),
        Box::new(FunctionHandler::tool(lambda.clone(), iam.clone(), config.clone())),
        Box::new(FunctionHandler::message_handler(lambda, iam.clone(), config.clone())),
        Box::new(IdentityPoolHandler::end_user(cognito.clone(), config.clone())),
        Box::new(IdentityPoolHandler::gateway_authorizer(cognito, config.clone())),
        Box::new(RoleHandler::new(iam.clone(), "GatewayRole", gateway_role_name(&project))),
        Box::new(RoleHandler::new(iam, "RuntimeRole", runtime_role_name(&project))),
        Box::new(KnowledgeBaseHandler::new(
            kb,
            s3.clone(),
            config.clone(),
            bucket.clone(),
        )),
        Box::new(StorageBucketHandler::new(s3, bucket)),
        Box::new(MemoryHandler::new(agentcore, config)),
    ]
}
