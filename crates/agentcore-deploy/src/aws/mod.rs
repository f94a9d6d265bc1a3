//! AWS client modules for the deployer
//!
//! This module provides wrappers around AWS SDK clients for:
//! - AgentCore control plane: runtimes, gateways, gateway targets, memories
//! - Bedrock Agent: knowledge bases and data sources
//! - Cognito: user pools, clients, resource servers and domains
//! - IAM: roles and their policies
//! - Lambda: tool and handler functions
//! - S3: knowledge base document bucket
//! - SSM: the parameter store backing the registry
//! - STS: account ID lookup

pub mod account;
pub mod agentcore;
pub mod cognito;
pub mod context;
pub mod error;
pub mod iam;
pub mod knowledge_base;
pub mod lambda;
pub mod s3;
pub mod ssm;

// Core clients
pub use account::{AccountId, get_current_account_id};
pub use agentcore::{AgentCoreClient, AgentCoreOperations};
pub use cognito::{CognitoClient, CognitoOperations};
pub use context::{AwsContext, FromAwsContext};
pub use iam::{IamClient, IamOperations};
pub use knowledge_base::{KnowledgeBaseClient, KnowledgeBaseOperations};
pub use lambda::{LambdaClient, LambdaOperations};
pub use s3::{S3Client, StorageOperations};
pub use ssm::SsmParameterStore;

// Error handling
pub use error::{AwsError, NotFoundExt, classify_aws_error, classify_sdk_error, ignore_not_found};
