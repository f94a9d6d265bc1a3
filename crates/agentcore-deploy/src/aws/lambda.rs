//! Lambda function management

use crate::aws::context::{AwsContext, FromAwsContext};
use crate::aws::error::{NotFoundExt, ignore_not_found};
use crate::wait::{Readiness, WaitConfig, wait_until_ready};
use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_lambda::Client;
use aws_sdk_lambda::primitives::Blob;
use aws_sdk_lambda::types::{Environment, FunctionCode, Runtime};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Lambda client for the tool and message handler functions
#[derive(Clone)]
pub struct LambdaClient {
    client: Client,
}

/// A function to create if it does not already exist
#[derive(Debug, Clone)]
pub struct FunctionSpec {
    pub name: String,
    pub role_arn: String,
    pub handler: String,
    pub package: PathBuf,
    pub timeout_secs: i32,
    pub environment: Vec<(String, String)>,
}

/// What a deployed function looks like
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionInfo {
    pub arn: String,
    /// Execution role ARN
    pub role: Option<String>,
}

impl FromAwsContext for LambdaClient {
    fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.lambda_client(),
        }
    }
}

impl LambdaClient {
    /// Describe a function, or `None` if it does not exist
    pub async fn get_function(&self, name_or_arn: &str) -> Result<Option<FunctionInfo>> {
        let response = self
            .client
            .get_function()
            .function_name(name_or_arn)
            .send()
            .await
            .not_found_as_none()
            .with_context(|| format!("Failed to get function {name_or_arn}"))?;

        Ok(response
            .as_ref()
            .and_then(|r| r.configuration())
            .and_then(|c| {
                Some(FunctionInfo {
                    arn: c.function_arn()?.to_string(),
                    role: c.role().map(str::to_string),
                })
            }))
    }

    /// Get or create a function, returning its ARN once it is active.
    pub async fn ensure_function(
        &self,
        spec: &FunctionSpec,
        cancel: &CancellationToken,
    ) -> Result<String> {
        if let Some(existing) = self.get_function(&spec.name).await? {
            debug!(function = %spec.name, "Reusing existing function");
            return Ok(existing.arn);
        }

        let zip = tokio::fs::read(&spec.package)
            .await
            .with_context(|| format!("Failed to read function package {}", spec.package.display()))?;

        info!(function = %spec.name, package = %spec.package.display(), "Creating function");

        let environment = spec
            .environment
            .iter()
            .fold(Environment::builder(), |env, (k, v)| env.variables(k, v))
            .build();

        let response = self
            .client
            .create_function()
            .function_name(&spec.name)
            .runtime(Runtime::Python312)
            .role(&spec.role_arn)
            .handler(&spec.handler)
            .code(FunctionCode::builder().zip_file(Blob::new(zip)).build())
            .timeout(spec.timeout_secs)
            .environment(environment)
            .send()
            .await
            .with_context(|| format!("Failed to create function {}", spec.name))?;

        let arn = response
            .function_arn()
            .context("No function ARN returned from CreateFunction")?
            .to_string();

        let client = self.client.clone();
        let name = spec.name.clone();
        wait_until_ready(
            WaitConfig::default(),
            cancel,
            || {
                let client = client.clone();
                let name = name.clone();
                async move {
                    let config = client
                        .get_function_configuration()
                        .function_name(&name)
                        .send()
                        .await
                        .context("Failed to get function configuration")?;
                    let state = config.state().map(|s| s.as_str()).unwrap_or("Pending");
                    Ok(Readiness::from_status(state, &["Active"]))
                }
            },
            &spec.name,
        )
        .await?;

        info!(function = %spec.name, arn = %arn, "Function created");
        Ok(arn)
    }

    /// Delete a function
    pub async fn delete_function(&self, name_or_arn: &str) -> Result<()> {
        ignore_not_found(
            self.client
                .delete_function()
                .function_name(name_or_arn)
                .send()
                .await,
        )
        .with_context(|| format!("Failed to delete function {name_or_arn}"))?;
        info!(function = %name_or_arn, "Function deleted");
        Ok(())
    }
}

/// Role name from a role ARN (`arn:aws:iam::123:role/path/name` -> `name`)
pub fn role_name_from_arn(arn: &str) -> Option<&str> {
    arn.split_once(":role/")
        .and_then(|(_, path)| path.rsplit('/').next())
        .filter(|name| !name.is_empty())
}

/// Lambda operations the resource handlers rely on
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LambdaOperations: Send + Sync {
    async fn get_function(&self, name_or_arn: &str) -> Result<Option<FunctionInfo>>;
    async fn ensure_function(&self, spec: &FunctionSpec, cancel: &CancellationToken) -> Result<String>;
    async fn delete_function(&self, name_or_arn: &str) -> Result<()>;
}

#[async_trait]
impl LambdaOperations for LambdaClient {
    async fn get_function(&self, name_or_arn: &str) -> Result<Option<FunctionInfo>> {
        LambdaClient::get_function(self, name_or_arn).await
    }

    async fn ensure_function(&self, spec: &FunctionSpec, cancel: &CancellationToken) -> Result<String> {
        LambdaClient::ensure_function(self, spec, cancel).await
    }

    async fn delete_function(&self, name_or_arn: &str) -> Result<()> {
        LambdaClient::delete_function(self, name_or_arn).await
    }
}
