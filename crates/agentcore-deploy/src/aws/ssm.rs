//! SSM Parameter Store backend for the registry

use crate::aws::context::{AwsContext, FromAwsContext};
use crate::aws::error::{NotFoundExt, ignore_not_found};
use crate::registry::ParameterStore;
use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_ssm::Client;
use aws_sdk_ssm::types::ParameterType;
use tracing::debug;

/// Registry backend storing each identifier as a `String` parameter
#[derive(Clone)]
pub struct SsmParameterStore {
    client: Client,
}

impl FromAwsContext for SsmParameterStore {
    fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.ssm_client(),
        }
    }
}

#[async_trait]
impl ParameterStore for SsmParameterStore {
    async fn get(&self, path: &str) -> Result<Option<String>> {
        let response = self
            .client
            .get_parameter()
            .name(path)
            .send()
            .await
            .not_found_as_none()
            .with_context(|| format!("Failed to read parameter {path}"))?;

        Ok(response
            .as_ref()
            .and_then(|r| r.parameter())
            .and_then(|p| p.value())
            .map(str::to_string))
    }

    async fn put(&self, path: &str, value: &str) -> Result<()> {
        // PutParameter rejects empty values
        anyhow::ensure!(
            !value.is_empty(),
            "SSM cannot store an empty value for {path}"
        );

        self.client
            .put_parameter()
            .name(path)
            .value(value)
            .r#type(ParameterType::String)
            .overwrite(true)
            .send()
            .await
            .with_context(|| format!("Failed to write parameter {path}"))?;

        debug!(path = %path, "Parameter stored");
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        ignore_not_found(self.client.delete_parameter().name(path).send().await)
            .with_context(|| format!("Failed to delete parameter {path}"))?;

        debug!(path = %path, "Parameter deleted");
        Ok(())
    }
}
