//! S3 bucket and object management for knowledge base documents

use crate::aws::context::{AwsContext, FromAwsContext};
use crate::aws::error::{NotFoundExt, ignore_not_found};
use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration, Delete, ObjectIdentifier};
use std::path::Path;
use tracing::{debug, info};

/// Most keys accepted by one DeleteObjects call
pub const DELETE_BATCH_SIZE: usize = 1000;

/// S3 client for the knowledge base document bucket
#[derive(Clone)]
pub struct S3Client {
    client: Client,
    region: String,
}

impl FromAwsContext for S3Client {
    fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.s3_client(),
            region: ctx.region().to_string(),
        }
    }
}

impl S3Client {
    /// Check if a bucket exists and is reachable
    pub async fn bucket_exists(&self, bucket: &str) -> bool {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => true,
            Err(e) => {
                debug!(bucket = %bucket, error = ?e, "Bucket not reachable");
                false
            }
        }
    }

    /// Create a bucket unless it already exists
    pub async fn ensure_bucket(&self, bucket: &str) -> Result<()> {
        if self.bucket_exists(bucket).await {
            debug!(bucket = %bucket, "Reusing existing bucket");
            return Ok(());
        }

        info!(bucket = %bucket, region = %self.region, "Creating S3 bucket");

        let mut request = self.client.create_bucket().bucket(bucket);
        // us-east-1 rejects an explicit location constraint
        if self.region != "us-east-1" {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }

        request
            .send()
            .await
            .with_context(|| format!("Failed to create bucket {bucket}"))?;

        Ok(())
    }

    /// Upload a file to S3
    pub async fn upload_file(&self, bucket: &str, key: &str, path: &Path) -> Result<()> {
        debug!(bucket = %bucket, key = %key, path = %path.display(), "Uploading file");

        let body = ByteStream::from_path(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .with_context(|| format!("Failed to upload s3://{bucket}/{key}"))?;

        Ok(())
    }

    /// List every object key in a bucket. A missing bucket has no objects.
    pub async fn list_object_keys(&self, bucket: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut continuation_token = None;

        loop {
            let Some(response) = self
                .client
                .list_objects_v2()
                .bucket(bucket)
                .set_continuation_token(continuation_token.take())
                .send()
                .await
                .not_found_as_none()
                .context("Failed to list objects")?
            else {
                break;
            };

            keys.extend(
                response
                    .contents()
                    .iter()
                    .filter_map(|o| o.key())
                    .map(str::to_string),
            );

            if response.is_truncated() == Some(true) {
                continuation_token = response.next_continuation_token().map(str::to_string);
            } else {
                break;
            }
        }

        Ok(keys)
    }

    /// Delete up to [`DELETE_BATCH_SIZE`] objects in one call
    pub async fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }

        let objects = keys
            .iter()
            .map(|key| ObjectIdentifier::builder().key(key).build())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow::anyhow!("Failed to build object identifier: {}", e))?;

        let delete = Delete::builder()
            .set_objects(Some(objects))
            .quiet(true)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build delete request: {}", e))?;

        let response = self
            .client
            .delete_objects()
            .bucket(bucket)
            .delete(delete)
            .send()
            .await
            .context("Failed to delete objects")?;

        if let Some(first) = response.errors().first() {
            anyhow::bail!(
                "{} of {} objects not deleted (first: {} {})",
                response.errors().len(),
                keys.len(),
                first.key().unwrap_or("?"),
                first.message().unwrap_or("unknown error")
            );
        }

        debug!(bucket = %bucket, count = keys.len(), "Objects deleted");
        Ok(())
    }

    /// Delete a bucket. Objects must already be gone.
    pub async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        ignore_not_found(self.client.delete_bucket().bucket(bucket).send().await)
            .with_context(|| format!("Failed to delete bucket {bucket}"))?;
        info!(bucket = %bucket, "Bucket deleted");
        Ok(())
    }
}

/// ARN of a bucket
pub fn bucket_arn(bucket: &str) -> String {
    format!("arn:aws:s3:::{bucket}")
}

/// Bucket operations the resource handlers rely on
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StorageOperations: Send + Sync {
    async fn bucket_exists(&self, bucket: &str) -> bool;
    async fn ensure_bucket(&self, bucket: &str) -> Result<()>;
    async fn upload_file(&self, bucket: &str, key: &str, path: &Path) -> Result<()>;
    async fn list_object_keys(&self, bucket: &str) -> Result<Vec<String>>;
    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<()>;
    async fn delete_bucket(&self, bucket: &str) -> Result<()>;
}

#[async_trait]
impl StorageOperations for S3Client {
    async fn bucket_exists(&self, bucket: &str) -> bool {
        S3Client::bucket_exists(self, bucket).await
    }

    async fn ensure_bucket(&self, bucket: &str) -> Result<()> {
        S3Client::ensure_bucket(self, bucket).await
    }

    async fn upload_file(&self, bucket: &str, key: &str, path: &Path) -> Result<()> {
        S3Client::upload_file(self, bucket, key, path).await
    }

    async fn list_object_keys(&self, bucket: &str) -> Result<Vec<String>> {
        S3Client::list_object_keys(self, bucket).await
    }

    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<()> {
        S3Client::delete_objects(self, bucket, keys).await
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        S3Client::delete_bucket(self, bucket).await
    }
}
