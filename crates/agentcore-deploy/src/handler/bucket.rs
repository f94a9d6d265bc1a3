//! Knowledge base document bucket

use super::{Child, Locator, ResourceHandler};
use crate::aws::StorageOperations;
use crate::aws::s3::DELETE_BATCH_SIZE;
use agentcore_deploy_common::{ChildKind, ResourceKind};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// The bucket is created by the knowledge base step and found by its
/// derived name. Objects are removed with batched bulk deletes.
pub struct StorageBucketHandler {
    s3: Arc<dyn StorageOperations>,
    locator: Locator,
}

impl StorageBucketHandler {
    pub fn new(s3: Arc<dyn StorageOperations>, bucket: impl Into<String>) -> Self {
        Self {
            s3,
            locator: Locator::Derived(bucket.into()),
        }
    }
}

#[async_trait]
impl ResourceHandler for StorageBucketHandler {
    fn name(&self) -> &str {
        "StorageBucket"
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::StorageBucket
    }

    fn locator(&self) -> &Locator {
        &self.locator
    }

    fn deployable(&self) -> bool {
        false
    }

    async fn exists(&self, id: &str) -> bool {
        self.s3.bucket_exists(id).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.s3.delete_bucket(id).await
    }

    async fn list_children(&self, id: &str) -> Result<Vec<Child>> {
        Ok(self
            .s3
            .list_object_keys(id)
            .await?
            .into_iter()
            .map(|key| Child::new(ChildKind::BucketObject, id, key))
            .collect())
    }

    async fn delete_child(&self, child: &Child) -> Result<()> {
        self.delete_children(std::slice::from_ref(child)).await
    }

    fn batch_size(&self, kind: ChildKind) -> usize {
        match kind {
            ChildKind::BucketObject => DELETE_BATCH_SIZE,
            _ => 1,
        }
    }

    async fn delete_children(&self, children: &[Child]) -> Result<()> {
        let Some(first) = children.first() else {
            return Ok(());
        };
        anyhow::ensure!(
            children
                .iter()
                .all(|c| c.kind == ChildKind::BucketObject && c.parent == first.parent),
            "StorageBucket can only bulk delete objects of one bucket"
        );
        let keys: Vec<String> = children.iter().map(|c| c.id.clone()).collect();
        self.s3.delete_objects(&first.parent, &keys).await
    }
}
