//! Bedrock knowledge base over the document bucket

use super::{Child, DeployContext, Locator, Provisioned, ResourceHandler};
use crate::aws::knowledge_base::{DataSourceSpec, KnowledgeBaseSpec};
use crate::aws::s3::bucket_arn;
use crate::aws::{KnowledgeBaseOperations, StorageOperations};
use crate::config::DeployConfig;
use agentcore_deploy_common::defaults::knowledge_base_name;
use agentcore_deploy_common::{ChildKind, ResourceKind};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Key prefix documents are uploaded under and the data source reads from
const DOCUMENTS_PREFIX: &str = "documents/";

pub struct KnowledgeBaseHandler {
    kb: Arc<dyn KnowledgeBaseOperations>,
    s3: Arc<dyn StorageOperations>,
    config: Arc<DeployConfig>,
    bucket: String,
    locator: Locator,
}

impl KnowledgeBaseHandler {
    pub fn new(
        kb: Arc<dyn KnowledgeBaseOperations>,
        s3: Arc<dyn StorageOperations>,
        config: Arc<DeployConfig>,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            locator: Locator::Registry(config.layout().knowledge_base_id()),
            kb,
            s3,
            config,
            bucket: bucket.into(),
        }
    }

    /// Upload every `*.txt` document, returning how many were uploaded
    async fn upload_documents(&self) -> Result<usize> {
        let documents = text_documents(&self.config.knowledge_base.docs_dir).await?;
        if documents.is_empty() {
            warn!(
                dir = %self.config.knowledge_base.docs_dir.display(),
                "No knowledge base documents found"
            );
        }
        for path in &documents {
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let key = format!("{DOCUMENTS_PREFIX}{file_name}");
            self.s3.upload_file(&self.bucket, &key, path).await?;
        }
        Ok(documents.len())
    }
}

/// `*.txt` files directly inside `dir`, sorted by name
async fn text_documents(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("Failed to read document directory {}", dir.display()))?;

    let mut documents = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "txt") && entry.file_type().await?.is_file() {
            documents.push(path);
        }
    }
    documents.sort();
    Ok(documents)
}

#[async_trait]
impl ResourceHandler for KnowledgeBaseHandler {
    fn name(&self) -> &str {
        "KnowledgeBase"
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::KnowledgeBase
    }

    fn locator(&self) -> &Locator {
        &self.locator
    }

    async fn exists(&self, id: &str) -> bool {
        self.kb.exists(id).await
    }

    async fn create(&self, ctx: &DeployContext) -> Result<Provisioned> {
        let inputs = self.config.inputs()?;
        let settings = &self.config.knowledge_base;
        let name = knowledge_base_name(&self.config.project);

        self.s3.ensure_bucket(&self.bucket).await?;
        let uploaded = self.upload_documents().await?;
        info!(bucket = %self.bucket, documents = uploaded, "Knowledge base documents uploaded");

        let id = match self.kb.find(&name).await? {
            Some(id) => {
                info!(knowledge_base = %name, knowledge_base_id = %id, "Finishing existing knowledge base");
                id
            }
            None => {
                self.kb
                    .create(&KnowledgeBaseSpec {
                        name: name.clone(),
                        description: "Course and institutional documents for the assistant"
                            .to_string(),
                        role_arn: inputs.kb_role_arn.clone(),
                        embedding_model_arn: settings.embedding_model_arn.clone(),
                        collection_arn: inputs.kb_collection_arn.clone(),
                        vector_index: settings.vector_index.clone(),
                    })
                    .await?
            }
        };
        ctx.claim(&self.config.layout().knowledge_base_id(), &id);
        self.kb.wait_until_active(&id, ctx.cancel()).await?;

        let data_source = match self.kb.list_data_sources(&id).await?.into_iter().next() {
            Some(existing) => existing,
            None => {
                self.kb
                    .create_data_source(
                        &id,
                        &DataSourceSpec {
                            name: format!("{name}-documents"),
                            bucket_arn: bucket_arn(&self.bucket),
                            prefix: DOCUMENTS_PREFIX.to_string(),
                        },
                    )
                    .await?
            }
        };
        self.kb.start_ingestion(&id, &data_source).await?;

        Ok(Provisioned::new(id))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.kb.delete(id).await
    }

    async fn list_children(&self, id: &str) -> Result<Vec<Child>> {
        Ok(self
            .kb
            .list_data_sources(id)
            .await?
            .into_iter()
            .map(|ds| Child::new(ChildKind::DataSource, id, ds))
            .collect())
    }

    async fn delete_child(&self, child: &Child) -> Result<()> {
        anyhow::ensure!(
            child.kind == ChildKind::DataSource,
            "KnowledgeBase cannot delete {}",
            child
        );
        self.kb.delete_data_source(&child.parent, &child.id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::knowledge_base::MockKnowledgeBaseOperations;
    use crate::aws::s3::MockStorageOperations;
    use crate::handler::test_support::deploy_config;
    use mockall::predicate::eq;

    const BUCKET: &str = "octank-kb-123456789012";

    /// Handler reading documents from `docs`
    fn handler(kb: MockKnowledgeBaseOperations, s3: MockStorageOperations, docs: &Path) -> KnowledgeBaseHandler {
        let mut config = (*deploy_config()).clone();
        config.knowledge_base.docs_dir = docs.to_path_buf();
        KnowledgeBaseHandler::new(Arc::new(kb), Arc::new(s3), Arc::new(config), BUCKET)
    }

    fn storage() -> MockStorageOperations {
        let mut s3 = MockStorageOperations::new();
        s3.expect_ensure_bucket().with(eq(BUCKET)).returning(|_| Ok(()));
        s3.expect_upload_file()
            .withf(|bucket, key, _| bucket == BUCKET && key == "documents/syllabus.txt")
            .times(1)
            .returning(|_, _, _| Ok(()));
        s3
    }

    fn documents() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("syllabus.txt"), "Week 1").unwrap();
        dir
    }

    #[tokio::test]
    async fn only_text_files_are_documents() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "b").unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        std::fs::write(dir.path().join("notes.md"), "skip").unwrap();
        std::fs::create_dir(dir.path().join("nested.txt")).unwrap();

        let documents = text_documents(dir.path()).await.unwrap();
        let names: Vec<_> = documents
            .iter()
            .filter_map(|p| p.file_name()?.to_str())
            .collect();
        assert_eq!(names, ["a.txt", "b.txt"]);
    }

    #[tokio::test]
    async fn missing_document_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(text_documents(&dir.path().join("absent")).await.is_err());
    }

    #[tokio::test]
    async fn knowledge_base_is_claimed_before_it_is_active() {
        let docs = documents();
        let mut kb = MockKnowledgeBaseOperations::new();
        kb.expect_find().returning(|_| Ok(None));
        kb.expect_create().returning(|_| Ok("KB123".into()));
        kb.expect_wait_until_active()
            .returning(|_, _| Err(anyhow::anyhow!("knowledge base KB123 failed")));
        kb.expect_create_data_source().never();
        let handler = handler(kb, storage(), docs.path());

        let mut ctx = DeployContext::default();
        assert!(handler.create(&ctx).await.is_err());

        let claims = ctx.take_claims();
        let claims: Vec<_> = claims.iter().map(|(k, v)| (k.name(), v.as_str())).collect();
        assert_eq!(claims, [("knowledge_base_id", "KB123")]);
    }

    #[tokio::test]
    async fn existing_data_source_is_ingested_again() {
        let docs = documents();
        let mut kb = MockKnowledgeBaseOperations::new();
        kb.expect_find().returning(|_| Ok(Some("KB123".into())));
        kb.expect_create().never();
        kb.expect_wait_until_active().returning(|_, _| Ok(()));
        kb.expect_list_data_sources()
            .with(eq("KB123"))
            .returning(|_| Ok(vec!["DS1".into()]));
        kb.expect_create_data_source().never();
        kb.expect_start_ingestion()
            .with(eq("KB123"), eq("DS1"))
            .times(1)
            .returning(|_, _| Ok("JOB1".into()));
        let handler = handler(kb, storage(), docs.path());

        assert_eq!(handler.create(&DeployContext::default()).await.unwrap().id, "KB123");
    }

    #[tokio::test]
    async fn data_sources_are_the_children() {
        let mut kb = MockKnowledgeBaseOperations::new();
        kb.expect_list_data_sources()
            .with(eq("KB123"))
            .returning(|_| Ok(vec!["DS1".into()]));
        kb.expect_list_data_sources()
            .with(eq("KBGONE"))
            .returning(|_| Ok(vec![]));
        kb.expect_delete_data_source()
            .with(eq("KB123"), eq("DS1"))
            .times(1)
            .returning(|_, _| Ok(()));
        let docs = documents();
        let handler = handler(kb, MockStorageOperations::new(), docs.path());

        let children = handler.list_children("KB123").await.unwrap();
        assert_eq!(children, [Child::new(ChildKind::DataSource, "KB123", "DS1")]);
        assert!(handler.list_children("KBGONE").await.unwrap().is_empty());
        handler.delete_child(&children[0]).await.unwrap();
    }
}
