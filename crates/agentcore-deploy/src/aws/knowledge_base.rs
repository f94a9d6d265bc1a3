//! Bedrock knowledge bases and their data sources

use crate::aws::context::{AwsContext, FromAwsContext};
use crate::aws::error::{NotFoundExt, ignore_not_found};
use crate::wait::{Readiness, WaitConfig, wait_until_ready};
use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_bedrockagent::Client;
use aws_sdk_bedrockagent::types::{
    DataSourceConfiguration, DataSourceType, KnowledgeBaseConfiguration, KnowledgeBaseStorageType,
    KnowledgeBaseType, OpenSearchServerlessConfiguration, OpenSearchServerlessFieldMapping,
    S3DataSourceConfiguration, StorageConfiguration, VectorKnowledgeBaseConfiguration,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Field names Bedrock uses when it creates the vector index itself
const VECTOR_FIELD: &str = "bedrock-knowledge-base-default-vector";
const TEXT_FIELD: &str = "AMAZON_BEDROCK_TEXT_CHUNK";
const METADATA_FIELD: &str = "AMAZON_BEDROCK_METADATA";

/// Bedrock Agent client scoped to knowledge base operations
#[derive(Clone)]
pub struct KnowledgeBaseClient {
    client: Client,
}

/// A vector knowledge base stored in an OpenSearch Serverless collection
#[derive(Debug, Clone)]
pub struct KnowledgeBaseSpec {
    pub name: String,
    pub description: String,
    pub role_arn: String,
    pub embedding_model_arn: String,
    pub collection_arn: String,
    pub vector_index: String,
}

/// An S3 data source restricted to a key prefix
#[derive(Debug, Clone)]
pub struct DataSourceSpec {
    pub name: String,
    pub bucket_arn: String,
    pub prefix: String,
}

impl FromAwsContext for KnowledgeBaseClient {
    fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.bedrock_agent_client(),
        }
    }
}

impl KnowledgeBaseClient {
    /// Knowledge base status, or `None` if it does not exist
    pub async fn status(&self, knowledge_base_id: &str) -> Result<Option<String>> {
        let response = self
            .client
            .get_knowledge_base()
            .knowledge_base_id(knowledge_base_id)
            .send()
            .await
            .not_found_as_none()
            .with_context(|| format!("Failed to get knowledge base {knowledge_base_id}"))?;
        Ok(response
            .as_ref()
            .and_then(|r| r.knowledge_base())
            .map(|kb| kb.status().as_str().to_string()))
    }

    pub async fn exists(&self, knowledge_base_id: &str) -> bool {
        match self.status(knowledge_base_id).await {
            Ok(status) => status.is_some(),
            Err(e) => {
                debug!(knowledge_base_id = %knowledge_base_id, error = ?e, "Knowledge base lookup failed");
                false
            }
        }
    }

    /// Find a knowledge base by name
    pub async fn find(&self, name: &str) -> Result<Option<String>> {
        let mut next_token = None;
        loop {
            let response = self
                .client
                .list_knowledge_bases()
                .set_next_token(next_token.take())
                .send()
                .await
                .context("Failed to list knowledge bases")?;

            if let Some(kb) = response
                .knowledge_base_summaries()
                .iter()
                .find(|kb| kb.name() == name)
            {
                return Ok(Some(kb.knowledge_base_id().to_string()));
            }

            match response.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => return Ok(None),
            }
        }
    }

    /// Start creating the knowledge base, returning its ID
    pub async fn create(&self, spec: &KnowledgeBaseSpec) -> Result<String> {
        let knowledge_base = KnowledgeBaseConfiguration::builder()
            .r#type(KnowledgeBaseType::Vector)
            .vector_knowledge_base_configuration(
                VectorKnowledgeBaseConfiguration::builder()
                    .embedding_model_arn(&spec.embedding_model_arn)
                    .build()
                    .context("Failed to build vector configuration")?,
            )
            .build()
            .context("Failed to build knowledge base configuration")?;

        let field_mapping = OpenSearchServerlessFieldMapping::builder()
            .vector_field(VECTOR_FIELD)
            .text_field(TEXT_FIELD)
            .metadata_field(METADATA_FIELD)
            .build()
            .context("Failed to build field mapping")?;

        let storage = StorageConfiguration::builder()
            .r#type(KnowledgeBaseStorageType::OpensearchServerless)
            .opensearch_serverless_configuration(
                OpenSearchServerlessConfiguration::builder()
                    .collection_arn(&spec.collection_arn)
                    .vector_index_name(&spec.vector_index)
                    .field_mapping(field_mapping)
                    .build()
                    .context("Failed to build OpenSearch Serverless configuration")?,
            )
            .build()
            .context("Failed to build storage configuration")?;

        info!(knowledge_base = %spec.name, collection = %spec.collection_arn, "Creating knowledge base");

        let response = self
            .client
            .create_knowledge_base()
            .name(&spec.name)
            .description(&spec.description)
            .role_arn(&spec.role_arn)
            .knowledge_base_configuration(knowledge_base)
            .storage_configuration(storage)
            .send()
            .await
            .with_context(|| format!("Failed to create knowledge base {}", spec.name))?;

        response
            .knowledge_base()
            .map(|kb| kb.knowledge_base_id().to_string())
            .context("No knowledge base returned from CreateKnowledgeBase")
    }

    /// Wait until a knowledge base is ACTIVE
    pub async fn wait_until_active(&self, knowledge_base_id: &str, cancel: &CancellationToken) -> Result<()> {
        let client = self.clone();
        wait_until_ready(
            WaitConfig::default(),
            cancel,
            || {
                let client = client.clone();
                let id = knowledge_base_id.to_string();
                async move {
                    let status = client
                        .status(&id)
                        .await?
                        .unwrap_or_else(|| "CREATING".to_string());
                    Ok(Readiness::from_status(&status, &["ACTIVE"]))
                }
            },
            knowledge_base_id,
        )
        .await?;

        info!(knowledge_base_id = %knowledge_base_id, "Knowledge base active");
        Ok(())
    }

    pub async fn create_data_source(&self, knowledge_base_id: &str, spec: &DataSourceSpec) -> Result<String> {
        let s3 = S3DataSourceConfiguration::builder()
            .bucket_arn(&spec.bucket_arn)
            .inclusion_prefixes(&spec.prefix)
            .build()
            .context("Failed to build S3 data source configuration")?;
        let configuration = DataSourceConfiguration::builder()
            .r#type(DataSourceType::S3)
            .s3_configuration(s3)
            .build()
            .context("Failed to build data source configuration")?;

        let response = self
            .client
            .create_data_source()
            .knowledge_base_id(knowledge_base_id)
            .name(&spec.name)
            .data_source_configuration(configuration)
            .send()
            .await
            .with_context(|| format!("Failed to create data source {}", spec.name))?;

        let id = response
            .data_source()
            .map(|ds| ds.data_source_id().to_string())
            .context("No data source returned from CreateDataSource")?;
        info!(knowledge_base_id = %knowledge_base_id, data_source_id = %id, "Data source created");
        Ok(id)
    }

    /// Kick off ingestion; the job runs asynchronously and is not awaited
    pub async fn start_ingestion(&self, knowledge_base_id: &str, data_source_id: &str) -> Result<String> {
        let response = self
            .client
            .start_ingestion_job()
            .knowledge_base_id(knowledge_base_id)
            .data_source_id(data_source_id)
            .send()
            .await
            .context("Failed to start ingestion job")?;
        let job_id = response
            .ingestion_job()
            .map(|job| job.ingestion_job_id().to_string())
            .unwrap_or_default();
        info!(knowledge_base_id = %knowledge_base_id, ingestion_job_id = %job_id, "Ingestion started");
        Ok(job_id)
    }

    /// Data source IDs of a knowledge base. A missing knowledge base has none.
    pub async fn list_data_sources(&self, knowledge_base_id: &str) -> Result<Vec<String>> {
        let mut data_sources = Vec::new();
        let mut next_token = None;
        loop {
            let Some(response) = self
                .client
                .list_data_sources()
                .knowledge_base_id(knowledge_base_id)
                .set_next_token(next_token.take())
                .send()
                .await
                .not_found_as_none()
                .context("Failed to list data sources")?
            else {
                break;
            };

            data_sources.extend(
                response
                    .data_source_summaries()
                    .iter()
                    .map(|ds| ds.data_source_id().to_string()),
            );

            match response.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }
        Ok(data_sources)
    }

    pub async fn delete_data_source(&self, knowledge_base_id: &str, data_source_id: &str) -> Result<()> {
        ignore_not_found(
            self.client
                .delete_data_source()
                .knowledge_base_id(knowledge_base_id)
                .data_source_id(data_source_id)
                .send()
                .await,
        )
        .with_context(|| format!("Failed to delete data source {data_source_id}"))?;
        debug!(knowledge_base_id = %knowledge_base_id, data_source_id = %data_source_id, "Data source deleted");
        Ok(())
    }

    pub async fn delete(&self, knowledge_base_id: &str) -> Result<()> {
        ignore_not_found(
            self.client
                .delete_knowledge_base()
                .knowledge_base_id(knowledge_base_id)
                .send()
                .await,
        )
        .with_context(|| format!("Failed to delete knowledge base {knowledge_base_id}"))?;
        info!(knowledge_base_id = %knowledge_base_id, "Knowledge base deleted");
        Ok(())
    }
}

/// Knowledge base operations the resource handlers rely on
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KnowledgeBaseOperations: Send + Sync {
    async fn exists(&self, knowledge_base_id: &str) -> bool;
    async fn find(&self, name: &str) -> Result<Option<String>>;
    async fn create(&self, spec: &KnowledgeBaseSpec) -> Result<String>;
    async fn wait_until_active(&self, knowledge_base_id: &str, cancel: &CancellationToken) -> Result<()>;
    async fn create_data_source(&self, knowledge_base_id: &str, spec: &DataSourceSpec) -> Result<String>;
    async fn start_ingestion(&self, knowledge_base_id: &str, data_source_id: &str) -> Result<String>;
    async fn list_data_sources(&self, knowledge_base_id: &str) -> Result<Vec<String>>;
    async fn delete_data_source(&self, knowledge_base_id: &str, data_source_id: &str) -> Result<()>;
    async fn delete(&self, knowledge_base_id: &str) -> Result<()>;
}

#[async_trait]
impl KnowledgeBaseOperations for KnowledgeBaseClient {
    async fn exists(&self, knowledge_base_id: &str) -> bool {
        KnowledgeBaseClient::exists(self, knowledge_base_id).await
    }

    async fn find(&self, name: &str) -> Result<Option<String>> {
        KnowledgeBaseClient::find(self, name).await
    }

    async fn create(&self, spec: &KnowledgeBaseSpec) -> Result<String> {
        KnowledgeBaseClient::create(self, spec).await
    }

    async fn wait_until_active(&self, knowledge_base_id: &str, cancel: &CancellationToken) -> Result<()> {
        KnowledgeBaseClient::wait_until_active(self, knowledge_base_id, cancel).await
    }

    async fn create_data_source(&self, knowledge_base_id: &str, spec: &DataSourceSpec) -> Result<String> {
        KnowledgeBaseClient::create_data_source(self, knowledge_base_id, spec).await
    }

    async fn start_ingestion(&self, knowledge_base_id: &str, data_source_id: &str) -> Result<String> {
        KnowledgeBaseClient::start_ingestion(self, knowledge_base_id, data_source_id).await
    }

    async fn list_data_sources(&self, knowledge_base_id: &str) -> Result<Vec<String>> {
        KnowledgeBaseClient::list_data_sources(self, knowledge_base_id).await
    }

    async fn delete_data_source(&self, knowledge_base_id: &str, data_source_id: &str) -> Result<()> {
        KnowledgeBaseClient::delete_data_source(self, knowledge_base_id, data_source_id).await
    }

    async fn delete(&self, knowledge_base_id: &str) -> Result<()> {
        KnowledgeBaseClient::delete(self, knowledge_base_id).await
    }
}
