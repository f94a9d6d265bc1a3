//! Default configuration values shared by every agentcore-deploy component
//!
//! These constants keep resource names and parameter paths consistent between
//! the deploy, cleanup and status commands.

/// Default AWS region when `AWS_REGION` is unset
pub const DEFAULT_REGION: &str = "us-east-1";

/// Default project name, used in parameter paths and resource names
pub const DEFAULT_PROJECT: &str = "octank";

/// Default configuration file read by the binaries
pub const DEFAULT_ENV_FILE: &str = ".env";

/// Default WhatsApp phone number id passed to the runtime and handler function
pub const DEFAULT_WHATSAPP_PHONE_NUMBER_ID: &str = "phone-number-id-fe268d418d9b4e1296c47f86795987df";

/// Fixed prefix of the knowledge base document bucket
pub const BUCKET_PREFIX: &str = "agentcore-workshop";

/// Default vector index inside the OpenSearch Serverless collection
pub const DEFAULT_KB_VECTOR_INDEX: &str = "bedrock-knowledge-base-default-index";

/// Default directory holding the knowledge base documents
pub const DEFAULT_KB_DOCS_DIR: &str = "utils/knowledge_base_docs";

/// Default embedding model used by the knowledge base
pub const DEFAULT_KB_EMBEDDING_MODEL: &str = "amazon.titan-embed-text-v2:0";

/// Days before short-term memory events expire
pub const DEFAULT_MEMORY_EVENT_EXPIRY_DAYS: i32 = 90;

/// Default deployment package for the WhatsApp tool function
pub const DEFAULT_TOOL_FUNCTION_PACKAGE: &str = "build/lambda_function_code.zip";

/// Default deployment package for the WhatsApp message handler function
pub const DEFAULT_HANDLER_FUNCTION_PACKAGE: &str = "build/lambda_sns_handler.zip";

/// Literal answer required by the cleanup confirmation prompt
pub const CONFIRMATION_PHRASE: &str = "yes";

/// Initial password given to every demo user
pub const DEMO_USER_PASSWORD: &str = "OctankDemo123!";

/// Derive the knowledge base bucket name.
///
/// The name is deterministic so cleanup can find the bucket without a
/// registry entry.
pub fn bucket_name(region: &str, account_id: &str) -> String {
    format!("{BUCKET_PREFIX}-{region}-{account_id}")
}

/// Name of the IAM role assumed by the gateway
pub fn gateway_role_name(project: &str) -> String {
    format!("agentcore-{project}-gateway-role")
}

/// Name of the IAM role assumed by the agent runtime
pub fn runtime_role_name(project: &str) -> String {
    format!("agentcore-{project}-runtime-role")
}

/// Name of the function exposed as a gateway tool
pub fn tool_function_name(project: &str) -> String {
    format!("{project}-whatsapp-tool")
}

/// Name of the function that receives WhatsApp messages
pub fn handler_function_name(project: &str) -> String {
    format!("{project}-whatsapp-handler")
}

/// Execution role name for a function
pub fn function_role_name(function_name: &str) -> String {
    format!("{function_name}-role")
}

/// Project name as a name prefix for services that reject hyphens
fn pascal_prefix(project: &str) -> String {
    let mut chars = project.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars)
            .map(|c| if c == '-' { '_' } else { c })
            .collect(),
        None => String::new(),
    }
}

/// Name of the AgentCore memory
pub fn memory_name(project: &str) -> String {
    format!("{}EduMultiAgentMemory", pascal_prefix(project))
}

/// Name of the AgentCore runtime
pub fn runtime_name(project: &str) -> String {
    format!("{}_edu_assistant", pascal_prefix(project))
}

/// Name of the end-user pool
pub fn user_pool_name(project: &str) -> String {
    format!("{}EduMultiAgentPool", pascal_prefix(project))
}

/// Name of the MCP gateway
pub fn gateway_name(project: &str) -> String {
    format!("{project}forLambda")
}

/// Name of the pool whose clients may call the gateway
pub fn gateway_pool_name(project: &str) -> String {
    format!("{project}-gateway-pool")
}

/// Identifier of the gateway's resource server
pub fn gateway_resource_server_id(project: &str) -> String {
    format!("{project}-gateway-id")
}

/// Name of the gateway's machine-to-machine client
pub fn gateway_client_name(project: &str) -> String {
    format!("{project}-gateway-client")
}

/// Name of the knowledge base
pub fn knowledge_base_name(project: &str) -> String {
    format!("{project}-knowledge-base")
}
