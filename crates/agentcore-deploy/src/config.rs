//! Configuration for the deploy, cleanup and status commands
//!
//! Built once from the env file (with process environment overrides) and
//! passed to handler constructors. Handlers never read the environment.

use agentcore_deploy_common::defaults::{
    DEFAULT_HANDLER_FUNCTION_PACKAGE, DEFAULT_KB_DOCS_DIR, DEFAULT_KB_EMBEDDING_MODEL,
    DEFAULT_KB_VECTOR_INDEX, DEFAULT_PROJECT, DEFAULT_REGION, DEFAULT_TOOL_FUNCTION_PACKAGE,
    DEFAULT_WHATSAPP_PHONE_NUMBER_ID,
};
use agentcore_deploy_common::{ConfigError, EnvFile, ParameterLayout};
use std::path::PathBuf;

/// Configuration variable names
pub mod vars {
    pub const AWS_REGION: &str = "AWS_REGION";
    pub const AWS_PROFILE: &str = "AWS_PROFILE";
    pub const PROJECT: &str = "PROJECT";
    pub const AGENT_RUNTIME_ARN: &str = "AGENT_RUNTIME_ARN";
    pub const USER_POOL_ID: &str = "USER_POOL_ID";
    pub const USER_POOL_DOMAIN_PREFIX: &str = "USER_POOL_DOMAIN_PREFIX";
    pub const WHATSAPP_PHONE_NUMBER_ID: &str = "WHATSAPP_PHONE_NUMBER_ID";
    pub const DEMO_ADMIN_PHONE: &str = "DEMO_ADMIN_PHONE";
    pub const DEMO_PROFESSOR_PHONE: &str = "DEMO_PROFESSOR_PHONE";
    pub const DEMO_STUDENT_PHONE: &str = "DEMO_STUDENT_PHONE";
    pub const AGENT_CONTAINER_URI: &str = "AGENT_CONTAINER_URI";
    pub const KB_ROLE_ARN: &str = "KB_ROLE_ARN";
    pub const KB_COLLECTION_ARN: &str = "KB_COLLECTION_ARN";
    pub const KB_VECTOR_INDEX: &str = "KB_VECTOR_INDEX";
    pub const KB_EMBEDDING_MODEL_ARN: &str = "KB_EMBEDDING_MODEL_ARN";
    pub const KB_DOCS_DIR: &str = "KB_DOCS_DIR";
    pub const TOOL_FUNCTION_PACKAGE: &str = "TOOL_FUNCTION_PACKAGE";
    pub const HANDLER_FUNCTION_PACKAGE: &str = "HANDLER_FUNCTION_PACKAGE";

    /// Keys deploy cannot run without
    pub const DEPLOY_REQUIRED: [&str; 6] = [
        DEMO_ADMIN_PHONE,
        DEMO_PROFESSOR_PHONE,
        DEMO_STUDENT_PHONE,
        AGENT_CONTAINER_URI,
        KB_ROLE_ARN,
        KB_COLLECTION_ARN,
    ];
}

/// AWS connection settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsSettings {
    pub region: String,
    /// Named profile (overrides default credential resolution)
    pub profile: Option<String>,
}

/// Knowledge base storage and ingestion settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnowledgeBaseSettings {
    pub vector_index: String,
    pub embedding_model_arn: String,
    /// Directory of `*.txt` documents uploaded before ingestion
    pub docs_dir: PathBuf,
}

/// Local deployment packages for the Lambda functions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionPackages {
    pub tool: PathBuf,
    pub handler: PathBuf,
}

/// Demo user phone numbers, validated as E.164
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoPhones {
    pub admin: String,
    pub professor: String,
    pub student: String,
}

/// Values only deploy needs. Present once validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployInputs {
    pub demo_phones: DemoPhones,
    pub agent_container_uri: String,
    pub kb_role_arn: String,
    pub kb_collection_arn: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployConfig {
    pub aws: AwsSettings,
    pub project: String,
    pub whatsapp_phone_number_id: String,
    /// Fallback for the handler function when no runtime was deployed this run
    pub agent_runtime_arn: Option<String>,
    /// Fallback for the handler function when no user pool was deployed this run
    pub user_pool_id: Option<String>,
    pub user_pool_domain_prefix: Option<String>,
    pub knowledge_base: KnowledgeBaseSettings,
    pub packages: FunctionPackages,
    inputs: Option<DeployInputs>,
}

impl DeployConfig {
    /// Configuration for commands that only read or delete.
    ///
    /// Deploy-only keys are picked up when all present and valid, and
    /// otherwise ignored.
    pub fn from_env(env: &EnvFile) -> Result<Self, ConfigError> {
        let region = env.non_empty(vars::AWS_REGION).unwrap_or(DEFAULT_REGION).to_string();
        let project = env.non_empty(vars::PROJECT).unwrap_or(DEFAULT_PROJECT).to_string();
        validate_project(&project)?;

        let embedding_model_arn = env
            .non_empty(vars::KB_EMBEDDING_MODEL_ARN)
            .map(str::to_string)
            .unwrap_or_else(|| foundation_model_arn(&region, DEFAULT_KB_EMBEDDING_MODEL));

        let inputs = env
            .require(&vars::DEPLOY_REQUIRED)
            .and_then(|()| deploy_inputs(env))
            .ok();

        Ok(Self {
            knowledge_base: KnowledgeBaseSettings {
                vector_index: string_or(env, vars::KB_VECTOR_INDEX, DEFAULT_KB_VECTOR_INDEX),
                embedding_model_arn,
                docs_dir: path_or(env, vars::KB_DOCS_DIR, DEFAULT_KB_DOCS_DIR),
            },
            packages: FunctionPackages {
                tool: path_or(env, vars::TOOL_FUNCTION_PACKAGE, DEFAULT_TOOL_FUNCTION_PACKAGE),
                handler: path_or(
                    env,
                    vars::HANDLER_FUNCTION_PACKAGE,
                    DEFAULT_HANDLER_FUNCTION_PACKAGE,
                ),
            },
            whatsapp_phone_number_id: string_or(
                env,
                vars::WHATSAPP_PHONE_NUMBER_ID,
                DEFAULT_WHATSAPP_PHONE_NUMBER_ID,
            ),
            agent_runtime_arn: optional(env, vars::AGENT_RUNTIME_ARN),
            user_pool_id: optional(env, vars::USER_POOL_ID),
            user_pool_domain_prefix: optional(env, vars::USER_POOL_DOMAIN_PREFIX),
            aws: AwsSettings {
                region,
                profile: optional(env, vars::AWS_PROFILE),
            },
            project,
            inputs,
        })
    }

    /// Configuration for deploy: every deploy-only key must be set and valid.
    ///
    /// Missing keys are reported together in a single error.
    pub fn for_deploy(env: &EnvFile) -> Result<Self, ConfigError> {
        env.require(&vars::DEPLOY_REQUIRED)?;
        deploy_inputs(env)?;
        Self::from_env(env)
    }

    /// Deploy-only values
    pub fn inputs(&self) -> Result<&DeployInputs, ConfigError> {
        self.inputs.as_ref().ok_or_else(|| {
            ConfigError::MissingKeys(vars::DEPLOY_REQUIRED.iter().map(|k| k.to_string()).collect())
        })
    }

    pub fn layout(&self) -> ParameterLayout {
        ParameterLayout::new(&self.project)
    }

    pub fn region(&self) -> &str {
        &self.aws.region
    }

    pub fn profile(&self) -> Option<&str> {
        self.aws.profile.as_deref()
    }
}

fn deploy_inputs(env: &EnvFile) -> Result<DeployInputs, ConfigError> {
    let phone = |key: &str| -> Result<String, ConfigError> {
        let value = env.non_empty(key).unwrap_or_default();
        if is_e164(value) {
            Ok(value.to_string())
        } else {
            Err(ConfigError::InvalidPhone {
                key: key.to_string(),
                value: value.to_string(),
            })
        }
    };

    Ok(DeployInputs {
        demo_phones: DemoPhones {
            admin: phone(vars::DEMO_ADMIN_PHONE)?,
            professor: phone(vars::DEMO_PROFESSOR_PHONE)?,
            student: phone(vars::DEMO_STUDENT_PHONE)?,
        },
        agent_container_uri: string_or(env, vars::AGENT_CONTAINER_URI, ""),
        kb_role_arn: string_or(env, vars::KB_ROLE_ARN, ""),
        kb_collection_arn: string_or(env, vars::KB_COLLECTION_ARN, ""),
    })
}

/// `+` followed by 2 to 15 digits, the first of which is not zero
pub fn is_e164(value: &str) -> bool {
    let Some(digits) = value.strip_prefix('+') else {
        return false;
    };
    (2..=15).contains(&digits.len())
        && digits.bytes().all(|b| b.is_ascii_digit())
        && !digits.starts_with('0')
}

/// Project names end up in role, function and parameter names
fn validate_project(project: &str) -> Result<(), ConfigError> {
    let valid = project
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            key: vars::PROJECT.to_string(),
            reason: format!("{project:?} may only contain letters, digits, '-' and '_'"),
        })
    }
}

fn foundation_model_arn(region: &str, model_id: &str) -> String {
    format!("arn:aws:bedrock:{region}::foundation-model/{model_id}")
}

fn optional(env: &EnvFile, key: &str) -> Option<String> {
    env.non_empty(key).map(str::to_string)
}

fn string_or(env: &EnvFile, key: &str, default: &str) -> String {
    env.non_empty(key).unwrap_or(default).to_string()
}

fn path_or(env: &EnvFile, key: &str, default: &str) -> PathBuf {
    PathBuf::from(env.non_empty(key).unwrap_or(default))
}
