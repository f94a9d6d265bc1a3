//! Cognito user pool management
//!
//! Two pools are managed: the authorizer pool whose machine-to-machine client
//! authenticates callers of the gateway, and the end-user pool holding the
//! persona groups and demo users.

use crate::aws::context::{AwsContext, FromAwsContext};
use crate::aws::error::{NotFoundExt, classify_sdk_error, ignore_not_found};
use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_cognitoidentityprovider::Client;
use aws_sdk_cognitoidentityprovider::types::{
    AttributeDataType, AttributeType, MessageActionType, OAuthFlowType, PasswordPolicyType,
    ResourceServerScopeType, SchemaAttributeType, StringAttributeConstraintsType,
    UserPoolPolicyType, VerifiedAttributeType,
};
use tracing::{debug, info, warn};

/// Page size for list calls (service maximum for user pools)
const PAGE_SIZE: i32 = 60;

/// Cognito client for user pools and their children
#[derive(Clone)]
pub struct CognitoClient {
    client: Client,
    region: String,
}

/// Credentials of a machine-to-machine app client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// A demo user with its persona group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoUser {
    pub username: String,
    pub email: String,
    pub phone: String,
    pub given_name: String,
    pub family_name: String,
    /// Value of `custom:persona`, also the group name
    pub persona: String,
}

/// A persona group
#[derive(Debug, Clone, Copy)]
pub struct Group {
    pub name: &'static str,
    pub description: &'static str,
    pub precedence: i32,
}

/// Persona groups of the end-user pool
pub const PERSONA_GROUPS: [Group; 3] = [
    Group {
        name: "administrator",
        description: "Administrators of the educational system",
        precedence: 1,
    },
    Group {
        name: "professor",
        description: "Professors and educators",
        precedence: 2,
    },
    Group {
        name: "student",
        description: "Students",
        precedence: 3,
    },
];

impl FromAwsContext for CognitoClient {
    fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.cognito_client(),
            region: ctx.region().to_string(),
        }
    }
}

impl CognitoClient {
    /// OpenID discovery URL of a pool, used by JWT authorizers
    pub fn discovery_url(&self, user_pool_id: &str) -> String {
        discovery_url(&self.region, user_pool_id)
    }

    /// Find a pool by name
    pub async fn find_user_pool(&self, name: &str) -> Result<Option<String>> {
        let mut next_token = None;
        loop {
            let response = self
                .client
                .list_user_pools()
                .max_results(PAGE_SIZE)
                .set_next_token(next_token.take())
                .send()
                .await
                .context("Failed to list user pools")?;

            if let Some(id) = response
                .user_pools()
                .iter()
                .find(|p| p.name() == Some(name))
                .and_then(|p| p.id())
            {
                return Ok(Some(id.to_string()));
            }

            match response.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => return Ok(None),
            }
        }
    }

    /// Check if a pool exists
    pub async fn user_pool_exists(&self, user_pool_id: &str) -> bool {
        match self
            .client
            .describe_user_pool()
            .user_pool_id(user_pool_id)
            .send()
            .await
        {
            Ok(_) => true,
            Err(e) => {
                debug!(user_pool_id = %user_pool_id, error = ?e, "User pool lookup failed");
                false
            }
        }
    }

    /// Get or create a pool with default settings, for token issuance only.
    pub async fn ensure_authorizer_pool(&self, name: &str) -> Result<String> {
        if let Some(id) = self.find_user_pool(name).await? {
            debug!(pool = %name, user_pool_id = %id, "Reusing existing user pool");
            return Ok(id);
        }

        let response = self
            .client
            .create_user_pool()
            .pool_name(name)
            .send()
            .await
            .with_context(|| format!("Failed to create user pool {name}"))?;

        let id = response
            .user_pool()
            .and_then(|p| p.id())
            .context("No user pool ID returned from CreateUserPool")?
            .to_string();

        info!(pool = %name, user_pool_id = %id, "Authorizer user pool created");
        Ok(id)
    }

    /// Create the end-user pool: email required, `custom:persona`, strong passwords.
    pub async fn create_end_user_pool(&self, name: &str) -> Result<String> {
        let password_policy = PasswordPolicyType::builder()
            .minimum_length(8)
            .require_uppercase(true)
            .require_lowercase(true)
            .require_numbers(true)
            .require_symbols(true)
            .temporary_password_validity_days(7)
            .build();

        let mut request = self
            .client
            .create_user_pool()
            .pool_name(name)
            .policies(
                UserPoolPolicyType::builder()
                    .password_policy(password_policy)
                    .build(),
            )
            .auto_verified_attributes(VerifiedAttributeType::Email);

        for (attribute, required) in [
            ("email", true),
            ("phone_number", false),
            ("given_name", false),
            ("family_name", false),
            ("name", false),
        ] {
            request = request.schema(string_attribute(attribute, required, Some(("0", "2048"))));
        }
        request = request.schema(string_attribute("persona", false, None));

        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to create user pool {name}"))?;

        let id = response
            .user_pool()
            .and_then(|p| p.id())
            .context("No user pool ID returned from CreateUserPool")?
            .to_string();

        info!(pool = %name, user_pool_id = %id, "End-user pool created");
        Ok(id)
    }

    /// Get or create a resource server with the given scopes
    pub async fn ensure_resource_server(
        &self,
        user_pool_id: &str,
        identifier: &str,
        name: &str,
        scopes: &[(&str, &str)],
    ) -> Result<()> {
        if self
            .list_resource_servers(user_pool_id)
            .await?
            .iter()
            .any(|id| id == identifier)
        {
            debug!(identifier = %identifier, "Reusing existing resource server");
            return Ok(());
        }

        let mut request = self
            .client
            .create_resource_server()
            .user_pool_id(user_pool_id)
            .identifier(identifier)
            .name(name);
        for (scope, description) in scopes {
            request = request.scopes(
                ResourceServerScopeType::builder()
                    .scope_name(*scope)
                    .scope_description(*description)
                    .build()
                    .map_err(|e| anyhow::anyhow!("Failed to build scope: {}", e))?,
            );
        }

        request
            .send()
            .await
            .with_context(|| format!("Failed to create resource server {identifier}"))?;

        info!(identifier = %identifier, "Resource server created");
        Ok(())
    }

    /// Get or create a client-credentials app client for the given scopes
    pub async fn ensure_m2m_client(
        &self,
        user_pool_id: &str,
        client_name: &str,
        scopes: &[String],
    ) -> Result<ClientCredentials> {
        let existing = self
            .list_clients_named(user_pool_id)
            .await?
            .into_iter()
            .find(|(_, name)| name == client_name);

        if let Some((client_id, _)) = existing {
            let response = self
                .client
                .describe_user_pool_client()
                .user_pool_id(user_pool_id)
                .client_id(&client_id)
                .send()
                .await
                .context("Failed to describe user pool client")?;
            let secret = response
                .user_pool_client()
                .and_then(|c| c.client_secret())
                .context("Existing client has no secret")?;
            debug!(client_id = %client_id, "Reusing existing app client");
            return Ok(ClientCredentials {
                client_secret: secret.to_string(),
                client_id,
            });
        }

        let mut request = self
            .client
            .create_user_pool_client()
            .user_pool_id(user_pool_id)
            .client_name(client_name)
            .generate_secret(true)
            .allowed_o_auth_flows(OAuthFlowType::ClientCredentials)
            .allowed_o_auth_flows_user_pool_client(true)
            .supported_identity_providers("COGNITO");
        for scope in scopes {
            request = request.allowed_o_auth_scopes(scope);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to create app client {client_name}"))?;

        let client = response
            .user_pool_client()
            .context("No client returned from CreateUserPoolClient")?;
        let credentials = ClientCredentials {
            client_id: client
                .client_id()
                .context("No client ID returned")?
                .to_string(),
            client_secret: client
                .client_secret()
                .context("No client secret returned")?
                .to_string(),
        };

        info!(client_id = %credentials.client_id, "App client created");
        Ok(credentials)
    }

    /// Assign a hosted domain to a pool
    pub async fn create_domain(&self, user_pool_id: &str, domain: &str) -> Result<()> {
        self.client
            .create_user_pool_domain()
            .user_pool_id(user_pool_id)
            .domain(domain)
            .send()
            .await
            .with_context(|| format!("Failed to create domain {domain}"))?;
        info!(user_pool_id = %user_pool_id, domain = %domain, "User pool domain created");
        Ok(())
    }

    /// Create the persona groups, tolerating groups that already exist
    pub async fn create_groups(&self, user_pool_id: &str, groups: &[Group]) -> Result<()> {
        for group in groups {
            let result = self
                .client
                .create_group()
                .user_pool_id(user_pool_id)
                .group_name(group.name)
                .description(group.description)
                .precedence(group.precedence)
                .send()
                .await;
            match result {
                Ok(_) => debug!(group = %group.name, "Group created"),
                Err(e) if classify_sdk_error(&e).is_already_exists() => {
                    debug!(group = %group.name, "Group already exists")
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to create group {}", group.name));
                }
            }
        }
        Ok(())
    }

    /// Create a demo user with a permanent password and add it to its group
    pub async fn create_demo_user(
        &self,
        user_pool_id: &str,
        user: &DemoUser,
        password: &str,
    ) -> Result<()> {
        let attributes = [
            ("email", user.email.as_str()),
            ("phone_number", user.phone.as_str()),
            ("given_name", user.given_name.as_str()),
            ("family_name", user.family_name.as_str()),
            ("custom:persona", user.persona.as_str()),
            ("email_verified", "true"),
            ("phone_number_verified", "true"),
        ];

        let mut request = self
            .client
            .admin_create_user()
            .user_pool_id(user_pool_id)
            .username(&user.username)
            .message_action(MessageActionType::Suppress);
        for (name, value) in attributes {
            request = request.user_attributes(
                AttributeType::builder()
                    .name(name)
                    .value(value)
                    .build()
                    .map_err(|e| anyhow::anyhow!("Failed to build user attribute: {}", e))?,
            );
        }

        match request.send().await {
            Ok(_) => {}
            Err(e) if classify_sdk_error(&e).is_already_exists() => {
                warn!(username = %user.username, "Demo user already exists, resetting password");
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to create user {}", user.username));
            }
        }

        self.client
            .admin_set_user_password()
            .user_pool_id(user_pool_id)
            .username(&user.username)
            .password(password)
            .permanent(true)
            .send()
            .await
            .with_context(|| format!("Failed to set password for {}", user.username))?;

        self.client
            .admin_add_user_to_group()
            .user_pool_id(user_pool_id)
            .username(&user.username)
            .group_name(&user.persona)
            .send()
            .await
            .with_context(|| format!("Failed to add {} to {}", user.username, user.persona))?;

        info!(username = %user.username, persona = %user.persona, "Demo user created");
        Ok(())
    }

    /// Client IDs of a pool. A missing pool has no clients.
    pub async fn list_clients(&self, user_pool_id: &str) -> Result<Vec<String>> {
        Ok(self
            .list_clients_named(user_pool_id)
            .await?
            .into_iter()
            .map(|(id, _)| id)
            .collect())
    }

    async fn list_clients_named(&self, user_pool_id: &str) -> Result<Vec<(String, String)>> {
        let mut clients = Vec::new();
        let mut next_token = None;
        loop {
            let Some(response) = self
                .client
                .list_user_pool_clients()
                .user_pool_id(user_pool_id)
                .max_results(PAGE_SIZE)
                .set_next_token(next_token.take())
                .send()
                .await
                .not_found_as_none()
                .context("Failed to list user pool clients")?
            else {
                break;
            };

            clients.extend(response.user_pool_clients().iter().filter_map(|c| {
                Some((
                    c.client_id()?.to_string(),
                    c.client_name().unwrap_or_default().to_string(),
                ))
            }));

            match response.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }
        Ok(clients)
    }

    /// Resource server identifiers of a pool. A missing pool has none.
    pub async fn list_resource_servers(&self, user_pool_id: &str) -> Result<Vec<String>> {
        let mut servers = Vec::new();
        let mut next_token = None;
        loop {
            let Some(response) = self
                .client
                .list_resource_servers()
                .user_pool_id(user_pool_id)
                .max_results(50)
                .set_next_token(next_token.take())
                .send()
                .await
                .not_found_as_none()
                .context("Failed to list resource servers")?
            else {
                break;
            };

            servers.extend(
                response
                    .resource_servers()
                    .iter()
                    .filter_map(|s| s.identifier())
                    .map(str::to_string),
            );

            match response.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }
        Ok(servers)
    }

    /// Domain assigned to a pool, if any
    pub async fn domain(&self, user_pool_id: &str) -> Result<Option<String>> {
        let response = self
            .client
            .describe_user_pool()
            .user_pool_id(user_pool_id)
            .send()
            .await
            .not_found_as_none()
            .context("Failed to describe user pool")?;

        Ok(response
            .as_ref()
            .and_then(|r| r.user_pool())
            .and_then(|p| p.domain())
            .filter(|d| !d.is_empty())
            .map(str::to_string))
    }

    pub async fn delete_client(&self, user_pool_id: &str, client_id: &str) -> Result<()> {
        ignore_not_found(
            self.client
                .delete_user_pool_client()
                .user_pool_id(user_pool_id)
                .client_id(client_id)
                .send()
                .await,
        )
        .with_context(|| format!("Failed to delete app client {client_id}"))?;
        debug!(client_id = %client_id, "App client deleted");
        Ok(())
    }

    pub async fn delete_resource_server(&self, user_pool_id: &str, identifier: &str) -> Result<()> {
        ignore_not_found(
            self.client
                .delete_resource_server()
                .user_pool_id(user_pool_id)
                .identifier(identifier)
                .send()
                .await,
        )
        .with_context(|| format!("Failed to delete resource server {identifier}"))?;
        debug!(identifier = %identifier, "Resource server deleted");
        Ok(())
    }

    pub async fn delete_domain(&self, user_pool_id: &str, domain: &str) -> Result<()> {
        ignore_not_found(
            self.client
                .delete_user_pool_domain()
                .user_pool_id(user_pool_id)
                .domain(domain)
                .send()
                .await,
        )
        .with_context(|| format!("Failed to delete domain {domain}"))?;
        debug!(domain = %domain, "User pool domain deleted");
        Ok(())
    }

    pub async fn delete_user_pool(&self, user_pool_id: &str) -> Result<()> {
        ignore_not_found(
            self.client
                .delete_user_pool()
                .user_pool_id(user_pool_id)
                .send()
                .await,
        )
        .with_context(|| format!("Failed to delete user pool {user_pool_id}"))?;
        info!(user_pool_id = %user_pool_id, "User pool deleted");
        Ok(())
    }
}

/// Cognito operations the resource handlers rely on
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CognitoOperations: Send + Sync {
    fn discovery_url(&self, user_pool_id: &str) -> String;
    async fn find_user_pool(&self, name: &str) -> Result<Option<String>>;
    async fn user_pool_exists(&self, user_pool_id: &str) -> bool;
    async fn ensure_authorizer_pool(&self, name: &str) -> Result<String>;
    async fn create_end_user_pool(&self, name: &str) -> Result<String>;
    async fn ensure_resource_server(
        &self,
        user_pool_id: &str,
        identifier: &str,
        name: &str,
        scopes: &[(&'static str, &'static str)],
    ) -> Result<()>;
    async fn ensure_m2m_client(
        &self,
        user_pool_id: &str,
        client_name: &str,
        scopes: &[String],
    ) -> Result<ClientCredentials>;
    async fn create_domain(&self, user_pool_id: &str, domain: &str) -> Result<()>;
    async fn create_groups(&self, user_pool_id: &str, groups: &[Group]) -> Result<()>;
    async fn create_demo_user(&self, user_pool_id: &str, user: &DemoUser, password: &str) -> Result<()>;
    async fn list_clients(&self, user_pool_id: &str) -> Result<Vec<String>>;
    async fn list_resource_servers(&self, user_pool_id: &str) -> Result<Vec<String>>;
    async fn domain(&self, user_pool_id: &str) -> Result<Option<String>>;
    async fn delete_client(&self, user_pool_id: &str, client_id: &str) -> Result<()>;
    async fn delete_resource_server(&self, user_pool_id: &str, identifier: &str) -> Result<()>;
    async fn delete_domain(&self, user_pool_id: &str, domain: &str) -> Result<()>;
    async fn delete_user_pool(&self, user_pool_id: &str) -> Result<()>;
}

#[async_trait]
impl CognitoOperations for CognitoClient {
    fn discovery_url(&self, user_pool_id: &str) -> String {
        CognitoClient::discovery_url(self, user_pool_id)
    }

    async fn find_user_pool(&self, name: &str) -> Result<Option<String>> {
        CognitoClient::find_user_pool(self, name).await
    }

    async fn user_pool_exists(&self, user_pool_id: &str) -> bool {
        CognitoClient::user_pool_exists(self, user_pool_id).await
    }

    async fn ensure_authorizer_pool(&self, name: &str) -> Result<String> {
        CognitoClient::ensure_authorizer_pool(self, name).await
    }

    async fn create_end_user_pool(&self, name: &str) -> Result<String> {
        CognitoClient::create_end_user_pool(self, name).await
    }

    async fn ensure_resource_server(
        &self,
        user_pool_id: &str,
        identifier: &str,
        name: &str,
        scopes: &[(&'static str, &'static str)],
    ) -> Result<()> {
        CognitoClient::ensure_resource_server(self, user_pool_id, identifier, name, scopes).await
    }

    async fn ensure_m2m_client(
        &self,
        user_pool_id: &str,
        client_name: &str,
        scopes: &[String],
    ) -> Result<ClientCredentials> {
        CognitoClient::ensure_m2m_client(self, user_pool_id, client_name, scopes).await
    }

    async fn create_domain(&self, user_pool_id: &str, domain: &str) -> Result<()> {
        CognitoClient::create_domain(self, user_pool_id, domain).await
    }

    async fn create_groups(&self, user_pool_id: &str, groups: &[Group]) -> Result<()> {
        CognitoClient::create_groups(self, user_pool_id, groups).await
    }

    async fn create_demo_user(&self, user_pool_id: &str, user: &DemoUser, password: &str) -> Result<()> {
        CognitoClient::create_demo_user(self, user_pool_id, user, password).await
    }

    async fn list_clients(&self, user_pool_id: &str) -> Result<Vec<String>> {
        CognitoClient::list_clients(self, user_pool_id).await
    }

    async fn list_resource_servers(&self, user_pool_id: &str) -> Result<Vec<String>> {
        CognitoClient::list_resource_servers(self, user_pool_id).await
    }

    async fn domain(&self, user_pool_id: &str) -> Result<Option<String>> {
        CognitoClient::domain(self, user_pool_id).await
    }

    async fn delete_client(&self, user_pool_id: &str, client_id: &str) -> Result<()> {
        CognitoClient::delete_client(self, user_pool_id, client_id).await
    }

    async fn delete_resource_server(&self, user_pool_id: &str, identifier: &str) -> Result<()> {
        CognitoClient::delete_resource_server(self, user_pool_id, identifier).await
    }

    async fn delete_domain(&self, user_pool_id: &str, domain: &str) -> Result<()> {
        CognitoClient::delete_domain(self, user_pool_id, domain).await
    }

    async fn delete_user_pool(&self, user_pool_id: &str) -> Result<()> {
        CognitoClient::delete_user_pool(self, user_pool_id).await
    }
}

fn string_attribute(name: &str, required: bool, length: Option<(&str, &str)>) -> SchemaAttributeType {
    let constraints = match length {
        Some((min, max)) => StringAttributeConstraintsType::builder()
            .min_length(min)
            .max_length(max)
            .build(),
        None => StringAttributeConstraintsType::builder().build(),
    };
    SchemaAttributeType::builder()
        .name(name)
        .attribute_data_type(AttributeDataType::String)
        .required(required)
        .mutable(true)
        .string_attribute_constraints(constraints)
        .build()
}

/// OpenID discovery URL of a pool
pub fn discovery_url(region: &str, user_pool_id: &str) -> String {
    format!("https://cognito-idp.{region}.amazonaws.com/{user_pool_id}/.well-known/openid-configuration")
}

/// Default hosted domain prefix for a pool: its ID lowercased without underscores
pub fn default_domain_prefix(user_pool_id: &str) -> String {
    user_pool_id.replace('_', "").to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovery_url_format() {
        assert_eq!(
            discovery_url("us-east-1", "us-east-1_AbC123"),
            "https://cognito-idp.us-east-1.amazonaws.com/us-east-1_AbC123/.well-known/openid-configuration"
        );
    }

    #[test]
    fn domain_prefix_strips_underscores() {
        assert_eq!(default_domain_prefix("us-east-1_AbC123"), "us-east-1abc123");
    }

    #[test]
    fn persona_groups_have_distinct_precedence() {
        let mut precedences: Vec<i32> = PERSONA_GROUPS.iter().map(|g| g.precedence).collect();
        precedences.dedup();
        assert_eq!(precedences.len(), PERSONA_GROUPS.len());
    }
}
