//! Microsoft Graph connector.
//!
//! One connector serves many tenants. Each tenant gets its own
//! [`HttpClient`] so access tokens and rate limits are kept per tenant; the
//! OAuth2 token URL is templated with `{tenant}`.

mod licenses;

pub use licenses::{collect_capabilities, ServicePlanInfo, SubscribedSku};

use crate::http::{HttpClient, RateLimitConfig};
use crate::traits::{
    AuthConfig, Connector, ConnectorConfig, ConnectorError, ConnectorHealth, ConnectorResult,
    GraphApi, LicenseChecker,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

/// Graph beta endpoint, where `admin/sharepoint/settings` lives.
pub const GRAPH_BETA_URL: &str = "https://graph.microsoft.com/beta";

/// Entra ID token endpoint template.
pub const DEFAULT_TOKEN_URL: &str = "https://login.microsoftonline.com/{tenant}/oauth2/v2.0/token";

/// Application permission scope for client credentials.
pub const GRAPH_DEFAULT_SCOPE: &str = "https://graph.microsoft.com/.default";

/// SharePoint tenant settings resource.
pub const SHAREPOINT_SETTINGS_PATH: &str = "/admin/sharepoint/settings";

/// Licenses held by a tenant.
pub const SUBSCRIBED_SKUS_PATH: &str = "/subscribedSkus";

/// Tenant organization resource, used for health checks.
const ORGANIZATION_PATH: &str = "/organization";

const TENANT_PLACEHOLDER: &str = "{tenant}";

/// Graph-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Base connector configuration.
    #[serde(flatten)]
    pub connector: ConnectorConfig,
    /// Tenant used for health checks.
    pub tenant_id: String,
    /// Requests per minute per tenant, unlimited when unset.
    #[serde(default)]
    pub requests_per_minute: Option<u32>,
}

/// Multi-tenant Microsoft Graph connector.
pub struct GraphConnector {
    config: GraphConfig,
    clients: RwLock<HashMap<String, Arc<HttpClient>>>,
}

impl GraphConnector {
    /// Creates a new Graph connector.
    pub fn new(mut config: GraphConfig) -> ConnectorResult<Self> {
        if config.connector.base_url.is_empty() {
            config.connector.base_url = GRAPH_BETA_URL.to_string();
        }
        if matches!(config.connector.auth, AuthConfig::None) {
            return Err(ConnectorError::ConfigError(
                "Graph connector requires oauth2 or bearer_token authentication".to_string(),
            ));
        }
        validate_tenant(&config.tenant_id)?;

        info!(
            connector = %config.connector.name,
            base_url = %config.connector.base_url,
            "Graph connector initialized"
        );

        Ok(Self {
            config,
            clients: RwLock::new(HashMap::new()),
        })
    }

    /// Returns the connector configuration.
    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Returns the HTTP client for a tenant, creating it on first use.
    async fn client_for(&self, tenant: &str) -> ConnectorResult<Arc<HttpClient>> {
        validate_tenant(tenant)?;

        if let Some(client) = self.clients.read().await.get(tenant) {
            return Ok(Arc::clone(client));
        }

        let mut clients = self.clients.write().await;
        if let Some(client) = clients.get(tenant) {
            return Ok(Arc::clone(client));
        }

        debug!(tenant, "Creating Graph client");
        let client = Arc::new(HttpClient::with_rate_limit(
            tenant_connector_config(&self.config.connector, tenant),
            self.config
                .requests_per_minute
                .map(RateLimitConfig::per_minute),
        )?);
        clients.insert(tenant.to_string(), Arc::clone(&client));
        Ok(client)
    }
}

/// Rejects tenant identifiers that could alter the token URL.
fn validate_tenant(tenant: &str) -> ConnectorResult<()> {
    let valid = !tenant.is_empty()
        && tenant
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(ConnectorError::InvalidRequest(format!(
            "Invalid tenant identifier: '{}'",
            tenant
        )))
    }
}

/// Copies the connector config with the tenant substituted into the token URL.
fn tenant_connector_config(config: &ConnectorConfig, tenant: &str) -> ConnectorConfig {
    let mut config = config.clone();
    if let AuthConfig::OAuth2 { token_url, .. } = &mut config.auth {
        *token_url = token_url.replace(TENANT_PLACEHOLDER, tenant);
    }
    config.name = format!("{}:{}", config.name, tenant);
    config
}

#[async_trait]
impl Connector for GraphConnector {
    fn name(&self) -> &str {
        &self.config.connector.name
    }

    async fn health_check(&self) -> ConnectorResult<ConnectorHealth> {
        let client = self.client_for(&self.config.tenant_id).await?;
        match client.get_json::<Value>(ORGANIZATION_PATH).await {
            Ok(_) => Ok(ConnectorHealth::Healthy),
            Err(ConnectorError::RateLimited(_)) => {
                Ok(ConnectorHealth::Degraded("Rate limited".to_string()))
            }
            Err(ConnectorError::AuthenticationFailed(_)) => {
                Ok(ConnectorHealth::Unhealthy("Authentication failed".to_string()))
            }
            Err(ConnectorError::AuthorizationDenied(_)) => Ok(ConnectorHealth::Unhealthy(
                "Authorization denied - check permissions".to_string(),
            )),
            Err(e) => Ok(ConnectorHealth::Unhealthy(e.to_string())),
        }
    }
}

#[async_trait]
impl GraphApi for GraphConnector {
    #[instrument(skip(self))]
    async fn get_json(&self, tenant: &str, path: &str) -> ConnectorResult<Value> {
        self.client_for(tenant).await?.get_json(path).await
    }

    #[instrument(skip(self, body))]
    async fn patch_json(&self, tenant: &str, path: &str, body: &Value) -> ConnectorResult<Value> {
        self.client_for(tenant).await?.patch_json(path, body).await
    }
}

#[async_trait]
impl LicenseChecker for GraphConnector {
    #[instrument(skip(self))]
    async fn tenant_capabilities(&self, tenant: &str) -> ConnectorResult<BTreeSet<String>> {
        #[derive(Deserialize)]
        struct SubscribedSkusResponse {
            #[serde(default)]
            value: Vec<SubscribedSku>,
        }

        let response: SubscribedSkusResponse = self
            .client_for(tenant)
            .await?
            .get_json(SUBSCRIBED_SKUS_PATH)
            .await?;
        let capabilities = collect_capabilities(&response.value);
        debug!(tenant, count = capabilities.len(), "Read tenant capabilities");
        Ok(capabilities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_graph_config;

    #[test]
    fn test_validate_tenant() {
        assert!(validate_tenant("contoso.onmicrosoft.com").is_ok());
        assert!(validate_tenant("8a3f2b1c-0000-4000-8000-1234567890ab").is_ok());
        assert!(validate_tenant("").is_err());
        assert!(validate_tenant("evil/../common").is_err());
    }

    #[test]
    fn test_tenant_connector_config_substitutes_token_url() {
        let config = test_graph_config();
        let tenant_config = tenant_connector_config(&config.connector, "fabrikam.com");
        match tenant_config.auth {
            AuthConfig::OAuth2 { token_url, .. } => assert_eq!(
                token_url,
                "https://login.microsoftonline.com/fabrikam.com/oauth2/v2.0/token"
            ),
            other => panic!("unexpected auth: {:?}", other),
        }
        assert_eq!(tenant_config.name, "graph:fabrikam.com");
    }

    #[test]
    fn test_new_defaults_base_url() {
        let mut config = test_graph_config();
        config.connector.base_url = String::new();
        let connector = GraphConnector::new(config).unwrap();
        assert_eq!(connector.config().connector.base_url, GRAPH_BETA_URL);
    }

    #[test]
    fn test_new_requires_auth() {
        let mut config = test_graph_config();
        config.connector.auth = AuthConfig::None;
        assert!(matches!(
            GraphConnector::new(config),
            Err(ConnectorError::ConfigError(_))
        ));
    }

    #[tokio::test]
    async fn test_client_is_reused_per_tenant() {
        let connector = GraphConnector::new(test_graph_config()).unwrap();
        let first = connector.client_for("contoso.com").await.unwrap();
        let second = connector.client_for("contoso.com").await.unwrap();
        let other = connector.client_for("fabrikam.com").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &other));
    }
}
